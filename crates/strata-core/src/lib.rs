//! strata-core — shared types, volume parameters, and configuration.
//!
//! Request-scoped shapes exchanged between the orchestrator side (topology
//! segments and requirements), the storage backend side (nodes, volume
//! handles), and the scheduler that bridges them.

pub mod config;
pub mod params;
pub mod types;

pub use config::{ConfigError, SchedulerKind, StrataConfig, TopologyConfig};
pub use params::{ParameterError, VolumeParameters};
pub use types::*;
