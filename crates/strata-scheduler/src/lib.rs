//! strata-scheduler — topology-aware replica placement.
//!
//! Turns an orchestrator topology requirement (preferred + requisite
//! segments) and a replica count into a sequence of autoplace calls against
//! the storage backend.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (strategy enum, picked from config)
//!   ├── TopologyScheduler
//!   │     ├── NodeResolver (segment → node names, NodeApi)
//!   │     └── PlacementApi (cumulative autoplace)
//!   └── AutoplaceScheduler (PlacementApi only)
//! ```
//!
//! Every backend call runs under a [`RequestContext`] so caller
//! cancellation and deadlines abort it promptly.

pub mod accessible;
pub mod autoplace;
pub mod context;
pub mod error;
pub mod resolver;
pub mod strategy;
pub mod topology;

pub use autoplace::AutoplaceScheduler;
pub use context::{CancelHandle, RequestContext};
pub use error::{Phase, SchedulerError, SchedulerResult, StatusCode};
pub use resolver::NodeResolver;
pub use strategy::Scheduler;
pub use topology::{PreferredOutcome, TopologyScheduler};
