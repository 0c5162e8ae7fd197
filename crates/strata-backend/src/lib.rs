//! strata-backend — the storage backend as seen by the placement scheduler.
//!
//! The backend (node listing and replica autoplace) is an external
//! capability. This crate pins down its contract as traits, the request and
//! response shapes that cross it, and the error codes it reports.
//!
//! [`InMemoryBackend`] implements the contract in process memory with the
//! same cumulative autoplace semantics, which makes placement sequences
//! observable in tests and in the `strata place` simulator.

pub mod client;
pub mod error;
pub mod memory;

pub use client::{
    AutoPlaceRequest, AutoSelectFilter, Backend, BackendFuture, ListOpts, NodeApi, PlacementApi,
    ReplicaInfo,
};
pub use error::{ApiCode, BackendError, BackendResult};
pub use memory::{BackendCall, InMemoryBackend, NodeSpec};
