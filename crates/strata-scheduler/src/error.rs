//! Scheduler error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_backend::BackendError;
use strata_core::{ParameterError, Segment};
use thiserror::Error;

/// Placement phase a backend call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preferred,
    Requisite,
    Unconstrained,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Preferred => "preferred",
            Phase::Requisite => "requisite",
            Phase::Unconstrained => "unconstrained",
        })
    }
}

/// Caller-facing classification, aligned with the orchestrator's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    InvalidArgument,
    ResourceExhausted,
    Unavailable,
    Cancelled,
    DeadlineExceeded,
    Internal,
}

/// Errors that can occur while scheduling a volume.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unable to determine volume parameters: {0}")]
    Parameters(#[from] ParameterError),

    #[error("failed to get {phase} node list for {volume} from segment {segment:?}: {source}")]
    NodeResolution {
        phase: Phase,
        volume: String,
        segment: Segment,
        #[source]
        source: BackendError,
    },

    /// The requisite topology could not host enough replicas.
    #[error("not enough replicas on requisite nodes for {volume}: {source}")]
    ResourceExhausted {
        volume: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to autoplace {phase} replicas for {volume}: {source}")]
    Placement {
        phase: Phase,
        volume: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to list replicas for {volume}: {source}")]
    Replicas {
        volume: String,
        #[source]
        source: BackendError,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl SchedulerError {
    /// Classify for the caller. Backend API rejections map to `Internal`,
    /// transport failures to `Unavailable`.
    pub fn code(&self) -> StatusCode {
        match self {
            SchedulerError::Parameters(_) => StatusCode::InvalidArgument,
            SchedulerError::ResourceExhausted { .. } => StatusCode::ResourceExhausted,
            SchedulerError::Cancelled => StatusCode::Cancelled,
            SchedulerError::DeadlineExceeded => StatusCode::DeadlineExceeded,
            SchedulerError::NodeResolution { source, .. }
            | SchedulerError::Placement { source, .. }
            | SchedulerError::Replicas { source, .. } => match source {
                BackendError::Transport(_) => StatusCode::Unavailable,
                BackendError::ApiCall { .. } => StatusCode::Internal,
            },
        }
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, SchedulerError::ResourceExhausted { .. })
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use strata_backend::ApiCode;

    use super::*;

    #[test]
    fn resource_exhausted_is_distinguishable() {
        let err = SchedulerError::ResourceExhausted {
            volume: "pvc-1".into(),
            source: BackendError::api(ApiCode::NotEnoughNodes, "need 2"),
        };
        assert!(err.is_resource_exhausted());
        assert_eq!(err.code(), StatusCode::ResourceExhausted);
        assert!(err.source().is_some());
    }

    #[test]
    fn transport_failures_are_unavailable() {
        let err = SchedulerError::Placement {
            phase: Phase::Unconstrained,
            volume: "pvc-1".into(),
            source: BackendError::Transport("refused".into()),
        };
        assert_eq!(err.code(), StatusCode::Unavailable);
        assert_eq!(
            err.to_string(),
            "failed to autoplace unconstrained replicas for pvc-1: transport error: refused"
        );
    }

    #[test]
    fn parameter_errors_are_invalid_argument() {
        let err = SchedulerError::from(ParameterError::ZeroPlacementCount);
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn api_rejections_are_internal() {
        let err = SchedulerError::NodeResolution {
            phase: Phase::Requisite,
            volume: "pvc-1".into(),
            segment: Segment::new().with("zone", "z1"),
            source: BackendError::api(ApiCode::InvalidProperty, "bad"),
        };
        assert_eq!(err.code(), StatusCode::Internal);
        let msg = err.to_string();
        assert!(msg.starts_with("failed to get requisite node list for pvc-1"));
        assert!(msg.ends_with("api call failed (FAIL_INVLD_PROP): bad"));
    }
}
