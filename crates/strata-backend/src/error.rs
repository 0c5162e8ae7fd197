//! Error types for storage backend calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Structured return codes reported by the backend's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCode {
    /// Not enough eligible nodes to satisfy an autoplace request.
    NotEnoughNodes,
    /// The named resource definition does not exist.
    UnknownResourceDefinition,
    /// A property filter could not be parsed.
    InvalidProperty,
}

impl ApiCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiCode::NotEnoughNodes => "FAIL_NOT_ENOUGH_NODES",
            ApiCode::UnknownResourceDefinition => "FAIL_NOT_FOUND_RSC_DFN",
            ApiCode::InvalidProperty => "FAIL_INVLD_PROP",
        }
    }
}

/// Errors that can occur while talking to the storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend processed the call and rejected it.
    #[error("api call failed ({}): {message}", code.as_str())]
    ApiCall { code: ApiCode, message: String },

    /// The backend could not be reached or the exchange broke off.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn api(code: ApiCode, message: impl Into<String>) -> Self {
        BackendError::ApiCall {
            code,
            message: message.into(),
        }
    }

    /// True when the backend answered with exactly this return code.
    pub fn is_api_call(&self, code: ApiCode) -> bool {
        matches!(self, BackendError::ApiCall { code: c, .. } if *c == code)
    }
}
