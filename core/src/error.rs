//! Error types for the formdesk API client.
//!
//! # Design
//! Every non-2xx response lands in `Request` with the raw status code and
//! body text; callers that care about a particular status inspect it
//! themselves. The other variants cover failures that never reach the
//! server or never produce a usable body.
//!
//! `ApiError` is `Clone` because the query cache hands the same error to
//! every subscriber of a failed entry.

use std::fmt;

/// Errors returned by request parsing, transports and the query layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a status outside 200..=299.
    Request { status: u16, body: String },

    /// The transport could not complete the round-trip.
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    Serialization(String),
}

impl ApiError {
    /// HTTP status of a `Request` failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Request { status, body } => {
                write!(f, "request failed with status {status}: {body}")
            }
            ApiError::Transport(msg) => write!(f, "transport failed: {msg}"),
            ApiError::Deserialization(msg) => {
                write!(f, "deserialization failed: {msg}")
            }
            ApiError::Serialization(msg) => {
                write!(f, "serialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
