//! Error types for the connection core

use thiserror::Error;

use crate::types::CallState;

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors surfaced by the connection core.
///
/// Mutation and notification paths never fail; only the technology hooks
/// (`hangup`, `separate`) hand one of these back, and the core passes it
/// through to the caller without interpreting it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation not permitted in the current call state
    #[error("Call state error ({state}): {message}")]
    CallState {
        state: CallState,
        message: String,
    },

    /// Operation not permitted in the current connection state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConnectionError {
    /// Create a call state error
    pub fn call_state(state: CallState, message: impl Into<String>) -> Self {
        Self::CallState {
            state,
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is a call state error
    pub fn is_call_state(&self) -> bool {
        matches!(self, Self::CallState { .. })
    }
}
