//! Dispatch errors.
//!
//! Resolution misses are not errors; they route to the caller's fallback.
//! Only boundary validation (surrogate construction, binding checks) and
//! configuration loading fail.

use thiserror::Error;

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed input to a factory: an unbound method or an empty name.
    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument {
        param: &'static str,
        reason: String,
    },

    /// A method bound to one subject was used to dispatch on another.
    #[error("`{method}` must be bound to `{target}`")]
    InvalidOperation {
        method: String,
        target: &'static str,
    },

    #[error("failed to parse dispatch configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read dispatch configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl DispatchError {
    pub(crate) fn unbound(method: &str) -> Self {
        DispatchError::InvalidArgument {
            param: "method",
            reason: format!("`{method}` must be bound to a subject"),
        }
    }

    pub(crate) fn empty_name() -> Self {
        DispatchError::InvalidArgument {
            param: "name",
            reason: "operation name cannot be empty".to_string(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, DispatchError::InvalidArgument { .. })
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, DispatchError::InvalidOperation { .. })
    }
}

/// Dispatch result type.
pub type Result<T> = std::result::Result<T, DispatchError>;
