//! crates/visitor_core/src/error.rs
//!
//! The error taxonomy shared by the visit, shift and notification engines.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum VisitorError {
    /// Malformed or missing input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller lacks rights for the target resource.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested state transition is not legal from the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A downstream push, email or OAuth call failed.
    #[error("Delivery failed: {message}")]
    Delivery {
        message: String,
        upstream: Option<String>,
    },

    /// The Directory Store was unreachable or rejected the operation.
    #[error("Directory store error: {0}")]
    Dependency(String),
}

pub type VisitorResult<T> = Result<T, VisitorError>;

impl From<PortError> for VisitorError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => VisitorError::NotFound(what),
            PortError::Unauthorized => VisitorError::Authorization("Unauthorized".to_string()),
            PortError::Delivery { message, upstream } => VisitorError::Delivery { message, upstream },
            PortError::Unexpected(detail) => VisitorError::Dependency(detail),
        }
    }
}
