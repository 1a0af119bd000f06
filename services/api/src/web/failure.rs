//! services/api/src/web/failure.rs
//!
//! Maps core errors onto HTTP responses.
//!
//! Each route keeps the failure body its clients already parse: `{message}`,
//! `{error}` or the `{status: "error", message}` envelope. Server-side failures
//! never leak detail; the handler's fallback text is returned and the full error
//! is logged.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use visitor_core::VisitorError;

/// The JSON key layout of a failure body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureShape {
    Message,
    Error,
    Envelope,
}

#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    text: String,
    shape: FailureShape,
}

impl Failure {
    /// A `{message}` failure.
    pub fn message(err: VisitorError, fallback: &str) -> Self {
        Self::from_core(err, fallback, FailureShape::Message)
    }

    /// An `{error}` failure.
    pub fn error(err: VisitorError, fallback: &str) -> Self {
        Self::from_core(err, fallback, FailureShape::Error)
    }

    /// A `{status: "error", message}` failure.
    pub fn envelope(err: VisitorError, fallback: &str) -> Self {
        Self::from_core(err, fallback, FailureShape::Envelope)
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            text: "Unauthorized".to_string(),
            shape: FailureShape::Error,
        }
    }

    /// A body that could not be parsed as JSON is a validation failure.
    pub fn bad_body(rejection: JsonRejection, shape: FailureShape) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            text: rejection.body_text(),
            shape,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn from_core(err: VisitorError, fallback: &str, shape: FailureShape) -> Self {
        let (status, text) = match err {
            VisitorError::Validation(text) => (StatusCode::BAD_REQUEST, text),
            VisitorError::Authorization(text) => (StatusCode::FORBIDDEN, text),
            VisitorError::NotFound(text) => (StatusCode::NOT_FOUND, text),
            VisitorError::Conflict(text) => (StatusCode::CONFLICT, text),
            other => {
                error!("{}: {:?}", fallback, other);
                (StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string())
            }
        };
        Self {
            status,
            text,
            shape,
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = match self.shape {
            FailureShape::Message => json!({ "message": self.text }),
            FailureShape::Error => json!({ "error": self.text }),
            FailureShape::Envelope => json!({ "status": "error", "message": self.text }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_text() {
        let failure = Failure::error(VisitorError::Conflict("Visit is not pending".into()), "x");
        assert_eq!(failure.status(), StatusCode::CONFLICT);
        assert_eq!(failure.text, "Visit is not pending");

        let failure = Failure::message(VisitorError::Authorization("no active shift".into()), "x");
        assert_eq!(failure.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn server_errors_hide_detail() {
        let failure = Failure::envelope(
            VisitorError::Dependency("connection refused to 10.0.0.4".into()),
            "Internal Server Error",
        );
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.text, "Internal Server Error");

        let failure = Failure::error(
            VisitorError::Delivery {
                message: "push endpoint returned 500".into(),
                upstream: Some("{}".into()),
            },
            "Failed to send push notification",
        );
        assert_eq!(failure.text, "Failed to send push notification");
    }
}
