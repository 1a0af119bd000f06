//! services/api/src/web/middleware.rs
//!
//! Authentication and CORS preflight middleware.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;
use visitor_core::{PortError, VisitorError};

use crate::web::failure::Failure;
use crate::web::state::AppState;

/// The authenticated caller, resolved from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uuid);

/// Middleware that resolves the `Authorization: Bearer` token to a caller id.
///
/// If valid, inserts a `Caller` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized. A store failure is a 500.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Failure> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(Failure::unauthorized)?;

    // 2. Resolve it through the Directory Store
    let user_id = state
        .directory
        .resolve_caller(token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                warn!("Rejected bearer token: {:?}", e);
                Failure::unauthorized()
            }
            other => Failure::error(VisitorError::from(other), "Internal Server Error"),
        })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(Caller(user_id));

    Ok(next.run(req).await)
}

/// Answers every `OPTIONS` request with an empty 204, after CORS headers are applied.
pub async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_preflight = req.method() == Method::OPTIONS;
    let response = next.run(req).await;
    if !is_preflight {
        return response;
    }
    let (mut parts, _) = response.into_parts();
    parts.status = StatusCode::NO_CONTENT;
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    Response::from_parts(parts, Body::empty())
}
