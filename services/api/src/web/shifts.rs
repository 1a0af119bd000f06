//! services/api/src/web/shifts.rs

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use std::sync::Arc;
use visitor_core::VisitorError;

use crate::web::dto::{required_id, MessageResponse, ShiftLoginRequest};
use crate::web::failure::{Failure, FailureShape};
use crate::web::middleware::Caller;
use crate::web::state::AppState;

/// Start (or restart) the caller's security shift.
#[utoipa::path(
    post,
    path = "/shifts/login",
    tag = "shifts",
    request_body = ShiftLoginRequest,
    responses(
        (status = 200, description = "Shift started", body = MessageResponse),
        (status = 400, description = "Missing officer id"),
        (status = 403, description = "Officer id is not the caller"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn shift_login_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<ShiftLoginRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    const FALLBACK: &str = "Error logging in security officer.";

    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Message))?;
    let officer = match body.auth_uid.as_deref().map(str::trim) {
        None | Some("") => {
            return Err(Failure::message(
                VisitorError::Validation("Security officer UID is required.".to_string()),
                FALLBACK,
            ))
        }
        raw => required_id(raw, "authUid").map_err(|e| Failure::message(e, FALLBACK))?,
    };
    if officer != caller {
        return Err(Failure::message(
            VisitorError::Authorization("Unauthorized".to_string()),
            FALLBACK,
        ));
    }

    state
        .shifts
        .log_in(officer)
        .await
        .map_err(|e| Failure::message(e, FALLBACK))?;

    Ok(Json(MessageResponse::new(
        "Security officer logged in successfully.",
    )))
}
