//! services/api/src/web/notifications.rs
//!
//! Axum handlers for in-app notifications, push delivery and approval emails.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use visitor_core::{NotifyRequest, VisitorError};

use crate::web::dto::{
    required_id, ApprovalEmailRequest, MessageResponse, NotificationView, NotifyRequestBody,
    UnreadRequest, UnreadResponse, WarningResponse,
};
use crate::web::failure::{Failure, FailureShape};
use crate::web::middleware::Caller;
use crate::web::state::AppState;

/// Save a notification for a user and push it to their device.
///
/// The record is kept even when delivery is skipped; the response then
/// carries a `warning` instead of a `message`.
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    request_body = NotifyRequestBody,
    responses(
        (status = 200, description = "Saved and delivered, or saved with a warning", body = MessageResponse),
        (status = 400, description = "Missing required fields"),
        (status = 500, description = "Persistence or push delivery failed")
    ),
    security(("bearer" = []))
)]
pub async fn notify_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NotifyRequestBody>, JsonRejection>,
) -> Result<Response, Failure> {
    const FALLBACK: &str = "Failed to send push notification";

    // 1. Parse the request body
    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Error))?;
    let user_id = match body.user_id.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            Some(required_id(Some(raw), "user_id").map_err(|e| Failure::error(e, FALLBACK))?)
        }
        _ => None,
    };

    // 2. Save and deliver
    let outcome = state
        .notifications
        .notify(NotifyRequest {
            user_id,
            message: body.message.unwrap_or_default(),
            kind: body.kind.unwrap_or_default(),
            visitor: body.visitor_data.map(Into::into),
        })
        .await
        .map_err(|e| Failure::error(e, FALLBACK))?;

    // 3. A skipped delivery is still a success
    let response = match outcome.warning() {
        Some(warning) => Json(WarningResponse {
            warning: warning.to_string(),
        })
        .into_response(),
        None => Json(MessageResponse::new("Notification created and sent successfully."))
            .into_response(),
    };
    Ok(response)
}

/// List a user's unread notifications, newest first.
#[utoipa::path(
    post,
    path = "/notifications/unread",
    tag = "notifications",
    request_body = UnreadRequest,
    responses(
        (status = 200, description = "Unread notifications", body = UnreadResponse),
        (status = 403, description = "userId is not the caller"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn unread_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<UnreadRequest>, JsonRejection>,
) -> Result<Json<UnreadResponse>, Failure> {
    const FALLBACK: &str = "Internal Server Error";

    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Envelope))?;
    if let Some(raw) = body.user_id.as_deref().filter(|v| !v.trim().is_empty()) {
        let requested = required_id(Some(raw), "userId").map_err(|e| Failure::envelope(e, FALLBACK))?;
        if requested != caller {
            return Err(Failure::envelope(
                VisitorError::Authorization("Unauthorized".to_string()),
                FALLBACK,
            ));
        }
    }

    let unread = state
        .notifications
        .get_unread(caller)
        .await
        .map_err(|e| Failure::envelope(e, FALLBACK))?;

    Ok(Json(UnreadResponse {
        status: "success".to_string(),
        data: unread.into_iter().map(NotificationView::from).collect(),
    }))
}

/// Email a visit decision to the resident.
#[utoipa::path(
    post,
    path = "/notifications/approval-email",
    tag = "notifications",
    request_body = ApprovalEmailRequest,
    responses(
        (status = 200, description = "Email sent", body = MessageResponse),
        (status = 400, description = "Missing parameters or unknown action"),
        (status = 500, description = "Email delivery failed")
    ),
    security(("bearer" = []))
)]
pub async fn approval_email_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ApprovalEmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Error))?;
    state
        .mailer
        .send_approval_email(
            body.resident_email.as_deref().unwrap_or_default(),
            body.visit_id.as_deref().unwrap_or_default(),
            body.action.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|e| Failure::error(e, "Failed to send email"))?;

    Ok(Json(MessageResponse::new("Email sent successfully")))
}
