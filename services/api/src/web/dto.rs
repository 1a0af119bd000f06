//! services/api/src/web/dto.rs
//!
//! Request and response payloads for the REST API.
//!
//! Field names are part of the client contract, which mixes snake_case and
//! camelCase per route. Request fields are optional so that a missing field
//! reaches the engines as a validation error instead of a JSON rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use visitor_core::{Notification, VisitSession, VisitorContext, VisitorError};

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateVisitRequest {
    pub visitor_name: Option<String>,
    pub national_id: Option<String>,
    pub visitor_phone: Option<String>,
    pub unit_number: Option<String>,
}

/// Identifies the visit for approve/reject.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct VisitDecisionRequest {
    pub visit_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignVisitRequest {
    pub visitor_id: Option<String>,
    pub unit_number: Option<String>,
    pub auth_uid: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CheckoutRequest {
    pub national_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// One of `weekly`, `monthly` or `yearly`. Defaults to `monthly`.
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ShiftLoginRequest {
    pub auth_uid: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct NotifyRequestBody {
    pub user_id: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "visitorData")]
    pub visitor_data: Option<VisitorData>,
}

/// Visitor details attached to `visitor` notifications. All three fields are required.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorData {
    pub visitor_id: String,
    pub visitor_name: String,
    pub visitor_phone: String,
}

impl From<VisitorData> for VisitorContext {
    fn from(data: VisitorData) -> Self {
        VisitorContext {
            visitor_id: data.visitor_id,
            visitor_name: data.visitor_name,
            visitor_phone: data.visitor_phone,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UnreadRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ApprovalEmailRequest {
    pub resident_email: Option<String>,
    pub visit_id: Option<String>,
    pub action: Option<String>,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WarningResponse {
    pub warning: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VisitView {
    pub id: Uuid,
    pub visitor_id: Option<String>,
    pub visitor_name: Option<String>,
    pub national_id: String,
    pub visitor_phone: Option<String>,
    pub unit_number: String,
    /// `pending`, `approved`, `rejected` or `checked_out`.
    pub status: String,
    pub security_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
}

impl From<VisitSession> for VisitView {
    fn from(session: VisitSession) -> Self {
        Self {
            id: session.id,
            visitor_id: session.visitor_id,
            visitor_name: session.visitor_name,
            national_id: session.national_id,
            visitor_phone: session.visitor_phone,
            unit_number: session.unit_number,
            status: session.status.as_str().to_string(),
            security_id: session.security_id,
            created_at: session.created_at,
            check_in_at: session.check_in_at,
            check_out_at: session.check_out_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateVisitResponse {
    pub message: String,
    pub data: VisitView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VisitListResponse {
    pub visits: Vec<VisitView>,
}

impl VisitListResponse {
    pub fn from_sessions(sessions: Vec<VisitSession>) -> Self {
        Self {
            visits: sessions.into_iter().map(VisitView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `unread`, `read` or `failed`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            message: n.message,
            kind: n.kind,
            status: n.status.as_str().to_string(),
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadResponse {
    pub status: String,
    pub data: Vec<NotificationView>,
}

//=========================================================================================
// Field Helpers
//=========================================================================================

/// Parses a required id field, reporting a missing or malformed value as a validation error.
pub fn required_id(raw: Option<&str>, field: &str) -> Result<Uuid, VisitorError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VisitorError::Validation(format!("Missing {}", field)))?;
    Uuid::parse_str(raw).map_err(|_| VisitorError::Validation(format!("Invalid {}", field)))
}
