//! crates/visitor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the Directory Store, the push gateway and the mail provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ActiveShift, NewNotification, NewVisitSession, Notification, NotificationStatus, Profile,
    PushPayload, VisitScope, VisitSession, VisitStatus, VisitTransition,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// An upstream delivery call failed. `upstream` carries the raw error body.
    #[error("Delivery failed: {message}")]
    Delivery {
        message: String,
        upstream: Option<String>,
    },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn delivery(message: impl Into<String>, upstream: Option<String>) -> Self {
        PortError::Delivery {
            message: message.into(),
            upstream,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Directory Store
//=========================================================================================

/// CRUD access to profiles, visit sessions, active shifts and notifications.
///
/// One instance is built at startup and shared read-only by every request handler.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // --- Identity ---
    /// Resolves a bearer access token to the caller's user id.
    async fn resolve_caller(&self, access_token: &str) -> PortResult<Uuid>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn find_resident_by_unit(&self, unit_number: &str) -> PortResult<Option<Profile>>;

    // --- Visit Sessions ---
    async fn insert_visit(&self, visit: NewVisitSession) -> PortResult<VisitSession>;

    async fn get_visit(&self, visit_id: Uuid) -> PortResult<VisitSession>;

    /// Applies `transition` only where the current status equals `transition.expected()`.
    ///
    /// Returns `Ok(None)` when no row matched.
    async fn apply_transition(
        &self,
        visit_id: Uuid,
        transition: VisitTransition,
    ) -> PortResult<Option<VisitSession>>;

    /// The most recently created session for `national_id` in `status`.
    async fn latest_visit_by_national_id(
        &self,
        national_id: &str,
        status: VisitStatus,
    ) -> PortResult<Option<VisitSession>>;

    /// Newest first.
    async fn list_visits_by_status(&self, status: VisitStatus) -> PortResult<Vec<VisitSession>>;

    /// Newest first.
    async fn list_visits_for_unit(&self, unit_number: &str) -> PortResult<Vec<VisitSession>>;

    /// Sessions in `scope` whose `check_in_at` falls within `[start, end]`.
    async fn list_visits_checked_in_between(
        &self,
        scope: &VisitScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<VisitSession>>;

    // --- Active Shifts ---
    async fn upsert_active_shift(
        &self,
        security_id: Uuid,
        login_time: DateTime<Utc>,
    ) -> PortResult<ActiveShift>;

    async fn get_active_shift(&self, security_id: Uuid) -> PortResult<Option<ActiveShift>>;

    // --- Notifications ---
    async fn insert_notification(&self, notification: NewNotification) -> PortResult<Notification>;

    async fn update_notification_status(
        &self,
        notification_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<()>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<Vec<Notification>>;
}

//=========================================================================================
// Push Gateway
//=========================================================================================

/// The non-error results of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Neither the OAuth credentials nor a legacy key are configured; nothing was sent.
    ConfigurationIncomplete,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Sends `payload` to a single device.
    async fn send(&self, device_token: &str, payload: &PushPayload) -> PortResult<DeliveryOutcome>;
}

//=========================================================================================
// Email
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> PortResult<()>;
}
