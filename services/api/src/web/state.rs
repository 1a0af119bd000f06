//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use std::time::Duration;

use visitor_core::{
    ApprovalMailer, DirectoryStore, EmailService, NotificationDispatcher, PushGateway,
    ShiftRegistry, VisitService,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub directory: Arc<dyn DirectoryStore>,
    pub visits: VisitService,
    pub shifts: ShiftRegistry,
    pub notifications: Arc<NotificationDispatcher>,
    pub mailer: ApprovalMailer,
}

impl AppState {
    /// Wires the engines over one Directory Store and the two delivery adapters.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        gateway: Arc<dyn PushGateway>,
        email: Arc<dyn EmailService>,
        push_title: impl Into<String>,
        delivery_timeout: Duration,
    ) -> Self {
        let shifts = ShiftRegistry::new(directory.clone());
        let notifications = Arc::new(NotificationDispatcher::new(
            directory.clone(),
            gateway,
            push_title,
            delivery_timeout,
        ));
        let visits = VisitService::new(directory.clone(), shifts.clone(), notifications.clone());
        Self {
            directory,
            visits,
            shifts,
            notifications,
            mailer: ApprovalMailer::new(email),
        }
    }
}
