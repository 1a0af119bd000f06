//! crates/visitor_core/src/notifications.rs
//!
//! The notification dispatcher: persist first, then attempt best-effort push delivery.
//!
//! A notification row always exists before any network call starts. Delivery
//! failures only move it to `failed`; they never undo the write.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{NewNotification, Notification, NotificationStatus, PushPayload, VisitorContext};
use crate::error::{VisitorError, VisitorResult};
use crate::ports::{DeliveryOutcome, DirectoryStore, PushGateway};

/// Input to [`NotificationDispatcher::notify`].
#[derive(Debug, Clone)]
pub struct NotifyRequest {
    pub user_id: Option<Uuid>,
    pub message: String,
    pub kind: String,
    pub visitor: Option<VisitorContext>,
}

/// How a successful `notify` call ended.
#[derive(Debug, Clone)]
pub enum NotifyOutcome {
    Delivered(Notification),
    /// Saved for in-app reading; the target has no device token.
    NoDeviceToken(Notification),
    /// Saved for in-app reading; push credentials are not configured.
    PushNotConfigured(Notification),
}

impl NotifyOutcome {
    pub fn notification(&self) -> &Notification {
        match self {
            NotifyOutcome::Delivered(n)
            | NotifyOutcome::NoDeviceToken(n)
            | NotifyOutcome::PushNotConfigured(n) => n,
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self {
            NotifyOutcome::Delivered(_) => None,
            NotifyOutcome::NoDeviceToken(_) => {
                Some("Notification saved, but no device token found.")
            }
            NotifyOutcome::PushNotConfigured(_) => {
                Some("Notification saved, but push delivery is not configured.")
            }
        }
    }
}

pub struct NotificationDispatcher {
    store: Arc<dyn DirectoryStore>,
    gateway: Arc<dyn PushGateway>,
    push_title: String,
    delivery_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        gateway: Arc<dyn PushGateway>,
        push_title: impl Into<String>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            push_title: push_title.into(),
            delivery_timeout,
        }
    }

    pub async fn notify(&self, request: NotifyRequest) -> VisitorResult<NotifyOutcome> {
        // 1. Validate before any write.
        let user_id = request
            .user_id
            .ok_or_else(|| VisitorError::Validation("Missing required fields".to_string()))?;
        if request.message.trim().is_empty() || request.kind.trim().is_empty() {
            return Err(VisitorError::Validation("Missing required fields".to_string()));
        }
        let payload = PushPayload::for_notification(
            &self.push_title,
            &request.message,
            &request.kind,
            request.visitor,
        )?;

        // 2. Persist. This must succeed before delivery is attempted.
        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id,
                message: request.message,
                kind: request.kind,
            })
            .await?;

        // 3. Find the push target.
        let device_token = match self.store.get_profile(user_id).await {
            Ok(profile) => profile.device_token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(%user_id, error = ?e, "Could not load profile for push delivery");
                None
            }
        };
        let Some(device_token) = device_token else {
            warn!(%user_id, notification_id = %notification.id, "Notification saved, no device token");
            return Ok(NotifyOutcome::NoDeviceToken(notification));
        };

        // 4. Deliver within a bounded time. No lock is held across this await.
        match tokio::time::timeout(self.delivery_timeout, self.gateway.send(&device_token, &payload))
            .await
        {
            Ok(Ok(DeliveryOutcome::Delivered)) => {
                info!(notification_id = %notification.id, "Push notification delivered");
                Ok(NotifyOutcome::Delivered(notification))
            }
            Ok(Ok(DeliveryOutcome::ConfigurationIncomplete)) => {
                warn!(notification_id = %notification.id, "Push gateway not configured; skipping delivery");
                Ok(NotifyOutcome::PushNotConfigured(notification))
            }
            Ok(Err(e)) => {
                error!(notification_id = %notification.id, error = ?e, "Push notification error");
                self.mark_failed(&notification).await;
                Err(e.into())
            }
            Err(_) => {
                // The record stays `unread` and can be delivered again later.
                warn!(notification_id = %notification.id, "Push delivery timed out");
                Err(VisitorError::Delivery {
                    message: "push delivery timed out".to_string(),
                    upstream: None,
                })
            }
        }
    }

    /// Best effort: a failure here is logged and never replaces the delivery error.
    async fn mark_failed(&self, notification: &Notification) {
        if let Err(e) = self
            .store
            .update_notification_status(notification.id, NotificationStatus::Failed)
            .await
        {
            error!(
                notification_id = %notification.id,
                error = ?e,
                "Failed to update notification status to failed"
            );
        }
    }

    pub async fn get_unread(&self, user_id: Uuid) -> VisitorResult<Vec<Notification>> {
        Ok(self
            .store
            .list_notifications(user_id, NotificationStatus::Unread)
            .await?)
    }
}
