//! crates/visitor_core/src/shifts.rs
//!
//! Tracks which security officer is currently on duty.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::ActiveShift;
use crate::error::VisitorResult;
use crate::ports::DirectoryStore;

#[derive(Clone)]
pub struct ShiftRegistry {
    store: Arc<dyn DirectoryStore>,
}

impl ShiftRegistry {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Starts (or refreshes) the officer's shift. No history is retained.
    pub async fn log_in(&self, security_id: Uuid) -> VisitorResult<ActiveShift> {
        let shift = self.store.upsert_active_shift(security_id, Utc::now()).await?;
        info!(%security_id, login_time = %shift.login_time, "Security officer on shift");
        Ok(shift)
    }

    pub async fn is_on_shift(&self, security_id: Uuid) -> VisitorResult<bool> {
        Ok(self.store.get_active_shift(security_id).await?.is_some())
    }
}
