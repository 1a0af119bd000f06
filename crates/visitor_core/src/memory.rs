//! crates/visitor_core/src/memory.rs
//!
//! An in-memory `DirectoryStore`. Status transitions are compare-and-set under a
//! single lock, so it honors the same contract as the SQL adapter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ActiveShift, NewNotification, NewVisitSession, Notification, NotificationStatus, Profile,
    Role, VisitScope, VisitSession, VisitStatus, VisitTransition,
};
use crate::ports::{DirectoryStore, PortError, PortResult};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    access_tokens: HashMap<String, Uuid>,
    visits: Vec<VisitSession>,
    shifts: HashMap<Uuid, ActiveShift>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    tables: Mutex<Tables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.profiles.push(profile);
        }
        self
    }

    pub fn with_access_token(self, token: &str, user_id: Uuid) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.access_tokens.insert(token.to_string(), user_id);
        }
        self
    }

    /// Snapshot of every stored visit session, in insertion order.
    pub fn visits(&self) -> Vec<VisitSession> {
        self.tables
            .lock()
            .map(|t| t.visits.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every stored notification, in insertion order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.tables
            .lock()
            .map(|t| t.notifications.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory directory lock poisoned".to_string()))
    }
}

/// Newest first; later inserts win ties on `created_at`.
fn newest_first<T>(mut rows: Vec<(usize, T)>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by(|(ia, a), (ib, b)| created_at(b).cmp(&created_at(a)).then(ib.cmp(ia)));
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn resolve_caller(&self, access_token: &str) -> PortResult<Uuid> {
        self.lock()?
            .access_tokens
            .get(access_token)
            .copied()
            .ok_or(PortError::Unauthorized)
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.lock()?
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn find_resident_by_unit(&self, unit_number: &str) -> PortResult<Option<Profile>> {
        Ok(self
            .lock()?
            .profiles
            .iter()
            .find(|p| p.role == Role::Resident && p.unit_number.as_deref() == Some(unit_number))
            .cloned())
    }

    async fn insert_visit(&self, visit: NewVisitSession) -> PortResult<VisitSession> {
        let session = VisitSession {
            id: Uuid::new_v4(),
            visitor_id: visit.visitor_id,
            visitor_name: visit.visitor_name,
            national_id: visit.national_id,
            visitor_phone: visit.visitor_phone,
            unit_number: visit.unit_number,
            status: visit.status,
            security_id: visit.security_id,
            created_at: visit.created_at,
            check_in_at: visit.check_in_at,
            check_out_at: None,
        };
        self.lock()?.visits.push(session.clone());
        Ok(session)
    }

    async fn get_visit(&self, visit_id: Uuid) -> PortResult<VisitSession> {
        self.lock()?
            .visits
            .iter()
            .find(|v| v.id == visit_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Visit {} not found", visit_id)))
    }

    async fn apply_transition(
        &self,
        visit_id: Uuid,
        transition: VisitTransition,
    ) -> PortResult<Option<VisitSession>> {
        let mut tables = self.lock()?;
        let Some(session) = tables
            .visits
            .iter_mut()
            .find(|v| v.id == visit_id && v.status == transition.expected())
        else {
            return Ok(None);
        };
        transition.apply(session);
        Ok(Some(session.clone()))
    }

    async fn latest_visit_by_national_id(
        &self,
        national_id: &str,
        status: VisitStatus,
    ) -> PortResult<Option<VisitSession>> {
        let tables = self.lock()?;
        let matching: Vec<(usize, VisitSession)> = tables
            .visits
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, v)| v.national_id == national_id && v.status == status)
            .collect();
        Ok(newest_first(matching, |v| v.created_at).into_iter().next())
    }

    async fn list_visits_by_status(&self, status: VisitStatus) -> PortResult<Vec<VisitSession>> {
        let tables = self.lock()?;
        let matching: Vec<(usize, VisitSession)> = tables
            .visits
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, v)| v.status == status)
            .collect();
        Ok(newest_first(matching, |v| v.created_at))
    }

    async fn list_visits_for_unit(&self, unit_number: &str) -> PortResult<Vec<VisitSession>> {
        let tables = self.lock()?;
        let matching: Vec<(usize, VisitSession)> = tables
            .visits
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, v)| v.unit_number == unit_number)
            .collect();
        Ok(newest_first(matching, |v| v.created_at))
    }

    async fn list_visits_checked_in_between(
        &self,
        scope: &VisitScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<VisitSession>> {
        let tables = self.lock()?;
        let matching: Vec<(usize, VisitSession)> = tables
            .visits
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, v)| {
                scope.contains(v)
                    && v.check_in_at.is_some_and(|at| at >= start && at <= end)
            })
            .collect();
        Ok(newest_first(matching, |v| v.created_at))
    }

    async fn upsert_active_shift(
        &self,
        security_id: Uuid,
        login_time: DateTime<Utc>,
    ) -> PortResult<ActiveShift> {
        let shift = ActiveShift {
            security_id,
            login_time,
        };
        self.lock()?.shifts.insert(security_id, shift.clone());
        Ok(shift)
    }

    async fn get_active_shift(&self, security_id: Uuid) -> PortResult<Option<ActiveShift>> {
        Ok(self.lock()?.shifts.get(&security_id).cloned())
    }

    async fn insert_notification(&self, notification: NewNotification) -> PortResult<Notification> {
        let record = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            message: notification.message,
            kind: notification.kind,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
        };
        self.lock()?.notifications.push(record.clone());
        Ok(record)
    }

    async fn update_notification_status(
        &self,
        notification_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<()> {
        let mut tables = self.lock()?;
        let record = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Notification {} not found", notification_id))
            })?;
        record.status = status;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<Vec<Notification>> {
        let tables = self.lock()?;
        let matching: Vec<(usize, Notification)> = tables
            .notifications
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, n)| n.user_id == user_id && n.status == status)
            .collect();
        Ok(newest_first(matching, |n| n.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_visit(national_id: &str, status: VisitStatus, created_at: DateTime<Utc>) -> NewVisitSession {
        NewVisitSession {
            visitor_id: None,
            visitor_name: Some("Jane Doe".to_string()),
            national_id: national_id.to_string(),
            visitor_phone: Some("0700000000".to_string()),
            unit_number: "A12".to_string(),
            status,
            security_id: None,
            created_at,
            check_in_at: None,
        }
    }

    #[tokio::test]
    async fn transition_only_applies_from_expected_status() {
        let store = InMemoryDirectory::new();
        let visit = store
            .insert_visit(new_visit("ID1", VisitStatus::Pending, Utc::now()))
            .await
            .unwrap();

        let now = Utc::now();
        let approved = store
            .apply_transition(visit.id, VisitTransition::Approve { at: now })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, VisitStatus::Approved);
        assert_eq!(approved.check_in_at, Some(now));

        let again = store
            .apply_transition(visit.id, VisitTransition::Approve { at: now })
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn latest_by_national_id_prefers_newest_created_at() {
        let store = InMemoryDirectory::new();
        let now = Utc::now();
        let newer = store
            .insert_visit(new_visit("ID1", VisitStatus::Approved, now))
            .await
            .unwrap();
        store
            .insert_visit(new_visit("ID1", VisitStatus::Approved, now - Duration::hours(2)))
            .await
            .unwrap();

        let found = store
            .latest_visit_by_national_id("ID1", VisitStatus::Approved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[tokio::test]
    async fn shift_upsert_keeps_a_single_row_per_officer() {
        let store = InMemoryDirectory::new();
        let officer = Uuid::new_v4();
        let first = Utc::now() - Duration::hours(8);
        store.upsert_active_shift(officer, first).await.unwrap();
        let second = Utc::now();
        store.upsert_active_shift(officer, second).await.unwrap();

        let shift = store.get_active_shift(officer).await.unwrap().unwrap();
        assert_eq!(shift.login_time, second);
        assert_eq!(store.lock().unwrap().shifts.len(), 1);
    }

    #[tokio::test]
    async fn unknown_access_token_is_unauthorized() {
        let store = InMemoryDirectory::new().with_access_token("good", Uuid::new_v4());
        assert!(store.resolve_caller("good").await.is_ok());
        assert!(matches!(
            store.resolve_caller("bad").await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn notifications_are_listed_newest_first() {
        let store = InMemoryDirectory::new();
        let user = Uuid::new_v4();
        for message in ["first", "second", "third"] {
            store
                .insert_notification(NewNotification {
                    user_id: user,
                    message: message.to_string(),
                    kind: "alert".to_string(),
                })
                .await
                .unwrap();
        }

        let listed = store
            .list_notifications(user, NotificationStatus::Unread)
            .await
            .unwrap();
        let messages: Vec<&str> = listed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["third", "second", "first"]);
    }
}
