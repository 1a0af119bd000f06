//! crates/visitor_core/src/visits.rs
//!
//! The visit session state machine.
//!
//! ```text
//! pending ──approve──▶ approved ──checkout──▶ checked_out
//!    └──────reject───▶ rejected
//! ```
//!
//! Every status change is a single conditional write against the Directory Store.
//! A write that matches no row is a conflict, never a silent success.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    NewVisitSession, Period, Profile, VisitScope, VisitSession, VisitStatus, VisitTransition,
    VisitorContext, VISITOR_NOTIFICATION_KIND,
};
use crate::error::{VisitorError, VisitorResult};
use crate::notifications::{NotificationDispatcher, NotifyRequest};
use crate::ports::{DirectoryStore, PortError};
use crate::shifts::ShiftRegistry;

/// A visitor's own request to visit a unit.
#[derive(Debug, Clone, Default)]
pub struct NewVisitRequest {
    pub visitor_name: String,
    pub national_id: String,
    pub visitor_phone: String,
    pub unit_number: String,
}

impl NewVisitRequest {
    fn validate(&self) -> VisitorResult<()> {
        let fields = [
            &self.visitor_name,
            &self.national_id,
            &self.visitor_phone,
            &self.unit_number,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(VisitorError::Validation("Missing required fields".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct VisitService {
    store: Arc<dyn DirectoryStore>,
    shifts: ShiftRegistry,
    notifications: Arc<NotificationDispatcher>,
}

impl VisitService {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        shifts: ShiftRegistry,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            shifts,
            notifications,
        }
    }

    //=====================================================================================
    // Transitions
    //=====================================================================================

    /// Inserts a `pending` session and alerts the unit's resident.
    pub async fn create_request(&self, request: NewVisitRequest) -> VisitorResult<VisitSession> {
        request.validate()?;

        let resident = self
            .store
            .find_resident_by_unit(&request.unit_number)
            .await?
            .ok_or_else(|| VisitorError::NotFound("Resident not found for this unit".to_string()))?;

        let session = self
            .store
            .insert_visit(NewVisitSession {
                visitor_id: None,
                visitor_name: Some(request.visitor_name),
                national_id: request.national_id,
                visitor_phone: Some(request.visitor_phone),
                unit_number: request.unit_number,
                status: VisitStatus::Pending,
                security_id: None,
                created_at: Utc::now(),
                check_in_at: None,
            })
            .await?;
        info!(visit_id = %session.id, unit = %session.unit_number, "Visit request created");

        self.alert_resident(&resident, &session).await;
        Ok(session)
    }

    /// `pending → approved`, only by the resident of the session's unit.
    pub async fn approve(&self, visit_id: Uuid, acting_user: Uuid) -> VisitorResult<VisitSession> {
        let visit = self.authorize_resident(visit_id, acting_user).await?;
        let approved = self
            .transition(&visit, VisitTransition::Approve { at: Utc::now() })
            .await?;
        info!(%visit_id, "Visit approved");
        Ok(approved)
    }

    /// `pending → rejected`, only by the resident of the session's unit.
    pub async fn reject(&self, visit_id: Uuid, acting_user: Uuid) -> VisitorResult<VisitSession> {
        let visit = self.authorize_resident(visit_id, acting_user).await?;
        let rejected = self.transition(&visit, VisitTransition::Reject).await?;
        info!(%visit_id, "Visit rejected");
        Ok(rejected)
    }

    /// Security staff register and approve a walk-in in one step.
    ///
    /// The visitor id doubles as the national id so the walk-in can be checked
    /// out the same way as any other visitor.
    pub async fn assign_and_approve(
        &self,
        visitor_id: &str,
        unit_number: &str,
        acting_officer: Uuid,
    ) -> VisitorResult<VisitSession> {
        if visitor_id.trim().is_empty() || unit_number.trim().is_empty() {
            return Err(VisitorError::Validation("Missing required fields".to_string()));
        }
        if !self.shifts.is_on_shift(acting_officer).await? {
            return Err(VisitorError::Authorization("no active shift".to_string()));
        }
        self.store
            .find_resident_by_unit(unit_number)
            .await?
            .ok_or_else(|| VisitorError::NotFound("Resident not found.".to_string()))?;

        let now = Utc::now();
        let session = self
            .store
            .insert_visit(NewVisitSession {
                visitor_id: Some(visitor_id.to_string()),
                visitor_name: None,
                national_id: visitor_id.to_string(),
                visitor_phone: None,
                unit_number: unit_number.to_string(),
                status: VisitStatus::Approved,
                security_id: Some(acting_officer),
                created_at: now,
                check_in_at: Some(now),
            })
            .await?;
        info!(visit_id = %session.id, officer = %acting_officer, "Walk-in visit approved by security");
        Ok(session)
    }

    /// `approved → checked_out` for the newest approved session of `national_id`.
    ///
    /// Not idempotent: a second call finds no approved session and fails.
    pub async fn checkout(&self, national_id: &str) -> VisitorResult<VisitSession> {
        if national_id.trim().is_empty() {
            return Err(VisitorError::Validation("Missing national_id".to_string()));
        }
        let visit = self
            .store
            .latest_visit_by_national_id(national_id, VisitStatus::Approved)
            .await?
            .ok_or_else(|| VisitorError::NotFound("Visit not found".to_string()))?;

        let checked_out = self
            .transition(&visit, VisitTransition::CheckOut { at: Utc::now() })
            .await?;
        info!(visit_id = %checked_out.id, "Visitor checked out");
        Ok(checked_out)
    }

    //=====================================================================================
    // Queries
    //=====================================================================================

    pub async fn list_active(&self) -> VisitorResult<Vec<VisitSession>> {
        Ok(self.store.list_visits_by_status(VisitStatus::Approved).await?)
    }

    /// The caller's unit history, newest first.
    pub async fn list_for_unit(&self, caller: Uuid) -> VisitorResult<Vec<VisitSession>> {
        let profile = self.caller_profile(caller).await?;
        let unit = profile
            .unit_number
            .ok_or_else(|| VisitorError::NotFound("Profile has no unit".to_string()))?;
        Ok(self.store.list_visits_for_unit(&unit).await?)
    }

    /// Sessions checked in within the period window that belong to the caller.
    pub async fn list_for_period(
        &self,
        period: &str,
        caller: Uuid,
    ) -> VisitorResult<Vec<VisitSession>> {
        let period: Period = period.parse()?;
        let (start, end) = period.window(Utc::now());
        let profile = self.caller_profile(caller).await?;
        Ok(self
            .store
            .list_visits_checked_in_between(&VisitScope::for_profile(&profile), start, end)
            .await?)
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    async fn caller_profile(&self, caller: Uuid) -> VisitorResult<Profile> {
        self.store.get_profile(caller).await.map_err(|e| match e {
            PortError::NotFound(_) => VisitorError::NotFound("Profile not found".to_string()),
            other => other.into(),
        })
    }

    /// Loads the session and checks the caller is the resident of its unit.
    ///
    /// The unit comes from the caller's stored profile, never from the request.
    async fn authorize_resident(
        &self,
        visit_id: Uuid,
        acting_user: Uuid,
    ) -> VisitorResult<VisitSession> {
        let visit = self.store.get_visit(visit_id).await?;
        let resident = match self.store.get_profile(acting_user).await {
            Ok(profile) => profile,
            Err(PortError::NotFound(_)) => {
                return Err(VisitorError::Authorization("Unauthorized".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if resident.unit_number.as_deref() != Some(visit.unit_number.as_str()) {
            warn!(%visit_id, %acting_user, "Caller is not the resident of the visit's unit");
            return Err(VisitorError::Authorization("Unauthorized".to_string()));
        }
        Ok(visit)
    }

    async fn transition(
        &self,
        visit: &VisitSession,
        transition: VisitTransition,
    ) -> VisitorResult<VisitSession> {
        self.store
            .apply_transition(visit.id, transition)
            .await?
            .ok_or_else(|| {
                VisitorError::Conflict(format!(
                    "visit {} cannot move to {}: expected status {}, last seen {}",
                    visit.id,
                    transition.target(),
                    transition.expected(),
                    visit.status
                ))
            })
    }

    /// Best effort; a delivery problem never fails the visit request itself.
    async fn alert_resident(&self, resident: &Profile, session: &VisitSession) {
        let visitor_name = session.visitor_name.clone().unwrap_or_default();
        let request = NotifyRequest {
            user_id: Some(resident.id),
            message: format!(
                "{} is requesting to visit unit {}",
                visitor_name, session.unit_number
            ),
            kind: VISITOR_NOTIFICATION_KIND.to_string(),
            visitor: Some(VisitorContext {
                visitor_id: session.id.to_string(),
                visitor_name,
                visitor_phone: session.visitor_phone.clone().unwrap_or_default(),
            }),
        };
        if let Err(e) = self.notifications.notify(request).await {
            warn!(visit_id = %session.id, error = ?e, "Could not alert resident about visit request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::memory::InMemoryDirectory;
    use crate::test_support::{officer, resident, GatewayBehavior, RecordingGateway};

    struct Fixture {
        store: Arc<InMemoryDirectory>,
        gateway: Arc<RecordingGateway>,
        service: VisitService,
        shifts: ShiftRegistry,
        resident: Profile,
        officer: Profile,
    }

    fn fixture(behavior: GatewayBehavior) -> Fixture {
        fixture_with(behavior, Vec::new())
    }

    fn fixture_with(behavior: GatewayBehavior, extra_profiles: Vec<Profile>) -> Fixture {
        let resident = resident("A12", Some("device-a12"));
        let officer = officer();
        let store = Arc::new(
            extra_profiles.into_iter().fold(
                InMemoryDirectory::new()
                    .with_profile(resident.clone())
                    .with_profile(officer.clone()),
                InMemoryDirectory::with_profile,
            ),
        );
        let gateway = Arc::new(RecordingGateway::new(behavior));
        let shifts = ShiftRegistry::new(store.clone());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            gateway.clone(),
            "Kikao Homes",
            Duration::from_millis(200),
        ));
        let service = VisitService::new(store.clone(), shifts.clone(), dispatcher);
        Fixture {
            store,
            gateway,
            service,
            shifts,
            resident,
            officer,
        }
    }

    fn jane() -> NewVisitRequest {
        NewVisitRequest {
            visitor_name: "Jane Doe".to_string(),
            national_id: "ID123".to_string(),
            visitor_phone: "0700000000".to_string(),
            unit_number: "A12".to_string(),
        }
    }

    #[tokio::test]
    async fn full_lifecycle_from_request_to_checkout() {
        let f = fixture(GatewayBehavior::Deliver);

        let created = f.service.create_request(jane()).await.unwrap();
        assert_eq!(created.status, VisitStatus::Pending);
        assert_eq!(created.security_id, None);
        assert_eq!(created.check_in_at, None);

        let approved = f.service.approve(created.id, f.resident.id).await.unwrap();
        assert_eq!(approved.status, VisitStatus::Approved);
        assert!(approved.check_in_at.is_some());

        let again = f.service.approve(created.id, f.resident.id).await;
        assert!(matches!(again, Err(VisitorError::Conflict(_))));

        let checked_out = f.service.checkout("ID123").await.unwrap();
        assert_eq!(checked_out.status, VisitStatus::CheckedOut);
        let check_in = checked_out.check_in_at.unwrap();
        let check_out = checked_out.check_out_at.unwrap();
        assert!(check_in <= check_out);

        let second = f.service.checkout("ID123").await;
        assert!(matches!(second, Err(VisitorError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_request_validates_and_requires_a_resident() {
        let f = fixture(GatewayBehavior::Deliver);

        let mut missing = jane();
        missing.visitor_phone = "  ".to_string();
        assert!(matches!(
            f.service.create_request(missing).await,
            Err(VisitorError::Validation(_))
        ));

        let mut unknown_unit = jane();
        unknown_unit.unit_number = "Z99".to_string();
        assert!(matches!(
            f.service.create_request(unknown_unit).await,
            Err(VisitorError::NotFound(_))
        ));
        assert!(f.store.visits().is_empty());
    }

    #[tokio::test]
    async fn create_request_alerts_the_resident() {
        let f = fixture(GatewayBehavior::Deliver);
        f.service.create_request(jane()).await.unwrap();

        let notifications = f.store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, f.resident.id);
        assert_eq!(notifications[0].kind, "visitor");
        assert_eq!(f.gateway.sent_count(), 1);
    }

    #[tokio::test]
    async fn failed_alert_does_not_fail_the_request() {
        let f = fixture(GatewayBehavior::Fail);
        let created = f.service.create_request(jane()).await.unwrap();
        assert_eq!(created.status, VisitStatus::Pending);
        assert_eq!(f.store.visits().len(), 1);
    }

    #[tokio::test]
    async fn only_the_units_resident_may_approve() {
        let other = resident("B7", None);
        let f = fixture_with(GatewayBehavior::Deliver, vec![other.clone()]);
        let b7_visit = f
            .store
            .insert_visit(NewVisitSession {
                visitor_id: None,
                visitor_name: Some("X".to_string()),
                national_id: "ID9".to_string(),
                visitor_phone: Some("1".to_string()),
                unit_number: "B7".to_string(),
                status: VisitStatus::Pending,
                security_id: None,
                created_at: Utc::now(),
                check_in_at: None,
            })
            .await
            .unwrap();
        let created = f.service.create_request(jane()).await.unwrap();

        // A resident of another unit is refused in both directions.
        let err = f.service.approve(created.id, other.id).await.unwrap_err();
        assert!(matches!(err, VisitorError::Authorization(_)));
        let err = f.service.approve(b7_visit.id, f.resident.id).await.unwrap_err();
        assert!(matches!(err, VisitorError::Authorization(_)));
        let err = f.service.approve(created.id, f.officer.id).await.unwrap_err();
        assert!(matches!(err, VisitorError::Authorization(_)));

        let approved = f.service.approve(b7_visit.id, other.id).await.unwrap();
        assert_eq!(approved.status, VisitStatus::Approved);

        let missing = f.service.approve(Uuid::new_v4(), f.resident.id).await;
        assert!(matches!(missing, Err(VisitorError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejected_visit_is_terminal() {
        let f = fixture(GatewayBehavior::Deliver);
        let created = f.service.create_request(jane()).await.unwrap();

        let rejected = f.service.reject(created.id, f.resident.id).await.unwrap();
        assert_eq!(rejected.status, VisitStatus::Rejected);
        assert_eq!(rejected.check_in_at, None);

        assert!(matches!(
            f.service.approve(created.id, f.resident.id).await,
            Err(VisitorError::Conflict(_))
        ));
        assert!(matches!(
            f.service.checkout("ID123").await,
            Err(VisitorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn checkout_from_pending_is_not_found() {
        let f = fixture(GatewayBehavior::Deliver);
        f.service.create_request(jane()).await.unwrap();
        assert!(matches!(
            f.service.checkout("ID123").await,
            Err(VisitorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn checkout_only_affects_the_newest_approved_session() {
        let f = fixture(GatewayBehavior::Deliver);
        let older = f.service.create_request(jane()).await.unwrap();
        f.service.approve(older.id, f.resident.id).await.unwrap();
        let newer = f.service.create_request(jane()).await.unwrap();
        f.service.approve(newer.id, f.resident.id).await.unwrap();

        let checked_out = f.service.checkout("ID123").await.unwrap();
        assert_eq!(checked_out.id, newer.id);

        let older_now = f.store.get_visit(older.id).await.unwrap();
        assert_eq!(older_now.status, VisitStatus::Approved);
    }

    #[tokio::test]
    async fn assign_and_approve_requires_an_active_shift() {
        let f = fixture(GatewayBehavior::Deliver);

        let err = f
            .service
            .assign_and_approve("ID555", "A12", f.officer.id)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitorError::Authorization(_)));

        f.shifts.log_in(f.officer.id).await.unwrap();
        let err = f
            .service
            .assign_and_approve("ID555", "Z99", f.officer.id)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitorError::NotFound(_)));

        let session = f
            .service
            .assign_and_approve("ID555", "A12", f.officer.id)
            .await
            .unwrap();
        assert_eq!(session.status, VisitStatus::Approved);
        assert_eq!(session.security_id, Some(f.officer.id));
        assert_eq!(session.check_in_at, Some(session.created_at));
        assert!(f.store.notifications().is_empty());

        let checked_out = f.service.checkout("ID555").await.unwrap();
        assert_eq!(checked_out.id, session.id);
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_scoped() {
        let f = fixture(GatewayBehavior::Deliver);
        let first = f.service.create_request(jane()).await.unwrap();
        f.service.approve(first.id, f.resident.id).await.unwrap();
        let second = f.service.create_request(jane()).await.unwrap();
        f.service.approve(second.id, f.resident.id).await.unwrap();
        f.service.create_request(jane()).await.unwrap();

        let active = f.service.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, second.id);

        let mine = f.service.list_for_unit(f.resident.id).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let no_unit = f.service.list_for_unit(f.officer.id).await;
        assert!(matches!(no_unit, Err(VisitorError::NotFound(_))));
    }

    #[tokio::test]
    async fn period_listing_filters_by_check_in_window() {
        let f = fixture(GatewayBehavior::Deliver);
        let recent = f.service.create_request(jane()).await.unwrap();
        f.service.approve(recent.id, f.resident.id).await.unwrap();
        f.service.create_request(jane()).await.unwrap();

        f.store
            .insert_visit(NewVisitSession {
                visitor_id: None,
                visitor_name: Some("Old".to_string()),
                national_id: "ID0".to_string(),
                visitor_phone: Some("1".to_string()),
                unit_number: "A12".to_string(),
                status: VisitStatus::CheckedOut,
                security_id: None,
                created_at: Utc::now() - chrono::Duration::days(30),
                check_in_at: Some(Utc::now() - chrono::Duration::days(30)),
            })
            .await
            .unwrap();

        let weekly = f.service.list_for_period("weekly", f.resident.id).await.unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].id, recent.id);

        let officer_view = f.service.list_for_period("weekly", f.officer.id).await.unwrap();
        assert!(officer_view.is_empty());

        let bad = f.service.list_for_period("quarterly", f.resident.id).await;
        assert!(matches!(bad, Err(VisitorError::Validation(_))));
    }
}
