//! crates/visitor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the visitor management backend.
//! These structs are independent of any database or serialization format.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::error::VisitorError;

//=========================================================================================
// Profiles (owned by the Directory Store, read-only here)
//=========================================================================================

/// The role a directory profile plays in the complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Resident,
    Security,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::Security => "security",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resident" => Ok(Role::Resident),
            "security" => Ok(Role::Security),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A user profile as stored in the Directory Store.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub role: Role,
    /// Only residents are bound to a unit.
    pub unit_number: Option<String>,
    pub full_name: Option<String>,
    /// Push target; `None` means the user can only read notifications in-app.
    pub device_token: Option<String>,
}

//=========================================================================================
// Visit Sessions
//=========================================================================================

/// Lifecycle state of a visit session.
///
/// `pending → approved → checked_out` and `pending → rejected`. Nothing leaves
/// `rejected` or `checked_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitStatus {
    Pending,
    Approved,
    Rejected,
    CheckedOut,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Approved => "approved",
            VisitStatus::Rejected => "rejected",
            VisitStatus::CheckedOut => "checked_out",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VisitStatus::Pending),
            "approved" => Ok(VisitStatus::Approved),
            "rejected" => Ok(VisitStatus::Rejected),
            "checked_out" => Ok(VisitStatus::CheckedOut),
            other => Err(format!("unknown visit status '{}'", other)),
        }
    }
}

/// One visitor's request, approval, and check-in/out against a unit.
#[derive(Debug, Clone)]
pub struct VisitSession {
    pub id: Uuid,
    /// Set for walk-ins registered directly by security staff.
    pub visitor_id: Option<String>,
    pub visitor_name: Option<String>,
    /// Durable lookup key for checkout.
    pub national_id: String,
    pub visitor_phone: Option<String>,
    pub unit_number: String,
    pub status: VisitStatus,
    pub security_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
}

/// The fields needed to insert a visit session. The store assigns the `id`.
#[derive(Debug, Clone)]
pub struct NewVisitSession {
    pub visitor_id: Option<String>,
    pub visitor_name: Option<String>,
    pub national_id: String,
    pub visitor_phone: Option<String>,
    pub unit_number: String,
    pub status: VisitStatus,
    pub security_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub check_in_at: Option<DateTime<Utc>>,
}

/// A status change applied as a single conditional write.
///
/// The store must only apply it where the current status equals
/// [`VisitTransition::expected`], and report zero affected rows otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitTransition {
    Approve { at: DateTime<Utc> },
    Reject,
    CheckOut { at: DateTime<Utc> },
}

impl VisitTransition {
    /// The status the session must currently hold.
    pub fn expected(&self) -> VisitStatus {
        match self {
            VisitTransition::Approve { .. } | VisitTransition::Reject => VisitStatus::Pending,
            VisitTransition::CheckOut { .. } => VisitStatus::Approved,
        }
    }

    pub fn target(&self) -> VisitStatus {
        match self {
            VisitTransition::Approve { .. } => VisitStatus::Approved,
            VisitTransition::Reject => VisitStatus::Rejected,
            VisitTransition::CheckOut { .. } => VisitStatus::CheckedOut,
        }
    }

    pub fn check_in_at(&self) -> Option<DateTime<Utc>> {
        match self {
            VisitTransition::Approve { at } => Some(*at),
            _ => None,
        }
    }

    pub fn check_out_at(&self) -> Option<DateTime<Utc>> {
        match self {
            VisitTransition::CheckOut { at } => Some(*at),
            _ => None,
        }
    }

    /// Applies the transition to an in-memory copy of the session.
    pub fn apply(&self, session: &mut VisitSession) {
        session.status = self.target();
        if let Some(at) = self.check_in_at() {
            session.check_in_at = Some(at);
        }
        if let Some(at) = self.check_out_at() {
            session.check_out_at = Some(at);
        }
    }
}

/// Which sessions count as "the caller's own" for period reports.
#[derive(Debug, Clone)]
pub struct VisitScope {
    /// Sessions targeting this unit (residents).
    pub unit_number: Option<String>,
    /// Sessions actioned by this officer (security staff).
    pub security_id: Uuid,
}

impl VisitScope {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            unit_number: profile.unit_number.clone(),
            security_id: profile.id,
        }
    }

    pub fn contains(&self, session: &VisitSession) -> bool {
        self.unit_number.as_deref() == Some(session.unit_number.as_str())
            || session.security_id == Some(self.security_id)
    }
}

/// Reporting window for `ListForPeriod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    /// Returns the `[start, end]` window that ends at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            Period::Weekly => now - Duration::days(7),
            Period::Monthly => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
            Period::Yearly => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
        };
        (start, now)
    }
}

impl FromStr for Period {
    type Err = VisitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "yearly" => Ok(Period::Yearly),
            _ => Err(VisitorError::Validation("Invalid period".to_string())),
        }
    }
}

//=========================================================================================
// Shifts
//=========================================================================================

/// "Officer X is currently on duty." At most one row per officer.
#[derive(Debug, Clone)]
pub struct ActiveShift {
    pub security_id: Uuid,
    pub login_time: DateTime<Utc>,
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Unread,
    Read,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(NotificationStatus::Unread),
            "read" => Ok(NotificationStatus::Read),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(format!("unknown notification status '{}'", other)),
        }
    }
}

/// A durable notification record.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    /// Free-form classification, e.g. `visitor` or `alert`.
    pub kind: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be persisted. It is always created `unread`.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub message: String,
    pub kind: String,
}

/// Details about the visitor a `visitor` notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorContext {
    pub visitor_id: String,
    pub visitor_name: String,
    pub visitor_phone: String,
}

impl VisitorContext {
    pub fn is_complete(&self) -> bool {
        [&self.visitor_id, &self.visitor_name, &self.visitor_phone]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}

/// The notification type that requires a [`VisitorContext`].
pub const VISITOR_NOTIFICATION_KIND: &str = "visitor";

/// Outbound push content, selected explicitly by notification type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushPayload {
    Basic {
        title: String,
        body: String,
        kind: String,
    },
    VisitorAlert {
        title: String,
        body: String,
        visitor: VisitorContext,
    },
}

impl PushPayload {
    /// Builds the payload for a notification of the given type.
    ///
    /// A `visitor` notification without a complete visitor context is rejected.
    pub fn for_notification(
        title: &str,
        body: &str,
        kind: &str,
        visitor: Option<VisitorContext>,
    ) -> Result<Self, VisitorError> {
        if kind == VISITOR_NOTIFICATION_KIND {
            let visitor = visitor.filter(VisitorContext::is_complete).ok_or_else(|| {
                VisitorError::Validation(
                    "visitorData is required for visitor notifications".to_string(),
                )
            })?;
            Ok(PushPayload::VisitorAlert {
                title: title.to_string(),
                body: body.to_string(),
                visitor,
            })
        } else {
            Ok(PushPayload::Basic {
                title: title.to_string(),
                body: body.to_string(),
                kind: kind.to_string(),
            })
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PushPayload::Basic { title, .. } | PushPayload::VisitorAlert { title, .. } => title,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            PushPayload::Basic { body, .. } | PushPayload::VisitorAlert { body, .. } => body,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            PushPayload::Basic { kind, .. } => kind,
            PushPayload::VisitorAlert { .. } => VISITOR_NOTIFICATION_KIND,
        }
    }

    /// The string-valued `data` map carried alongside the visible notification.
    pub fn data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), self.kind().to_string());
        if let PushPayload::VisitorAlert { visitor, .. } = self {
            data.insert("visitor_id".to_string(), visitor.visitor_id.clone());
            data.insert("visitor_name".to_string(), visitor.visitor_name.clone());
            data.insert("visitor_phone".to_string(), visitor.visitor_phone.clone());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn weekly_window_spans_the_last_seven_days() {
        let now = at(2025, 3, 12, 15);
        let (start, end) = Period::Weekly.window(now);
        assert_eq!(start, at(2025, 3, 5, 15));
        assert_eq!(end, now);
    }

    #[test]
    fn monthly_and_yearly_windows_start_at_calendar_boundaries() {
        let now = at(2025, 3, 12, 15);
        assert_eq!(Period::Monthly.window(now).0, at(2025, 3, 1, 0));
        assert_eq!(Period::Yearly.window(now).0, at(2025, 1, 1, 0));
    }

    #[test]
    fn unsupported_period_is_a_validation_error() {
        let err = "quarterly".parse::<Period>().unwrap_err();
        assert!(matches!(err, VisitorError::Validation(_)));
    }

    #[test]
    fn roles_round_trip_through_their_stored_names() {
        for role in [Role::Resident, Role::Security, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn transitions_declare_their_precondition() {
        let now = Utc::now();
        assert_eq!(VisitTransition::Approve { at: now }.expected(), VisitStatus::Pending);
        assert_eq!(VisitTransition::Reject.expected(), VisitStatus::Pending);
        assert_eq!(VisitTransition::CheckOut { at: now }.expected(), VisitStatus::Approved);
    }

    #[test]
    fn visitor_payload_requires_context() {
        let err = PushPayload::for_notification("Kikao Homes", "hi", "visitor", None).unwrap_err();
        assert!(matches!(err, VisitorError::Validation(_)));
    }

    #[test]
    fn visitor_payload_rejects_blank_context() {
        let blank = VisitorContext {
            visitor_id: String::new(),
            visitor_name: "  ".to_string(),
            visitor_phone: String::new(),
        };
        let err = PushPayload::for_notification("Kikao Homes", "hi", "visitor", Some(blank))
            .unwrap_err();
        assert!(matches!(err, VisitorError::Validation(_)));
    }

    #[test]
    fn visitor_payload_carries_visitor_fields_in_data() {
        let visitor = VisitorContext {
            visitor_id: "v-1".to_string(),
            visitor_name: "Jane Doe".to_string(),
            visitor_phone: "0700000000".to_string(),
        };
        let payload =
            PushPayload::for_notification("Kikao Homes", "at the gate", "visitor", Some(visitor))
                .unwrap();
        let data = payload.data();
        assert_eq!(data.get("type").map(String::as_str), Some("visitor"));
        assert_eq!(data.get("visitor_name").map(String::as_str), Some("Jane Doe"));

        let basic = PushPayload::for_notification("Kikao Homes", "water off", "alert", None).unwrap();
        assert_eq!(basic.data().len(), 1);
        assert_eq!(basic.kind(), "alert");
    }
}
