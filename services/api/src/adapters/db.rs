//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DirectoryStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use visitor_core::domain::{
    ActiveShift, NewNotification, NewVisitSession, Notification, NotificationStatus, Profile,
    Role, VisitScope, VisitSession, VisitStatus, VisitTransition,
};
use visitor_core::ports::{DirectoryStore, PortError, PortResult};

const VISIT_COLUMNS: &str = "id, visitor_id, visitor_name, national_id, visitor_phone, unit_number, \
     status, security_id, created_at, check_in_at, check_out_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, message, type, status, created_at";

const PROFILE_COLUMNS: &str = "id, role, unit_number, full_name, device_token";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DirectoryStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    role: String,
    unit_number: Option<String>,
    full_name: Option<String>,
    device_token: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        Ok(Profile {
            id: self.id,
            role: self.role.parse().map_err(PortError::Unexpected)?,
            unit_number: self.unit_number,
            full_name: self.full_name,
            device_token: self.device_token,
        })
    }
}

#[derive(FromRow)]
struct VisitRecord {
    id: Uuid,
    visitor_id: Option<String>,
    visitor_name: Option<String>,
    national_id: String,
    visitor_phone: Option<String>,
    unit_number: String,
    status: String,
    security_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    check_in_at: Option<DateTime<Utc>>,
    check_out_at: Option<DateTime<Utc>>,
}
impl VisitRecord {
    fn to_domain(self) -> PortResult<VisitSession> {
        Ok(VisitSession {
            id: self.id,
            visitor_id: self.visitor_id,
            visitor_name: self.visitor_name,
            national_id: self.national_id,
            visitor_phone: self.visitor_phone,
            unit_number: self.unit_number,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            security_id: self.security_id,
            created_at: self.created_at,
            check_in_at: self.check_in_at,
            check_out_at: self.check_out_at,
        })
    }
}

#[derive(FromRow)]
struct ShiftRecord {
    security_id: Uuid,
    login_time: DateTime<Utc>,
}
impl ShiftRecord {
    fn to_domain(self) -> ActiveShift {
        ActiveShift {
            security_id: self.security_id,
            login_time: self.login_time,
        }
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    message: String,
    #[sqlx(rename = "type")]
    kind: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            message: self.message,
            kind: self.kind,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
        })
    }
}

fn visits_to_domain(records: Vec<VisitRecord>) -> PortResult<Vec<VisitSession>> {
    records.into_iter().map(VisitRecord::to_domain).collect()
}

//=========================================================================================
// `DirectoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DirectoryStore for DbAdapter {
    async fn resolve_caller(&self, access_token: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Profile {} not found", user_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn find_resident_by_unit(&self, unit_number: &str) -> PortResult<Option<Profile>> {
        let sql = format!(
            "SELECT {} FROM profiles WHERE unit_number = $1 AND role = $2 \
             ORDER BY created_at ASC LIMIT 1",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(unit_number)
            .bind(Role::Resident.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(ProfileRecord::to_domain).transpose()
    }

    async fn insert_visit(&self, visit: NewVisitSession) -> PortResult<VisitSession> {
        let sql = format!(
            "INSERT INTO visit_sessions \
             (id, visitor_id, visitor_name, national_id, visitor_phone, unit_number, status, \
              security_id, created_at, check_in_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            VISIT_COLUMNS
        );
        let record = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(visit.visitor_id)
            .bind(visit.visitor_name)
            .bind(visit.national_id)
            .bind(visit.visitor_phone)
            .bind(visit.unit_number)
            .bind(visit.status.as_str())
            .bind(visit.security_id)
            .bind(visit.created_at)
            .bind(visit.check_in_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_visit(&self, visit_id: Uuid) -> PortResult<VisitSession> {
        let sql = format!("SELECT {} FROM visit_sessions WHERE id = $1", VISIT_COLUMNS);
        let record = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(visit_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Visit {} not found", visit_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn apply_transition(
        &self,
        visit_id: Uuid,
        transition: VisitTransition,
    ) -> PortResult<Option<VisitSession>> {
        // The precondition lives in the WHERE clause; zero rows means it did not hold.
        let sql = format!(
            "UPDATE visit_sessions \
             SET status = $1, \
                 check_in_at = COALESCE($2, check_in_at), \
                 check_out_at = COALESCE($3, check_out_at) \
             WHERE id = $4 AND status = $5 \
             RETURNING {}",
            VISIT_COLUMNS
        );
        let record = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(transition.target().as_str())
            .bind(transition.check_in_at())
            .bind(transition.check_out_at())
            .bind(visit_id)
            .bind(transition.expected().as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(VisitRecord::to_domain).transpose()
    }

    async fn latest_visit_by_national_id(
        &self,
        national_id: &str,
        status: VisitStatus,
    ) -> PortResult<Option<VisitSession>> {
        let sql = format!(
            "SELECT {} FROM visit_sessions WHERE national_id = $1 AND status = $2 \
             ORDER BY created_at DESC LIMIT 1",
            VISIT_COLUMNS
        );
        let record = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(national_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(VisitRecord::to_domain).transpose()
    }

    async fn list_visits_by_status(&self, status: VisitStatus) -> PortResult<Vec<VisitSession>> {
        let sql = format!(
            "SELECT {} FROM visit_sessions WHERE status = $1 ORDER BY created_at DESC",
            VISIT_COLUMNS
        );
        let records = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        visits_to_domain(records)
    }

    async fn list_visits_for_unit(&self, unit_number: &str) -> PortResult<Vec<VisitSession>> {
        let sql = format!(
            "SELECT {} FROM visit_sessions WHERE unit_number = $1 ORDER BY created_at DESC",
            VISIT_COLUMNS
        );
        let records = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(unit_number)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        visits_to_domain(records)
    }

    async fn list_visits_checked_in_between(
        &self,
        scope: &VisitScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<VisitSession>> {
        let sql = format!(
            "SELECT {} FROM visit_sessions \
             WHERE check_in_at >= $1 AND check_in_at <= $2 \
               AND (unit_number = $3 OR security_id = $4) \
             ORDER BY created_at DESC",
            VISIT_COLUMNS
        );
        let records = sqlx::query_as::<_, VisitRecord>(&sql)
            .bind(start)
            .bind(end)
            .bind(scope.unit_number.as_deref())
            .bind(scope.security_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        visits_to_domain(records)
    }

    async fn upsert_active_shift(
        &self,
        security_id: Uuid,
        login_time: DateTime<Utc>,
    ) -> PortResult<ActiveShift> {
        let record = sqlx::query_as::<_, ShiftRecord>(
            "INSERT INTO active_shifts (security_id, login_time) VALUES ($1, $2) \
             ON CONFLICT (security_id) DO UPDATE SET login_time = EXCLUDED.login_time \
             RETURNING security_id, login_time",
        )
        .bind(security_id)
        .bind(login_time)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_active_shift(&self, security_id: Uuid) -> PortResult<Option<ActiveShift>> {
        let record = sqlx::query_as::<_, ShiftRecord>(
            "SELECT security_id, login_time FROM active_shifts WHERE security_id = $1",
        )
        .bind(security_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ShiftRecord::to_domain))
    }

    async fn insert_notification(&self, notification: NewNotification) -> PortResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (id, user_id, message, type, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(notification.user_id)
            .bind(notification.message)
            .bind(notification.kind)
            .bind(NotificationStatus::Unread.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_notification_status(
        &self,
        notification_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE notifications SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(notification_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        status: NotificationStatus,
    ) -> PortResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 AND status = $2 \
             ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(NotificationRecord::to_domain).collect()
    }
}
