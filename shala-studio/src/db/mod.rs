use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shala_core::{Attendance, CheckInData, EventData, PrimaryKey, Role, SessionData, UserData};
use thiserror::Error;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type SharedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// A guarded counter would go out of bounds
    #[error("{resource} has no {field} left")]
    Exhausted {
        resource: &'static str,
        field: &'static str,
    },
    /// A counter would exceed what can be stored
    #[error("{resource} {field} is out of range")]
    OutOfRange {
        resource: &'static str,
        field: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    /// Turns a violated unique constraint into [DatabaseError::Conflict]
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch shala data from a database
#[async_trait]
pub trait Database: Send + Sync {
    async fn check_for_admin(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;
    /// Atomically adds `amount` to the check-in balance of a user.
    /// Fails with [DatabaseError::OutOfRange] if the balance would overflow.
    async fn grant_check_ins(&self, user_id: PrimaryKey, amount: i32) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn event_by_id(&self, event_id: PrimaryKey) -> Result<EventData>;
    /// Lists events starting within the range, events without a start date are listed last
    async fn list_events(&self, range: EventRange) -> Result<Vec<EventData>>;
    async fn create_event(&self, new_event: NewEvent) -> Result<EventData>;
    /// Fails with [DatabaseError::Conflict] on `check_ins_max_quantity` if the event
    /// holds more check-ins than the new maximum allows.
    async fn update_event(&self, updated_event: UpdatedEvent) -> Result<EventData>;

    /// Creates a check-in and spends one unit of the user's balance as a single unit of work.
    ///
    /// Fails with [DatabaseError::Conflict] if the user already holds a check-in for the event,
    /// and with [DatabaseError::Exhausted] if the event is full or the user has no balance.
    async fn create_check_in(&self, new_check_in: NewCheckIn) -> Result<CheckInData>;
    /// Deletes a check-in and restores one unit of the user's balance as a single unit of work.
    async fn delete_check_in(&self, event_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn list_check_ins_by_user(&self, user_id: PrimaryKey) -> Result<Vec<CheckInData>>;
    /// Sets the attendance of check-ins belonging to the event. Nothing is written
    /// if any of the check-ins doesn't belong to the event.
    async fn update_attendance(
        &self,
        event_id: PrimaryKey,
        updates: Vec<AttendanceUpdate>,
    ) -> Result<Vec<CheckInData>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

/// Bounds of a calendar listing, both ends are optional
#[derive(Debug, Default, Clone, Copy)]
pub struct EventRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl EventRange {
    /// Events without a start date are always in range
    pub fn contains(&self, start_date: Option<DateTime<Utc>>) -> bool {
        let Some(start) = start_date else {
            return true;
        };

        self.from.map_or(true, |from| start >= from) && self.to.map_or(true, |to| start < to)
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub duration_minutes: i32,
    pub check_ins_max_quantity: Option<i32>,
    pub is_live: bool,
    pub is_premium: bool,
    pub live_url: Option<String>,
    pub recorded_url: Option<String>,
    pub instructor_id: Option<PrimaryKey>,
}

/// Fields set to [None] are left as they are.
/// `Some(None)` clears a start date or the check-in maximum.
#[derive(Debug, Default, Clone)]
pub struct UpdatedEvent {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub duration_minutes: Option<i32>,
    pub check_ins_max_quantity: Option<Option<i32>>,
    pub is_live: Option<bool>,
    pub is_premium: Option<bool>,
    pub live_url: Option<String>,
    pub recorded_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewCheckIn {
    pub event_id: PrimaryKey,
    pub user_id: PrimaryKey,
}

#[derive(Debug, Clone, Copy)]
pub struct AttendanceUpdate {
    pub check_in_id: PrimaryKey,
    pub attendance: Attendance,
}
