use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shala_core::{CheckInData, EventData, PrimaryKey, SessionData, UserData};
use sqlx::{
    postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow, PgPool, Postgres,
    Transaction,
};

use crate::{
    AttendanceUpdate, Database, DatabaseError, DatabaseResult, EventRange, IntoDatabaseError,
    NewCheckIn, NewEvent, NewSession, NewUser, Result, UpdatedEvent, UpdatedUser,
};

/// SQLSTATE raised when a value doesn't fit its column
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// A postgres database implementation for shala
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
    role: String,
    check_ins_quantity: i32,
    expiration_date: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct SessionRow {
    session_id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: UserRow,
}

#[derive(FromRow)]
struct EventRow {
    id: PrimaryKey,
    title: String,
    description: Option<String>,
    start_date: Option<DateTime<Utc>>,
    duration_minutes: i32,
    check_ins_max_quantity: Option<i32>,
    is_live: bool,
    is_premium: bool,
    live_url: Option<String>,
    recorded_url: Option<String>,
    instructor_id: Option<PrimaryKey>,
}

#[derive(FromRow)]
struct CheckInRow {
    id: PrimaryKey,
    event_id: PrimaryKey,
    user_id: PrimaryKey,
    created_at: DateTime<Utc>,
    attended: Option<bool>,
}

impl TryFrom<UserRow> for UserData {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(UserData {
            id: row.id,
            username: row.username,
            password: row.password,
            display_name: row.display_name,
            role: row
                .role
                .parse()
                .map_err(|e| DatabaseError::Internal(Box::new(e)))?,
            check_ins_quantity: row.check_ins_quantity,
            expiration_date: row.expiration_date,
        })
    }
}

impl From<CheckInRow> for CheckInData {
    fn from(row: CheckInRow) -> Self {
        CheckInData {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            created_at: row.created_at,
            attendance: row.attended.into(),
        }
    }
}

impl EventRow {
    fn into_event(self, check_ins: Vec<CheckInData>) -> EventData {
        EventData {
            id: self.id,
            title: self.title,
            description: self.description,
            schedule: self.start_date.into(),
            duration_minutes: self.duration_minutes,
            check_ins_max_quantity: self.check_ins_max_quantity,
            is_live: self.is_live,
            is_premium: self.is_premium,
            live_url: self.live_url,
            recorded_url: self.recorded_url,
            instructor_id: self.instructor_id,
            check_ins,
        }
    }
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn check_ins_of_events(
        &self,
        event_ids: &[PrimaryKey],
    ) -> Result<HashMap<PrimaryKey, Vec<CheckInData>>> {
        let rows: Vec<CheckInRow> = query_as(
            "SELECT * FROM check_ins WHERE event_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut result: HashMap<_, Vec<_>> = HashMap::new();

        for row in rows {
            result
                .entry(row.event_id)
                .or_default()
                .push(CheckInData::from(row));
        }

        Ok(result)
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| e.any())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn check_for_admin(&self) -> Result<bool> {
        let result = query("SELECT id FROM users WHERE role = 'ADMIN' LIMIT 1")
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SqlxError::RowNotFound) => Ok(false),
            Err(e) => Err(e.any()),
        }
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?
            .try_into()
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))?
            .try_into()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        query_as::<_, UserRow>(
            "INSERT INTO users (username, password, display_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(&new_user.username)
        .bind(new_user.password)
        .bind(new_user.display_name)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("user", "username", &new_user.username))?
        .try_into()
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        query(
            "UPDATE users SET
                display_name = $1,
                role = $2,
                expiration_date = $3
            WHERE id = $4",
        )
        .bind(updated_user.display_name.unwrap_or(user.display_name))
        .bind(updated_user.role.unwrap_or(user.role).as_str())
        .bind(updated_user.expiration_date.or(user.expiration_date))
        .bind(updated_user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.user_by_id(updated_user.id).await
    }

    async fn grant_check_ins(&self, user_id: PrimaryKey, amount: i32) -> Result<UserData> {
        query_as::<_, UserRow>(
            "UPDATE users SET check_ins_quantity = check_ins_quantity + $1
            WHERE id = $2
            RETURNING *",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            SqlxError::Database(ref db) if is_out_of_range(&**db) => {
                DatabaseError::OutOfRange {
                    resource: "user",
                    field: "check-ins",
                }
            }
            e => e.not_found_or("user", "id"),
        })?
        .try_into()
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as(
            "SELECT
                sessions.id AS session_id,
                sessions.token,
                sessions.expires_at,
                users.*
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            id: row.session_id,
            token: row.token,
            expires_at: row.expires_at,
            user: row.user.try_into()?,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.conflict_or("session", "token", &new_session.token))?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn event_by_id(&self, event_id: PrimaryKey) -> Result<EventData> {
        let row: EventRow = query_as("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("event", "id"))?;

        let check_ins = self
            .check_ins_of_events(&[event_id])
            .await?
            .remove(&event_id)
            .unwrap_or_default();

        Ok(row.into_event(check_ins))
    }

    async fn list_events(&self, range: EventRange) -> Result<Vec<EventData>> {
        let rows: Vec<EventRow> = query_as(
            "SELECT * FROM events
            WHERE start_date IS NULL
                OR (($1::timestamptz IS NULL OR start_date >= $1)
                AND ($2::timestamptz IS NULL OR start_date < $2))
            ORDER BY start_date ASC NULLS LAST, id ASC",
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        let mut check_ins = self.check_ins_of_events(&ids).await?;

        let events = rows
            .into_iter()
            .map(|row| {
                let event_check_ins = check_ins.remove(&row.id).unwrap_or_default();
                row.into_event(event_check_ins)
            })
            .collect();

        Ok(events)
    }

    async fn create_event(&self, new_event: NewEvent) -> Result<EventData> {
        if let Some(instructor_id) = new_event.instructor_id {
            self.user_by_id(instructor_id).await?;
        }

        let row: EventRow = query_as(
            "INSERT INTO events (
                title,
                description,
                start_date,
                duration_minutes,
                check_ins_max_quantity,
                is_live,
                is_premium,
                live_url,
                recorded_url,
                instructor_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *",
        )
        .bind(new_event.title)
        .bind(new_event.description)
        .bind(new_event.start_date)
        .bind(new_event.duration_minutes)
        .bind(new_event.check_ins_max_quantity)
        .bind(new_event.is_live)
        .bind(new_event.is_premium)
        .bind(new_event.live_url)
        .bind(new_event.recorded_url)
        .bind(new_event.instructor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(row.into_event(vec![]))
    }

    async fn update_event(&self, updated_event: UpdatedEvent) -> Result<EventData> {
        let id = updated_event.id;
        let mut tx = self.begin().await?;

        // Locking the event keeps check-ins out until the new maximum is in place
        let row: EventRow = query_as("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("event", "id"))?;

        if let Some(max) = updated_event.check_ins_max_quantity {
            let (taken,): (i64,) = query_as("SELECT count(*) FROM check_ins WHERE event_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            let fits = match max {
                Some(max) => taken <= max as i64,
                None => taken == 0,
            };

            if !fits {
                return Err(DatabaseError::Conflict {
                    resource: "event",
                    field: "check_ins_max_quantity",
                    value: format!("{:?}", max),
                });
            }
        }

        query(
            "UPDATE events SET
                title = $1,
                description = $2,
                start_date = $3,
                duration_minutes = $4,
                check_ins_max_quantity = $5,
                is_live = $6,
                is_premium = $7,
                live_url = $8,
                recorded_url = $9
            WHERE id = $10",
        )
        .bind(updated_event.title.unwrap_or(row.title))
        .bind(updated_event.description.or(row.description))
        .bind(updated_event.start_date.unwrap_or(row.start_date))
        .bind(updated_event.duration_minutes.unwrap_or(row.duration_minutes))
        .bind(
            updated_event
                .check_ins_max_quantity
                .unwrap_or(row.check_ins_max_quantity),
        )
        .bind(updated_event.is_live.unwrap_or(row.is_live))
        .bind(updated_event.is_premium.unwrap_or(row.is_premium))
        .bind(updated_event.live_url.or(row.live_url))
        .bind(updated_event.recorded_url.or(row.recorded_url))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.event_by_id(id).await
    }

    async fn create_check_in(&self, new_check_in: NewCheckIn) -> Result<CheckInData> {
        let NewCheckIn { event_id, user_id } = new_check_in;
        let mut tx = self.begin().await?;

        // Locking the event serializes concurrent check-ins for it
        let (max,): (Option<i32>,) =
            query_as("SELECT check_ins_max_quantity FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.not_found_or("event", "id"))?;

        let (taken, already_checked_in): (i64, bool) = query_as(
            "SELECT count(*), coalesce(bool_or(user_id = $2), false)
            FROM check_ins WHERE event_id = $1",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if already_checked_in {
            return Err(DatabaseError::Conflict {
                resource: "check in",
                field: "event:user",
                value: format!("{}:{}", event_id, user_id),
            });
        }

        if max.map_or(true, |max| taken >= max as i64) {
            return Err(DatabaseError::Exhausted {
                resource: "event",
                field: "vacancy",
            });
        }

        let spent = query(
            "UPDATE users SET check_ins_quantity = check_ins_quantity - 1
            WHERE id = $1 AND check_ins_quantity > 0",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if spent.rows_affected() == 0 {
            // Either the user doesn't exist or the balance is empty
            query("SELECT id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.not_found_or("user", "id"))?;

            return Err(DatabaseError::Exhausted {
                resource: "user",
                field: "check-ins",
            });
        }

        let row: Option<CheckInRow> = query_as(
            "INSERT INTO check_ins (event_id, user_id) VALUES ($1, $2)
            ON CONFLICT (event_id, user_id) DO NOTHING
            RETURNING *",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let Some(row) = row else {
            return Err(DatabaseError::Conflict {
                resource: "check in",
                field: "event:user",
                value: format!("{}:{}", event_id, user_id),
            });
        };

        tx.commit().await.map_err(|e| e.any())?;

        Ok(row.into())
    }

    async fn delete_check_in(&self, event_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut tx = self.begin().await?;

        query("DELETE FROM check_ins WHERE event_id = $1 AND user_id = $2 RETURNING id")
            .bind(event_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("check in", "event_id:user_id"))?;

        query("UPDATE users SET check_ins_quantity = check_ins_quantity + 1 WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn list_check_ins_by_user(&self, user_id: PrimaryKey) -> Result<Vec<CheckInData>> {
        let rows: Vec<CheckInRow> =
            query_as("SELECT * FROM check_ins WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_attendance(
        &self,
        event_id: PrimaryKey,
        updates: Vec<AttendanceUpdate>,
    ) -> Result<Vec<CheckInData>> {
        let mut tx = self.begin().await?;
        let mut updated = Vec::with_capacity(updates.len());

        for update in updates {
            let row: CheckInRow = query_as(
                "UPDATE check_ins SET attended = $1
                WHERE id = $2 AND event_id = $3
                RETURNING *",
            )
            .bind(update.attendance.as_flag())
            .bind(update.check_in_id)
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("check in", "id"))?;

            updated.push(row.into());
        }

        tx.commit().await.map_err(|e| e.any())?;

        Ok(updated)
    }
}

fn is_out_of_range(error: &dyn sqlx::error::DatabaseError) -> bool {
    error.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE)
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match self {
            SqlxError::Database(ref e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            e => Self::any(e),
        }
    }
}
