use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shala_core::{CheckInData, EventData, PrimaryKey, Role, SessionData, UserData};

use crate::{
    AttendanceUpdate, Database, DatabaseError, EventRange, NewCheckIn, NewEvent, NewSession,
    NewUser, Result, UpdatedEvent, UpdatedUser,
};

/// A database kept entirely in memory, used when no postgres url is configured and in tests.
///
/// Every operation holds a single lock for its whole duration, which makes each one atomic.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: PrimaryKey,
    users: BTreeMap<PrimaryKey, UserData>,
    sessions: BTreeMap<String, StoredSession>,
    events: BTreeMap<PrimaryKey, EventData>,
}

struct StoredSession {
    id: PrimaryKey,
    user_id: PrimaryKey,
    expires_at: chrono::DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users.get(&user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })
    }

    fn user_mut(&mut self, user_id: PrimaryKey) -> Result<&mut UserData> {
        self.users.get_mut(&user_id).ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })
    }

    fn event(&self, event_id: PrimaryKey) -> Result<&EventData> {
        self.events.get(&event_id).ok_or(DatabaseError::NotFound {
            resource: "event",
            identifier: "id",
        })
    }

    fn event_mut(&mut self, event_id: PrimaryKey) -> Result<&mut EventData> {
        self.events.get_mut(&event_id).ok_or(DatabaseError::NotFound {
            resource: "event",
            identifier: "id",
        })
    }

    fn session(&self, token: &str) -> Result<SessionData> {
        let session = self.sessions.get(token).ok_or(DatabaseError::NotFound {
            resource: "session",
            identifier: "token",
        })?;

        Ok(SessionData {
            id: session.id,
            token: token.to_string(),
            expires_at: session.expires_at,
            user: self.user(session.user_id)?.clone(),
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn check_for_admin(&self) -> Result<bool> {
        let state = self.state.lock();
        Ok(state.users.values().any(|u| u.role == Role::Admin))
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id).cloned()
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "username",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state
            .users
            .values()
            .any(|u| u.username == new_user.username)
        {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        let user = UserData {
            id: state.next_id(),
            username: new_user.username,
            password: new_user.password,
            display_name: new_user.display_name,
            role: new_user.role,
            check_ins_quantity: 0,
            expiration_date: None,
        };

        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let mut state = self.state.lock();
        let user = state.user_mut(updated_user.id)?;

        if let Some(display_name) = updated_user.display_name {
            user.display_name = display_name;
        }

        if let Some(role) = updated_user.role {
            user.role = role;
        }

        if let Some(expiration_date) = updated_user.expiration_date {
            user.expiration_date = Some(expiration_date);
        }

        Ok(user.clone())
    }

    async fn grant_check_ins(&self, user_id: PrimaryKey, amount: i32) -> Result<UserData> {
        let mut state = self.state.lock();
        let user = state.user_mut(user_id)?;

        user.check_ins_quantity = user.check_ins_quantity.checked_add(amount).ok_or(
            DatabaseError::OutOfRange {
                resource: "user",
                field: "check-ins",
            },
        )?;

        Ok(user.clone())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state.lock().session(token)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();

        if state.sessions.contains_key(&new_session.token) {
            return Err(DatabaseError::Conflict {
                resource: "session",
                field: "token",
                value: new_session.token,
            });
        }

        state.user(new_session.user_id)?;

        let id = state.next_id();
        state.sessions.insert(
            new_session.token.clone(),
            StoredSession {
                id,
                user_id: new_session.user_id,
                expires_at: new_session.expires_at,
            },
        );

        state.session(&new_session.token)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.state
            .lock()
            .sessions
            .remove(token)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();

        self.state
            .lock()
            .sessions
            .retain(|_, session| session.expires_at > now);

        Ok(())
    }

    async fn event_by_id(&self, event_id: PrimaryKey) -> Result<EventData> {
        self.state.lock().event(event_id).cloned()
    }

    async fn list_events(&self, range: EventRange) -> Result<Vec<EventData>> {
        let mut events: Vec<_> = self
            .state
            .lock()
            .events
            .values()
            .filter(|e| range.contains(e.schedule.start_date()))
            .cloned()
            .collect();

        // Scheduled events first, by start date
        events.sort_by_key(|e| (e.schedule.start_date().is_none(), e.schedule.start_date(), e.id));

        Ok(events)
    }

    async fn create_event(&self, new_event: NewEvent) -> Result<EventData> {
        let mut state = self.state.lock();

        if let Some(instructor_id) = new_event.instructor_id {
            state.user(instructor_id)?;
        }

        let event = EventData {
            id: state.next_id(),
            title: new_event.title,
            description: new_event.description,
            schedule: new_event.start_date.into(),
            duration_minutes: new_event.duration_minutes,
            check_ins_max_quantity: new_event.check_ins_max_quantity,
            is_live: new_event.is_live,
            is_premium: new_event.is_premium,
            live_url: new_event.live_url,
            recorded_url: new_event.recorded_url,
            instructor_id: new_event.instructor_id,
            check_ins: vec![],
        };

        state.events.insert(event.id, event.clone());

        Ok(event)
    }

    async fn update_event(&self, updated_event: UpdatedEvent) -> Result<EventData> {
        let mut state = self.state.lock();
        let event = state.event_mut(updated_event.id)?;

        if let Some(max) = updated_event.check_ins_max_quantity {
            if !event.can_hold(max) {
                return Err(DatabaseError::Conflict {
                    resource: "event",
                    field: "check_ins_max_quantity",
                    value: format!("{:?}", max),
                });
            }
        }

        if let Some(title) = updated_event.title {
            event.title = title;
        }
        if updated_event.description.is_some() {
            event.description = updated_event.description;
        }
        if let Some(start_date) = updated_event.start_date {
            event.schedule = start_date.into();
        }
        if let Some(duration_minutes) = updated_event.duration_minutes {
            event.duration_minutes = duration_minutes;
        }
        if let Some(max) = updated_event.check_ins_max_quantity {
            event.check_ins_max_quantity = max;
        }
        if let Some(is_live) = updated_event.is_live {
            event.is_live = is_live;
        }
        if let Some(is_premium) = updated_event.is_premium {
            event.is_premium = is_premium;
        }
        if updated_event.live_url.is_some() {
            event.live_url = updated_event.live_url;
        }
        if updated_event.recorded_url.is_some() {
            event.recorded_url = updated_event.recorded_url;
        }

        Ok(event.clone())
    }

    async fn create_check_in(&self, new_check_in: NewCheckIn) -> Result<CheckInData> {
        let NewCheckIn { event_id, user_id } = new_check_in;
        let mut state = self.state.lock();

        let event = state.event(event_id)?;
        let balance = state.user(user_id)?.check_ins_quantity;

        if event.has_user_checked_in(user_id) {
            return Err(DatabaseError::Conflict {
                resource: "check in",
                field: "event:user",
                value: format!("{}:{}", event_id, user_id),
            });
        }

        if !event.still_has_vacancy() {
            return Err(DatabaseError::Exhausted {
                resource: "event",
                field: "vacancy",
            });
        }

        if balance <= 0 {
            return Err(DatabaseError::Exhausted {
                resource: "user",
                field: "check-ins",
            });
        }

        let check_in = CheckInData {
            id: state.next_id(),
            event_id,
            user_id,
            created_at: Utc::now(),
            attendance: Default::default(),
        };

        state.user_mut(user_id)?.check_ins_quantity -= 1;
        state.event_mut(event_id)?.check_ins.push(check_in.clone());

        Ok(check_in)
    }

    async fn delete_check_in(&self, event_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let event = state.event_mut(event_id)?;

        let position = event
            .check_ins
            .iter()
            .position(|c| c.user_id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "check in",
                identifier: "event_id:user_id",
            })?;

        event.check_ins.remove(position);

        if let Ok(user) = state.user_mut(user_id) {
            user.check_ins_quantity += 1;
        }

        Ok(())
    }

    async fn list_check_ins_by_user(&self, user_id: PrimaryKey) -> Result<Vec<CheckInData>> {
        let mut check_ins: Vec<_> = self
            .state
            .lock()
            .events
            .values()
            .flat_map(|e| e.check_ins.iter())
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();

        check_ins.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(check_ins)
    }

    async fn update_attendance(
        &self,
        event_id: PrimaryKey,
        updates: Vec<AttendanceUpdate>,
    ) -> Result<Vec<CheckInData>> {
        let mut state = self.state.lock();
        let event = state.event_mut(event_id)?;

        let all_belong = updates
            .iter()
            .all(|u| event.check_ins.iter().any(|c| c.id == u.check_in_id));

        if !all_belong {
            return Err(DatabaseError::NotFound {
                resource: "check in",
                identifier: "id",
            });
        }

        let mut updated = Vec::with_capacity(updates.len());

        for update in updates {
            if let Some(check_in) = event
                .check_ins
                .iter_mut()
                .find(|c| c.id == update.check_in_id)
            {
                check_in.attendance = update.attendance;
                updated.push(check_in.clone());
            }
        }

        Ok(updated)
    }
}
