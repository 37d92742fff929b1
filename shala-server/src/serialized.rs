//! All schemas that are exposed from endpoints are defined here
//! along with their ToSerialized impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use shala_core::{Attendance, CheckInData, EventData, PrimaryKey, SessionData, UserData};
use shala_studio::EventEligibility;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: PrimaryKey,
    username: String,
    display_name: String,
    #[schema(example = "USER")]
    role: &'static str,
    check_ins_quantity: i32,
    expiration_date: Option<DateTime<Utc>>,
    is_subscribed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

/// An event on the calendar. Urls are only handed out by the live and recording endpoints.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: PrimaryKey,
    title: String,
    description: Option<String>,
    /// Missing for events that only exist as a recording
    start_date: Option<DateTime<Utc>>,
    duration_minutes: i32,
    check_ins_max_quantity: Option<i32>,
    check_ins_count: usize,
    vacancy: Option<i32>,
    is_live: bool,
    is_premium: bool,
    has_recording: bool,
    instructor_id: Option<PrimaryKey>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    id: PrimaryKey,
    event_id: PrimaryKey,
    user_id: PrimaryKey,
    created_at: DateTime<Utc>,
    #[schema(value_type = String, example = "UNRECORDED")]
    attendance: Attendance,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    minutes_to_event: Option<i64>,
    has_started: bool,
    has_checked_in: bool,
    still_has_vacancy: bool,
    can_check_in: bool,
    /// Machine readable reason the user can't check in
    check_in_denial: Option<&'static str>,
    can_cancel_check_in: bool,
    can_enter: bool,
    can_view_recording: bool,
    can_manage: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Url {
    url: String,
}

impl From<String> for Url {
    fn from(url: String) -> Self {
        Self { url }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role.as_str(),
            check_ins_quantity: self.check_ins_quantity,
            expiration_date: self.expiration_date,
            is_subscribed: self.is_subscribed(Utc::now()),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Event> for EventData {
    fn to_serialized(&self) -> Event {
        Event {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: self.schedule.start_date(),
            duration_minutes: self.duration_minutes,
            check_ins_max_quantity: self.check_ins_max_quantity,
            check_ins_count: self.check_ins.len(),
            vacancy: self.vacancy(),
            is_live: self.is_live,
            is_premium: self.is_premium,
            has_recording: self.recorded_url.is_some(),
            instructor_id: self.instructor_id,
        }
    }
}

impl ToSerialized<CheckIn> for CheckInData {
    fn to_serialized(&self) -> CheckIn {
        CheckIn {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            created_at: self.created_at,
            attendance: self.attendance,
        }
    }
}

impl ToSerialized<Eligibility> for EventEligibility {
    fn to_serialized(&self) -> Eligibility {
        Eligibility {
            minutes_to_event: self.minutes_to_event,
            has_started: self.has_started,
            has_checked_in: self.has_checked_in,
            still_has_vacancy: self.still_has_vacancy,
            can_check_in: self.can_check_in,
            check_in_denial: self.check_in_denial.map(|e| e.code()),
            can_cancel_check_in: self.can_cancel_check_in,
            can_enter: self.can_enter,
            can_view_recording: self.can_view_recording,
            can_manage: self.can_manage,
        }
    }
}
