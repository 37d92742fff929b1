use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PrimaryKey, Role, UserData};

/// When an event happens, if it happens live at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// The event starts at the given time
    Live(DateTime<Utc>),
    /// The event only exists as a recording
    RecordedOnly,
}

impl Schedule {
    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Live(date) => Some(*date),
            Schedule::RecordedOnly => None,
        }
    }
}

impl From<Option<DateTime<Utc>>> for Schedule {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map(Schedule::Live).unwrap_or(Schedule::RecordedOnly)
    }
}

/// Whether a checked in user showed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Attendance {
    #[default]
    Unrecorded,
    Attended,
    Absent,
}

impl Attendance {
    /// The nullable column representation
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Attendance::Unrecorded => None,
            Attendance::Attended => Some(true),
            Attendance::Absent => Some(false),
        }
    }
}

impl From<Option<bool>> for Attendance {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Attendance::Unrecorded,
            Some(true) => Attendance::Attended,
            Some(false) => Attendance::Absent,
        }
    }
}

impl From<bool> for Attendance {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

/// A reservation of one spot in a live event.
/// Note: `event_id` and `user_id` are unique together.
#[derive(Debug, Clone)]
pub struct CheckInData {
    pub id: PrimaryKey,
    pub event_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub created_at: DateTime<Utc>,
    pub attendance: Attendance,
}

/// A class on the calendar
#[derive(Debug, Clone)]
pub struct EventData {
    pub id: PrimaryKey,
    pub title: String,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub duration_minutes: i32,
    /// How many users can check in, check-ins are disabled if this is not set
    pub check_ins_max_quantity: Option<i32>,
    pub is_live: bool,
    pub is_premium: bool,
    pub live_url: Option<String>,
    pub recorded_url: Option<String>,
    pub instructor_id: Option<PrimaryKey>,
    pub check_ins: Vec<CheckInData>,
}

impl EventData {
    pub fn check_in_of(&self, user_id: PrimaryKey) -> Option<&CheckInData> {
        self.check_ins.iter().find(|c| c.user_id == user_id)
    }

    pub fn has_user_checked_in(&self, user_id: PrimaryKey) -> bool {
        self.check_in_of(user_id).is_some()
    }

    /// Remaining spots, or [None] if the event has no maximum
    pub fn vacancy(&self) -> Option<i32> {
        self.check_ins_max_quantity
            .map(|max| (max - self.check_ins.len() as i32).max(0))
    }

    /// Returns false if no maximum is set
    pub fn still_has_vacancy(&self) -> bool {
        self.vacancy().is_some_and(|v| v > 0)
    }

    /// Whether the check-ins already taken fit under `max`.
    /// Check-ins can't be disabled while any are held.
    pub fn can_hold(&self, max: Option<i32>) -> bool {
        match max {
            Some(max) => max >= 0 && self.check_ins.len() <= max as usize,
            None => self.check_ins.is_empty(),
        }
    }

    /// Admins can manage everything, instructors only the events they teach
    pub fn can_be_managed_by(&self, user: &UserData) -> bool {
        match user.role {
            Role::Admin => true,
            Role::Instructor => self.instructor_id == Some(user.id),
            Role::User => false,
        }
    }
}
