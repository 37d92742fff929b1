use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{Attendance, CheckInData, EventData, PrimaryKey, Role, Schedule, UserData};

/// A fixed point in time so tests don't depend on the clock
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn event(schedule: Schedule, check_ins_max_quantity: Option<i32>) -> EventData {
    EventData {
        id: 1,
        title: "Morning vinyasa".to_string(),
        description: None,
        schedule,
        duration_minutes: 60,
        check_ins_max_quantity,
        is_live: schedule != Schedule::RecordedOnly,
        is_premium: false,
        live_url: Some("https://live.example.com/1".to_string()),
        recorded_url: Some("https://videos.example.com/1".to_string()),
        instructor_id: None,
        check_ins: vec![],
    }
}

/// An event starting `minutes` after [now]
pub fn event_starting_in(minutes: i64, check_ins_max_quantity: Option<i32>) -> EventData {
    event(
        Schedule::Live(now() + Duration::minutes(minutes)),
        check_ins_max_quantity,
    )
}

pub fn user(id: PrimaryKey, role: Role, check_ins_quantity: i32) -> UserData {
    UserData {
        id,
        username: format!("user{id}"),
        password: String::new(),
        display_name: format!("User {id}"),
        role,
        check_ins_quantity,
        expiration_date: None,
    }
}

pub fn check_in(event: &mut EventData, user_id: PrimaryKey) {
    let id = event.check_ins.len() as PrimaryKey + 1;

    event.check_ins.push(CheckInData {
        id,
        event_id: event.id,
        user_id,
        created_at: now(),
        attendance: Attendance::Unrecorded,
    });
}
