use chrono::{Duration, Utc};
use shala_core::{Config, EventData, PrimaryKey, Role, UserData};

use crate::{NewEvent, NewUser, Studio};

pub fn studio(config: Config) -> Studio {
    Studio::in_memory(config)
}

/// Creates a user directly in the database, skipping password hashing
pub async fn create_user(studio: &Studio, username: &str, role: Role, balance: i32) -> UserData {
    let database = &studio.context.database;

    let user = database
        .create_user(NewUser {
            username: username.to_string(),
            password: String::new(),
            display_name: username.to_string(),
            role,
        })
        .await
        .unwrap();

    database.grant_check_ins(user.id, balance).await.unwrap()
}

/// Creates an event starting `start_in_minutes` from now, or a recorded only event
pub async fn create_event(
    studio: &Studio,
    start_in_minutes: Option<i64>,
    check_ins_max_quantity: Option<i32>,
    instructor_id: Option<PrimaryKey>,
) -> EventData {
    studio
        .context
        .database
        .create_event(NewEvent {
            title: "Ashtanga".to_string(),
            description: Some("Primary series".to_string()),
            start_date: start_in_minutes.map(|m| Utc::now() + Duration::minutes(m)),
            duration_minutes: 75,
            check_ins_max_quantity,
            is_live: start_in_minutes.is_some(),
            is_premium: false,
            live_url: Some("https://live.example.com/class".to_string()),
            recorded_url: Some("https://videos.example.com/class".to_string()),
            instructor_id,
        })
        .await
        .unwrap()
}
