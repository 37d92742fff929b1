//! Request bodies and query strings accepted by the endpoints

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use shala_core::{Attendance, PrimaryKey, Role};
use shala_studio::{AttendanceUpdate, EventRange, NewEvent, UpdatedEvent, UpdatedUser};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub username: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 2, max = 128))]
    pub display_name: String,
    #[validate(length(min = 2, max = 128))]
    pub username: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewEventSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    /// Leave out for events that only exist as a recording
    pub start_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
    /// Leave out to disable check-ins
    #[validate(range(min = 0, max = 10000))]
    pub check_ins_max_quantity: Option<i32>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub is_premium: bool,
    #[validate(url)]
    pub live_url: Option<String>,
    #[validate(url)]
    pub recorded_url: Option<String>,
    pub instructor_id: Option<PrimaryKey>,
}

impl From<NewEventSchema> for NewEvent {
    fn from(value: NewEventSchema) -> Self {
        NewEvent {
            title: value.title,
            description: value.description,
            start_date: value.start_date,
            duration_minutes: value.duration_minutes,
            check_ins_max_quantity: value.check_ins_max_quantity,
            is_live: value.is_live,
            is_premium: value.is_premium,
            live_url: value.live_url,
            recorded_url: value.recorded_url,
            instructor_id: value.instructor_id,
        }
    }
}

/// Fields that are left out are not changed.
/// `startDate` and `checkInsMaxQuantity` are cleared when set to null.
#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_event_update"))]
pub struct UpdateEventSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: Option<String>,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub check_ins_max_quantity: Option<Option<i32>>,
    pub is_live: Option<bool>,
    pub is_premium: Option<bool>,
    #[validate(url)]
    pub live_url: Option<String>,
    #[validate(url)]
    pub recorded_url: Option<String>,
}

fn validate_event_update(schema: &UpdateEventSchema) -> Result<(), ValidationError> {
    match schema.check_ins_max_quantity {
        Some(Some(max)) if !(0..=10000).contains(&max) => {
            let mut error = ValidationError::new("range");
            error.message = Some("checkInsMaxQuantity must be between 0 and 10000".into());
            Err(error)
        }
        _ => Ok(()),
    }
}

/// Tells a field set to null apart from one that was left out
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateEventSchema {
    pub fn into_update(self, id: PrimaryKey) -> UpdatedEvent {
        UpdatedEvent {
            id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            duration_minutes: self.duration_minutes,
            check_ins_max_quantity: self.check_ins_max_quantity,
            is_live: self.is_live,
            is_premium: self.is_premium,
            live_url: self.live_url,
            recorded_url: self.recorded_url,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttendanceSchema {
    pub event_id: PrimaryKey,
    #[validate(length(min = 1, max = 1000), nested)]
    pub check_ins: Vec<AttendanceEntrySchema>,
}

#[derive(Debug, ToSchema, Validate, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttendanceEntrySchema {
    /// The id of the check-in
    pub id: PrimaryKey,
    pub attended: bool,
}

impl From<&AttendanceEntrySchema> for AttendanceUpdate {
    fn from(value: &AttendanceEntrySchema) -> Self {
        AttendanceUpdate {
            check_in_id: value.id,
            attendance: Attendance::from(value.attended),
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GrantCheckInsSchema {
    #[validate(range(min = 1, max = 1000))]
    pub amount: i32,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserSchema {
    #[validate(length(min = 2, max = 128))]
    pub display_name: Option<String>,
    #[schema(value_type = Option<String>, example = "INSTRUCTOR")]
    pub role: Option<Role>,
    /// When the subscription of the user runs out
    pub expiration_date: Option<DateTime<Utc>>,
}

impl UpdateUserSchema {
    pub fn into_update(self, id: PrimaryKey) -> UpdatedUser {
        UpdatedUser {
            id,
            display_name: self.display_name,
            role: self.role,
            expiration_date: self.expiration_date,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventIdQuery {
    pub event_id: PrimaryKey,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventRangeQuery {
    /// Only list events starting at or after this time
    pub from: Option<DateTime<Utc>>,
    /// Only list events starting before this time
    pub to: Option<DateTime<Utc>>,
}

impl From<EventRangeQuery> for EventRange {
    fn from(value: EventRangeQuery) -> Self {
        EventRange {
            from: value.from,
            to: value.to,
        }
    }
}

/// Query string extractor that rejects with a [ServerError]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct Query<T>(pub T);

/// Path extractor that rejects with a [ServerError]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServerError))]
pub struct Path<T>(pub T);

/// Json that is validated before it reaches the handler
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::invalid("body", e.body_text()))?;

        value
            .validate()
            .map_err(|e| ServerError::invalid("body", e.to_string()))?;

        Ok(Self(value))
    }
}
