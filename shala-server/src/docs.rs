use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, errors, events, schemas, serialized, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::register_admin,
        auth::login,
        auth::logout,
        auth::user,
        events::list_events,
        events::create_event,
        events::event,
        events::update_event,
        events::eligibility,
        events::live,
        events::recording,
        events::check_ins,
        events::check_in,
        events::cancel_check_in,
        events::update_attendance,
        users::my_check_ins,
        users::update_user,
        users::grant_check_ins,
    ),
    components(schemas(
        errors::ErrorBody,
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::NewEventSchema,
        schemas::UpdateEventSchema,
        schemas::AttendanceSchema,
        schemas::AttendanceEntrySchema,
        schemas::GrantCheckInsSchema,
        schemas::UpdateUserSchema,
        serialized::User,
        serialized::LoginResult,
        serialized::Event,
        serialized::CheckIn,
        serialized::Eligibility,
        serialized::Url,
    )),
    modifiers(&Security),
    info(
        description = "shala-server exposes the event calendar, check-ins and attendance of this shala instance"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
