use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json,
};
use shala_core::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{
        AttendanceSchema, EventIdQuery, EventRangeQuery, NewEventSchema, Path, Query,
        UpdateEventSchema, ValidatedJson,
    },
    serialized::{CheckIn, Eligibility, Event, ToSerialized, Url},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    params(EventRangeQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Event>)
    )
)]
async fn list_events(
    _session: Session,
    State(context): State<ServerContext>,
    Query(range): Query<EventRangeQuery>,
) -> ServerResult<Json<Vec<Event>>> {
    let events = context.studio.events.list(range.into()).await?;

    Ok(Json(events.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/events",
    tag = "events",
    request_body = NewEventSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Event),
        (status = 403, body = ErrorBody, description = "Caller cannot create this event")
    )
)]
async fn create_event(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewEventSchema>,
) -> ServerResult<Json<Event>> {
    let event = context
        .studio
        .events
        .create_event(session.user(), body.into())
        .await?;

    Ok(Json(event.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/events/{id}",
    tag = "events",
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Event),
        (status = 404, body = ErrorBody)
    )
)]
async fn event(
    _session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
) -> ServerResult<Json<Event>> {
    let event = context.studio.events.event(event_id).await?;

    Ok(Json(event.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/events/{id}",
    tag = "events",
    request_body = UpdateEventSchema,
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Event),
        (status = 403, body = ErrorBody, description = "Caller does not manage the event")
    )
)]
async fn update_event(
    session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<UpdateEventSchema>,
) -> ServerResult<Json<Event>> {
    let event = context
        .studio
        .events
        .update_event(session.user(), body.into_update(event_id))
        .await?;

    Ok(Json(event.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/events/{id}/eligibility",
    tag = "events",
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Eligibility, description = "What the caller can do with the event right now")
    )
)]
async fn eligibility(
    session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
) -> ServerResult<Json<Eligibility>> {
    let eligibility = context
        .studio
        .events
        .eligibility(session.user(), event_id)
        .await?;

    Ok(Json(eligibility.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/events/{id}/live",
    tag = "events",
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Url),
        (status = 400, body = ErrorBody, description = "Caller cannot enter the event")
    )
)]
async fn live(
    session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
) -> ServerResult<Json<Url>> {
    let url = context.studio.events.enter(session.user(), event_id).await?;

    Ok(Json(url.into()))
}

#[utoipa::path(
    get,
    path = "/v1/events/{id}/recording",
    tag = "events",
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Url),
        (status = 400, body = ErrorBody, description = "Caller cannot view the recording")
    )
)]
async fn recording(
    session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
) -> ServerResult<Json<Url>> {
    let url = context
        .studio
        .events
        .recording(session.user(), event_id)
        .await?;

    Ok(Json(url.into()))
}

#[utoipa::path(
    get,
    path = "/v1/events/{id}/check-ins",
    tag = "events",
    params(
        ("id" = i32, Path, description = "Id of the event")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<CheckIn>),
        (status = 403, body = ErrorBody, description = "Caller does not manage the event")
    )
)]
async fn check_ins(
    session: Session,
    State(context): State<ServerContext>,
    Path(event_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<CheckIn>>> {
    let check_ins = context
        .studio
        .events
        .check_ins(session.user(), event_id)
        .await?;

    Ok(Json(check_ins.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/events/check-in",
    tag = "events",
    params(EventIdQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CheckIn, description = "One check-in was spent on the event"),
        (status = 400, body = ErrorBody, description = "The caller is not eligible to check in")
    )
)]
async fn check_in(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<EventIdQuery>,
) -> ServerResult<Json<CheckIn>> {
    let check_in = context
        .studio
        .events
        .check_in(session.user().id, query.event_id)
        .await?;

    Ok(Json(check_in.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/events/cancel-check-in",
    tag = "events",
    params(EventIdQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The check-in was removed and refunded"),
        (status = 400, body = ErrorBody, description = "The check-in can no longer be cancelled")
    )
)]
async fn cancel_check_in(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<EventIdQuery>,
) -> ServerResult<()> {
    context
        .studio
        .events
        .cancel_check_in(session.user().id, query.event_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/events/attendance",
    tag = "events",
    request_body = AttendanceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<CheckIn>, description = "The updated check-ins"),
        (status = 403, body = ErrorBody, description = "Caller does not manage the event")
    )
)]
async fn update_attendance(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<AttendanceSchema>,
) -> ServerResult<Json<Vec<CheckIn>>> {
    let updates = body.check_ins.iter().map(Into::into).collect();

    let check_ins = context
        .studio
        .events
        .update_attendance(session.user(), body.event_id, updates)
        .await?;

    Ok(Json(check_ins.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/", post(create_event))
        .route("/check-in", post(check_in))
        .route("/cancel-check-in", delete(cancel_check_in))
        .route("/attendance", put(update_attendance))
        .route("/:id", get(event).patch(update_event))
        .route("/:id/eligibility", get(eligibility))
        .route("/:id/live", get(live))
        .route("/:id/recording", get(recording))
        .route("/:id/check-ins", get(check_ins))
}
