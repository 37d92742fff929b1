use axum::{
    extract::State,
    routing::{get, patch, post},
    Json,
};
use shala_core::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ErrorBody, ServerResult},
    schemas::{GrantCheckInsSchema, Path, UpdateUserSchema, ValidatedJson},
    serialized::{CheckIn, ToSerialized, User},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/users/me/check-ins",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<CheckIn>, description = "Check-ins of the caller, most recent first")
    )
)]
async fn my_check_ins(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<CheckIn>>> {
    let check_ins = context.studio.users.check_ins(session.user().id).await?;

    Ok(Json(check_ins.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    tag = "users",
    request_body = UpdateUserSchema,
    params(
        ("id" = i32, Path, description = "Id of the user")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 403, body = ErrorBody, description = "Only admins can update users")
    )
)]
async fn update_user(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<UpdateUserSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .studio
        .users
        .update_user(session.user(), body.into_update(user_id))
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/check-ins",
    tag = "users",
    request_body = GrantCheckInsSchema,
    params(
        ("id" = i32, Path, description = "Id of the user")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User, description = "The user with the new balance"),
        (status = 403, body = ErrorBody, description = "Only admins can grant check-ins")
    )
)]
async fn grant_check_ins(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<GrantCheckInsSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .studio
        .users
        .grant_check_ins(session.user(), user_id, body.amount)
        .await?;

    Ok(Json(user.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/me/check-ins", get(my_check_ins))
        .route("/:id", patch(update_user))
        .route("/:id/check-ins", post(grant_check_ins))
}
