use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{UserDto, UserInput},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_user))
        .route("/all", get(list_users))
        .route("/:id", get(get_user))
        .route("/update/:id", put(update_user))
        .route("/delete/:id", delete(delete_user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserInput>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let view = services::create_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDto>, ApiError> {
    Ok(Json(services::get_user(&state, id).await?))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserDto>>, ApiError> {
    Ok(Json(services::list_users(&state).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UserInput>,
) -> Result<Json<UserDto>, ApiError> {
    Ok(Json(services::update_user(&state, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete_user(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
