use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn, Span};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        principal::CurrentUser,
        services::{self, AuthFailure, AuthOutcome},
    },
    error::ApiError,
    state::AppState,
    users::dto::UserDto,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

/// Unwraps a JSON body, or answers with `failure` in the usual auth shape so
/// extractor details never reach the client.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    failure: AuthFailure,
) -> Result<T, Response> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(
                status = %rejection.status(),
                reason = %rejection.body_text(),
                "auth body rejected"
            );
            Err(AuthOutcome::Rejected(failure).into_response_with(StatusCode::OK))
        }
    }
}

#[instrument(skip_all, fields(username))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let invalid = AuthFailure::InvalidRequest("Invalid request body".into());
    let payload = match json_body(payload, invalid) {
        Ok(p) => p,
        Err(res) => return res,
    };
    Span::current().record("username", payload.username.as_str());
    services::register(&state, payload)
        .await
        .into_response_with(StatusCode::CREATED)
}

#[instrument(skip_all, fields(username))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let payload = match json_body(payload, AuthFailure::InvalidCredentials) {
        Ok(p) => p,
        Err(res) => return res,
    };
    Span::current().record("username", payload.username.as_str());
    services::login(&state, payload)
        .await
        .into_response_with(StatusCode::OK)
}

#[instrument(skip(state, principal), fields(username = %principal.username))]
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<UserDto>, ApiError> {
    let view = services::current_profile(&state, &principal).await?;
    Ok(Json(view))
}
