use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::profile_routes())
}
