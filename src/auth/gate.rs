use axum::{
    extract::{FromRef, MatchedPath, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::{
    auth::{jwt::JwtKeys, principal, principal::Principal},
    error::ApiError,
    state::AppState,
    users::repo_types::Role,
};

/// Authorization requirement of one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    AnyOf(&'static [Role]),
}

#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub method: &'static str,
    pub path: &'static str,
    pub access: Access,
}

const SUPER_ADMIN: &[Role] = &[Role::SuperAdmin];
const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const EVERYONE: &[Role] = &[Role::User, Role::Hr, Role::Admin, Role::SuperAdmin];

/// Keyed by method and router path pattern.
pub const ROUTE_POLICIES: &[RoutePolicy] = &[
    RoutePolicy { method: "POST", path: "/api/users/register", access: Access::Public },
    RoutePolicy { method: "POST", path: "/api/users/login", access: Access::Public },
    RoutePolicy { method: "POST", path: "/api/users/create", access: Access::AnyOf(SUPER_ADMIN) },
    RoutePolicy { method: "GET", path: "/api/users/all", access: Access::AnyOf(EVERYONE) },
    RoutePolicy { method: "GET", path: "/api/users/profile", access: Access::AnyOf(EVERYONE) },
    RoutePolicy { method: "GET", path: "/api/users/:id", access: Access::AnyOf(EVERYONE) },
    RoutePolicy { method: "PUT", path: "/api/users/update/:id", access: Access::AnyOf(ADMINS) },
    RoutePolicy { method: "DELETE", path: "/api/users/delete/:id", access: Access::AnyOf(SUPER_ADMIN) },
    RoutePolicy { method: "GET", path: "/health", access: Access::Public },
];

/// Routes missing from the table still require a principal.
pub fn policy_for(method: &str, path: &str) -> Access {
    ROUTE_POLICIES
        .iter()
        .find(|p| p.method.eq_ignore_ascii_case(method) && p.path == path)
        .map(|p| p.access)
        .unwrap_or(Access::Authenticated)
}

pub fn authorize(access: Access, principal: Option<&Principal>) -> Result<(), ApiError> {
    match (access, principal) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(ApiError::Unauthenticated),
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::AnyOf(roles), Some(p)) if p.has_any_role(roles) => Ok(()),
        (Access::AnyOf(_), Some(p)) => {
            warn!(username = %p.username, role = %p.role, "role not permitted");
            Err(ApiError::Forbidden)
        }
    }
}

/// Token from `Authorization: Bearer <token>`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Turns a raw token into a principal. Every failure yields `None`; the
/// specific cause is only logged.
pub async fn authenticate(state: &AppState, token: &str) -> Option<Principal> {
    let keys = JwtKeys::from_ref(state);
    let claims = match keys.validate(token) {
        Ok(c) => c,
        Err(e) => {
            warn!(reason = %e, "bearer token rejected");
            return None;
        }
    };

    let principal = match principal::resolve(state.store.as_ref(), &claims.sub).await {
        Ok(p) => p,
        Err(ApiError::UsernameNotFound(_)) => {
            warn!(username = %claims.sub, "token subject no longer exists");
            return None;
        }
        Err(e) => {
            error!(error = %e, "principal lookup failed");
            return None;
        }
    };

    if state.config.enforce_active && !principal.status.is_active() {
        warn!(username = %principal.username, "token presented for inactive account");
        return None;
    }
    Some(principal)
}

/// Runs once per routed request: binds the principal to the request and
/// enforces the route's policy before the handler runs.
pub async fn access_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers()).map(str::to_owned);
    let principal = match token {
        Some(token) => authenticate(&state, &token).await,
        None => None,
    };

    let access = match req.extensions().get::<MatchedPath>() {
        Some(path) => policy_for(req.method().as_str(), path.as_str()),
        None => Access::Authenticated,
    };

    if let Err(e) = authorize(access, principal.as_ref()) {
        return e.into_response();
    }

    if let Some(p) = principal {
        req.extensions_mut().insert(p);
    }
    next.run(req).await
}
