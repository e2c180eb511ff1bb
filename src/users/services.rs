use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::password::hash_password,
    error::ApiError,
    state::AppState,
    users::{
        dto::{non_empty, UserDto, UserInput},
        repo_types::{Role, UserStatus},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn parse_status(raw: &str) -> Result<UserStatus, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidStatus(raw.to_string()))
}

/// Admin-provisioned user. Role is lenient like registration; status
/// defaults to ACTIVE.
pub async fn create_user(state: &AppState, input: UserInput) -> Result<UserDto, ApiError> {
    let username = non_empty(&input.username)
        .ok_or_else(|| ApiError::Validation("Username is required".into()))?;
    let email = non_empty(&input.email)
        .ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    let password = input
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password is required".into()))?;
    let status = match non_empty(&input.status) {
        Some(raw) => parse_status(raw)?,
        None => UserStatus::Active,
    };

    let store = state.store.as_ref();
    if store.find_by_username(username).await?.is_some() {
        return Err(ApiError::DuplicateUsername(username.to_string()));
    }
    if store.find_by_email(email).await?.is_some() {
        return Err(ApiError::DuplicateEmail(email.to_string()));
    }

    let password_hash = hash_password(password)?;
    let new_user = input.to_new_user(username, email, password_hash, status);
    let user = store
        .create(new_user)
        .await
        .map_err(|e| ApiError::from_store(e, username, email))?;

    info!(user_id = user.id, username = %user.username, role = %user.role, "user created");
    Ok(user.into())
}

pub async fn get_user(state: &AppState, id: i64) -> Result<UserDto, ApiError> {
    state
        .store
        .find_by_id(id)
        .await?
        .map(UserDto::from)
        .ok_or(ApiError::UserNotFound(id))
}

pub async fn list_users(state: &AppState) -> Result<Vec<UserDto>, ApiError> {
    let users = state.store.list_all().await?;
    Ok(users.iter().map(UserDto::from).collect())
}

/// Partial update: blank fields are left untouched. Every check runs before
/// the single write, so a rejected update changes nothing.
pub async fn update_user(state: &AppState, id: i64, input: UserInput) -> Result<UserDto, ApiError> {
    let store = state.store.as_ref();
    let mut user = store
        .find_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound(id))?;

    let role = non_empty(&input.role)
        .map(|raw| raw.parse::<Role>().map_err(|_| ApiError::InvalidRole(raw.to_string())))
        .transpose()?;
    let status = non_empty(&input.status).map(parse_status).transpose()?;

    if let Some(username) = non_empty(&input.username) {
        if username != user.username {
            if store.find_by_username(username).await?.is_some() {
                return Err(ApiError::DuplicateUsername(username.to_string()));
            }
            user.username = username.to_string();
        }
    }
    if let Some(email) = non_empty(&input.email) {
        if email != user.email {
            if !is_valid_email(email) {
                return Err(ApiError::Validation("Invalid email".into()));
            }
            if store.find_by_email(email).await?.is_some() {
                return Err(ApiError::DuplicateEmail(email.to_string()));
            }
            user.email = email.to_string();
        }
    }

    if let Some(first) = non_empty(&input.first_name) {
        user.first_name = Some(first.to_string());
    }
    if let Some(last) = non_empty(&input.last_name) {
        user.last_name = Some(last.to_string());
    }
    if let Some(photo) = non_empty(&input.photo_url) {
        user.photo_url = Some(photo.to_string());
    }
    if let Some(role) = role {
        user.role = role;
    }
    if let Some(status) = status {
        user.status = status;
    }
    if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(password)?;
    }

    let (username, email) = (user.username.clone(), user.email.clone());
    let saved = store
        .save(&user)
        .await
        .map_err(|e| ApiError::from_store(e, &username, &email))?;

    info!(user_id = saved.id, username = %saved.username, "user updated");
    Ok(saved.into())
}

pub async fn delete_user(state: &AppState, id: i64) -> Result<(), ApiError> {
    if !state.store.delete(id).await? {
        warn!(user_id = id, "delete of unknown user");
        return Err(ApiError::UserNotFound(id));
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
