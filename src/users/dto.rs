use serde::{Deserialize, Serialize};

use crate::users::repo_types::{NewUser, Role, User, UserStatus};

/// Outward view of a user. Has no password field at all.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
}

impl From<&User> for UserDto {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            status: u.status,
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            photo_url: u.photo_url.clone(),
        }
    }
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        UserDto::from(&u)
    }
}

/// Body of admin create and update. Every field is optional on the wire;
/// create enforces its required set, update applies only non-empty fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
}

/// `Some(trimmed)` when the field carries a non-blank value.
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserInput {
    /// Builds the row to insert from already-validated parts. Role is parsed
    /// leniently; status has been parsed by the caller.
    pub fn to_new_user(
        &self,
        username: &str,
        email: &str,
        password_hash: String,
        status: UserStatus,
    ) -> NewUser {
        NewUser {
            first_name: non_empty(&self.first_name).map(str::to_string),
            last_name: non_empty(&self.last_name).map(str::to_string),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::parse_or_default(non_empty(&self.role)),
            status,
            photo_url: non_empty(&self.photo_url).map(str::to_string),
        }
    }
}
