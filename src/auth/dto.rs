use serde::{Deserialize, Serialize};

use crate::users::repo_types::Role;

/// Request body for self-registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub photo_url: Option<String>,
}

/// Request body for login. Missing fields deserialize empty and fail as
/// bad credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response returned by register and login. `token`, `username` and `role`
/// are null whenever `success` is false.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub success: bool,
    pub token: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub message: String,
}
