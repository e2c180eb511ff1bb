use serde::{Deserialize, Serialize};

use crate::users::repo_types::Role;

/// JWT payload. `role` reflects the user at issuance only; the principal
/// resolver re-reads the live record on every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // username
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}
