use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::{
    error::ApiError,
    users::{
        repo::UserStore,
        repo_types::{Role, User, UserStatus},
    },
};

/// Request-scoped identity built from the live user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
}

impl Principal {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
            status: user.status,
        }
    }
}

/// Loads the current record for a token subject. Role and status come from
/// the store, not from the token.
pub async fn resolve(store: &dyn UserStore, subject: &str) -> Result<Principal, ApiError> {
    let user = store
        .find_by_username(subject)
        .await?
        .ok_or_else(|| ApiError::UsernameNotFound(subject.to_string()))?;
    Ok(Principal::from(&user))
}

/// The principal bound to this request by the access gate.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{memory::MemoryUserStore, repo_types::NewUser};

    #[tokio::test]
    async fn resolve_reads_live_role_and_status() {
        let store = MemoryUserStore::new();
        let mut user = store
            .create(NewUser {
                first_name: None,
                last_name: None,
                username: "carol".into(),
                email: "carol@x.com".into(),
                password_hash: "h".into(),
                role: Role::User,
                status: UserStatus::Active,
                photo_url: None,
            })
            .await
            .unwrap();

        user.role = Role::Admin;
        user.status = UserStatus::Inactive;
        store.save(&user).await.unwrap();

        let p = resolve(&store, "carol").await.unwrap();
        assert_eq!(p.role, Role::Admin);
        assert_eq!(p.status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn resolve_unknown_subject_is_not_found() {
        let store = MemoryUserStore::new();
        let err = resolve(&store, "nobody").await.unwrap_err();
        assert!(matches!(err, ApiError::UsernameNotFound(u) if u == "nobody"));
    }
}
