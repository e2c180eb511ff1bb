use axum::{
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        principal::Principal,
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{non_empty, UserDto},
        repo::{StoreError, UniqueField},
        repo_types::{NewUser, Role, UserStatus},
        services::is_valid_email,
    },
};

lazy_static! {
    /// Verified against when the username is unknown so both failure paths
    /// pay for one Argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("timing-equalizer").ok();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    DuplicateUsername,
    DuplicateEmail,
    InvalidCredentials,
    AccountInactive,
    InvalidRequest(String),
    Internal,
}

impl AuthFailure {
    pub fn message(&self) -> String {
        match self {
            AuthFailure::DuplicateUsername => "Username already exists".into(),
            AuthFailure::DuplicateEmail => "Email already exists".into(),
            AuthFailure::InvalidCredentials => "Invalid username or password".into(),
            AuthFailure::AccountInactive => "User account is inactive".into(),
            AuthFailure::InvalidRequest(msg) => msg.clone(),
            AuthFailure::Internal => "Request could not be completed".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthFailure::DuplicateUsername | AuthFailure::DuplicateEmail => StatusCode::CONFLICT,
            AuthFailure::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthFailure::AccountInactive => StatusCode::FORBIDDEN,
            AuthFailure::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthFailure::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result of register or login. Failures are values, not errors, so nothing
/// internal crosses the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted(AuthGrant),
    Rejected(AuthFailure),
}

impl AuthOutcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthOutcome::Granted(g) => Some(&g.token),
            AuthOutcome::Rejected(_) => None,
        }
    }

    pub fn to_body(&self) -> AuthResponse {
        match self {
            AuthOutcome::Granted(g) => AuthResponse {
                success: true,
                token: Some(g.token.clone()),
                username: Some(g.username.clone()),
                role: Some(g.role),
                message: g.message.to_string(),
            },
            AuthOutcome::Rejected(f) => AuthResponse {
                success: false,
                token: None,
                username: None,
                role: None,
                message: f.message(),
            },
        }
    }

    pub fn into_response_with(self, success: StatusCode) -> Response {
        let status = match &self {
            AuthOutcome::Granted(_) => success,
            AuthOutcome::Rejected(f) => f.status(),
        };
        (status, Json(self.to_body())).into_response()
    }
}

fn rejected(f: AuthFailure) -> AuthOutcome {
    AuthOutcome::Rejected(f)
}

pub async fn register(state: &AppState, req: RegisterRequest) -> AuthOutcome {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() {
        return rejected(AuthFailure::InvalidRequest("Username is required".into()));
    }
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return rejected(AuthFailure::InvalidRequest("Invalid email".into()));
    }
    if req.password.is_empty() {
        return rejected(AuthFailure::InvalidRequest("Password is required".into()));
    }

    let store = state.store.as_ref();
    match store.find_by_username(username).await {
        Ok(Some(_)) => {
            warn!(username = %username, "username already registered");
            return rejected(AuthFailure::DuplicateUsername);
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return rejected(AuthFailure::Internal);
        }
    }
    match store.find_by_email(email).await {
        Ok(Some(_)) => {
            warn!(email = %email, "email already registered");
            return rejected(AuthFailure::DuplicateEmail);
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return rejected(AuthFailure::Internal);
        }
    }

    let role = Role::parse_or_default(non_empty(&req.role));
    let password_hash = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return rejected(AuthFailure::Internal);
        }
    };

    let new_user = NewUser {
        first_name: non_empty(&req.first_name).map(str::to_string),
        last_name: non_empty(&req.last_name).map(str::to_string),
        username: username.to_string(),
        email: email.to_string(),
        password_hash,
        role,
        status: UserStatus::Active,
        photo_url: non_empty(&req.photo_url).map(str::to_string),
    };
    let user = match store.create(new_user).await {
        Ok(u) => u,
        // lost a race against a concurrent registration
        Err(StoreError::Duplicate(UniqueField::Username)) => {
            return rejected(AuthFailure::DuplicateUsername)
        }
        Err(StoreError::Duplicate(UniqueField::Email)) => {
            return rejected(AuthFailure::DuplicateEmail)
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return rejected(AuthFailure::Internal);
        }
    };

    let keys = JwtKeys::from_ref(state);
    let token = match keys.issue(&user.username, user.role) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return rejected(AuthFailure::Internal);
        }
    };

    info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
    AuthOutcome::Granted(AuthGrant {
        token,
        username: user.username,
        role: user.role,
        message: "User registered successfully",
    })
}

pub async fn login(state: &AppState, req: LoginRequest) -> AuthOutcome {
    let username = req.username.trim();
    let user = match state.store.find_by_username(username).await {
        Ok(Some(u)) => Some(u),
        Ok(None) => None,
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return rejected(AuthFailure::InvalidCredentials);
        }
    };

    let Some(user) = user else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify_password(&req.password, dummy);
        }
        warn!(username = %username, "login unknown username");
        return rejected(AuthFailure::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash) {
        warn!(username = %username, user_id = user.id, "login invalid password");
        return rejected(AuthFailure::InvalidCredentials);
    }

    if !user.status.is_active() {
        warn!(username = %username, user_id = user.id, "login on inactive account");
        return rejected(AuthFailure::AccountInactive);
    }

    let keys = JwtKeys::from_ref(state);
    let token = match keys.issue(&user.username, user.role) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return rejected(AuthFailure::InvalidCredentials);
        }
    };

    info!(user_id = user.id, username = %user.username, "user logged in");
    AuthOutcome::Granted(AuthGrant {
        token,
        username: user.username,
        role: user.role,
        message: "Login successful",
    })
}

/// Profile of the bound principal; identity never comes from the client.
pub async fn current_profile(state: &AppState, principal: &Principal) -> Result<UserDto, ApiError> {
    let user = state
        .store
        .find_by_username(&principal.username)
        .await?
        .ok_or_else(|| ApiError::UsernameNotFound(principal.username.clone()))?;
    Ok(UserDto::from(user))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::users::repo::UserStore;
    use crate::users::repo_types::User;

    /// Passes every pre-check, then loses the insert on `field`.
    struct LateConflictStore {
        field: UniqueField,
    }

    #[async_trait]
    impl UserStore for LateConflictStore {
        async fn find_by_id(&self, _id: i64) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn create(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Duplicate(self.field))
        }

        async fn save(&self, user: &User) -> Result<User, StoreError> {
            Err(StoreError::NotFound(user.id))
        }

        async fn delete(&self, _id: i64) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn list_all(&self) -> Result<Vec<User>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn state_with_late_conflict(field: UniqueField) -> AppState {
        let base = AppState::fake();
        AppState::from_parts(Arc::new(LateConflictStore { field }), base.config)
    }

    fn register_req(username: &str, email: &str, password: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: Some("First".into()),
            last_name: Some("Last".into()),
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Some(role.into()),
            photo_url: None,
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_defaults_role_and_issues_token_for_subject() {
        let state = AppState::fake();
        let outcome = register(&state, register_req("alice", "a@x.com", "p1", "")).await;
        let token = outcome.token().expect("token issued").to_string();

        let claims = JwtKeys::from_ref(&state)
            .validate(&token)
            .expect("fresh token validates");
        assert_eq!(claims.sub, "alice");

        let stored = state.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);
        assert_eq!(stored.status, UserStatus::Active);
        assert_ne!(stored.password_hash, "p1");
        assert_eq!(outcome.to_body().message, "User registered successfully");
    }

    #[tokio::test]
    async fn register_parses_known_role_case_insensitively() {
        let state = AppState::fake();
        let outcome = register(&state, register_req("hank", "h@x.com", "pw", "hr")).await;
        assert!(matches!(outcome, AuthOutcome::Granted(ref g) if g.role == Role::Hr));
    }

    #[tokio::test]
    async fn register_duplicate_username_fails_regardless_of_email() {
        let state = AppState::fake();
        register(&state, register_req("alice", "a@x.com", "p1", "")).await;
        let outcome = register(&state, register_req("alice", "fresh@x.com", "p2", "")).await;
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::DuplicateUsername));
        let body = outcome.to_body();
        assert!(!body.success);
        assert!(body.token.is_none());
        assert_eq!(body.message, "Username already exists");
    }

    #[tokio::test]
    async fn register_duplicate_email_fails() {
        let state = AppState::fake();
        register(&state, register_req("alice", "a@x.com", "p1", "")).await;
        let outcome = register(&state, register_req("bob", "a@x.com", "p2", "")).await;
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_maps_conflict_raised_by_insert() {
        let state = state_with_late_conflict(UniqueField::Username);
        let outcome = register(&state, register_req("ivy", "i@x.com", "pw", "")).await;
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::DuplicateUsername));

        let state = state_with_late_conflict(UniqueField::Email);
        let outcome = register(&state, register_req("ivy", "i@x.com", "pw", "")).await;
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::DuplicateEmail));
        assert_eq!(outcome.to_body().message, "Email already exists");
    }

    #[tokio::test]
    async fn register_rejects_bad_email() {
        let state = AppState::fake();
        let outcome = register(&state, register_req("alice", "nope", "p1", "")).await;
        assert!(matches!(outcome, AuthOutcome::Rejected(AuthFailure::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn login_then_validate_resolves_same_identity() {
        let state = AppState::fake();
        register(&state, register_req("dave", "d@x.com", "s3cret", "ADMIN")).await;

        let outcome = login(&state, login_req("dave", "s3cret")).await;
        let AuthOutcome::Granted(grant) = outcome else {
            panic!("login should succeed");
        };
        assert_eq!(grant.message, "Login successful");
        let claims = JwtKeys::from_ref(&state).validate(&grant.token).unwrap();
        assert_eq!(claims.sub, "dave");
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_identical() {
        let state = AppState::fake();
        register(&state, register_req("erin", "e@x.com", "right", "")).await;

        let wrong_pw = login(&state, login_req("erin", "wrong")).await;
        let no_user = login(&state, login_req("nobody", "right")).await;
        assert_eq!(wrong_pw, no_user);
        assert_eq!(wrong_pw.to_body(), no_user.to_body());
        assert_eq!(wrong_pw.to_body().message, "Invalid username or password");
    }

    #[tokio::test]
    async fn inactive_account_gets_distinct_message() {
        let state = AppState::fake();
        register(&state, register_req("fay", "f@x.com", "pw", "")).await;
        let mut user = state.store.find_by_username("fay").await.unwrap().unwrap();
        user.status = UserStatus::Inactive;
        state.store.save(&user).await.unwrap();

        let outcome = login(&state, login_req("fay", "pw")).await;
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::AccountInactive));
        assert_eq!(outcome.to_body().message, "User account is inactive");

        let wrong_pw = login(&state, login_req("fay", "nope")).await;
        assert_eq!(wrong_pw, AuthOutcome::Rejected(AuthFailure::InvalidCredentials));
    }

    #[tokio::test]
    async fn current_profile_uses_principal_identity() {
        let state = AppState::fake();
        register(&state, register_req("gus", "g@x.com", "pw", "")).await;
        let principal = Principal {
            username: "gus".into(),
            role: Role::User,
            status: UserStatus::Active,
        };
        let view = current_profile(&state, &principal).await.unwrap();
        assert_eq!(view.username, "gus");
        assert_eq!(view.email, "g@x.com");
        assert_eq!(view.first_name.as_deref(), Some("First"));
    }
}
