use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState, users::repo_types::Role};

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token cannot be parsed")]
    Malformed,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer or audience rejected")]
    ClaimsRejected,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::ClaimsRejected,
            _ => TokenError::Malformed,
        }
    }
}

/// Upper bound on token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    /// Signs an HS256 token for `username` valid for the configured TTL.
    pub fn issue(&self, username: &str, role: Role) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = TimeDuration::try_from(self.ttl)?;
        let exp = now
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?;
        let claims = Claims {
            sub: username.to_string(),
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(username = %username, role = %role, "jwt signed");
        Ok(token)
    }

    /// Verifies signature, issuer, audience and expiry (no leeway).
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        // jsonwebtoken still accepts exp == now
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if data.claims.exp as i64 <= now {
            return Err(TokenError::Expired);
        }
        debug!(username = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    fn sign_raw(keys: &JwtKeys, claims: &Claims) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding).expect("encode")
    }

    #[test]
    fn issue_and_validate() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys.issue("alice", Role::Hr).expect("issue");
        let claims = keys.validate(&token).expect("validate");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Hr);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn expired_token_with_intact_signature_is_expired() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            sub: "alice".into(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = sign_raw(&keys, &claims);
        assert_eq!(keys.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_is_expired_at_its_exp_second() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            sub: "x".into(),
            role: Role::User,
            iat: now - 10,
            exp: now,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = sign_raw(&keys, &claims);
        assert_eq!(keys.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn oversized_ttl_is_capped_and_still_issues() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: i64::MAX,
        });
        assert_eq!(keys.ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        let claims = keys.validate(&keys.issue("alice", Role::User).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TTL_MINUTES as usize * 60);
    }

    #[test]
    fn foreign_secret_is_invalid_signature() {
        let ours = make_keys("our-secret", "iss", "aud");
        let theirs = make_keys("their-secret", "iss", "aud");
        let token = theirs.issue("mallory", Role::SuperAdmin).unwrap();
        assert_eq!(ours.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_is_invalid_signature() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user_token = keys.issue("bob", Role::User).unwrap();
        let admin_token = keys.issue("bob", Role::SuperAdmin).unwrap();
        let user_parts: Vec<&str> = user_token.split('.').collect();
        let admin_parts: Vec<&str> = admin_token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);
        assert_eq!(keys.validate(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert_eq!(keys.validate("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(keys.validate(""), Err(TokenError::Malformed));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "good-iss", "bad-aud");
        let token = good.issue("alice", Role::User).unwrap();
        assert_eq!(bad.validate(&token), Err(TokenError::ClaimsRejected));
    }
}
