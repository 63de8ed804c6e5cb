//! Session gate — signed admin sessions and per-record action tokens.
//!
//! Two token families share one HS256 secret:
//!
//! - **Session tokens**: issued against the configured admin password,
//!   24h expiry, fixed `role=admin` claim. Carried in the `session`
//!   cookie and gate the admin endpoints.
//! - **Action tokens**: embedded in the edit/approve links posted to the
//!   chat channel. Each binds a single record id; a link can only act on
//!   the record it was issued for.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Admin session lifetime.
const SESSION_TTL_HOURS: i64 = 24;
/// Action-link lifetime. Longer than a session: links sit in a chat
/// channel until a human gets to them.
const ACTION_TTL_HOURS: i64 = 72;

const ADMIN_ROLE: &str = "admin";
/// `kind` claim distinguishing the two token families.
const KIND_SESSION: &str = "session";
const KIND_ACTION: &str = "action";

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    role: String,
    kind: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ActionClaims {
    /// Record id this token is bound to.
    sub: String,
    kind: String,
    exp: i64,
}

/// Issues and validates admin session tokens and record action tokens.
pub struct SessionGate {
    admin_password: SecretString,
    secret: SecretString,
}

impl SessionGate {
    pub fn new(admin_password: SecretString, secret: SecretString) -> Self {
        Self {
            admin_password,
            secret,
        }
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    /// Compare `password` against the configured admin secret and issue a
    /// 24h session token on match.
    pub fn issue_session(&self, password: &str) -> Result<String, AuthError> {
        if password != self.admin_password.expose_secret() {
            return Err(AuthError::BadPassword);
        }

        let now = Utc::now();
        let claims = SessionClaims {
            sub: "admin".into(),
            role: ADMIN_ROLE.into(),
            kind: KIND_SESSION.into(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify signature, expiry, and the admin role claim.
    pub fn validate_session(&self, token: &str) -> Result<(), AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key(), &Validation::default())
            .map_err(map_jwt_error)?;

        if data.claims.kind != KIND_SESSION {
            return Err(AuthError::InvalidToken("not a session token".into()));
        }
        if data.claims.role != ADMIN_ROLE {
            return Err(AuthError::WrongRole {
                role: data.claims.role,
            });
        }
        Ok(())
    }

    /// Issue a signed token authorizing lifecycle actions on one record.
    pub fn issue_action_token(&self, record_id: Uuid) -> Result<String, AuthError> {
        let claims = ActionClaims {
            sub: record_id.to_string(),
            kind: KIND_ACTION.into(),
            exp: (Utc::now() + Duration::hours(ACTION_TTL_HOURS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify an action token against the record it claims to act on.
    pub fn validate_action_token(&self, token: &str, record_id: Uuid) -> Result<(), AuthError> {
        let data = decode::<ActionClaims>(token, &self.decoding_key(), &Validation::default())
            .map_err(map_jwt_error)?;

        if data.claims.kind != KIND_ACTION {
            return Err(AuthError::InvalidToken("not an action token".into()));
        }
        if data.claims.sub != record_id.to_string() {
            return Err(AuthError::RecordMismatch { record_id });
        }
        Ok(())
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::InvalidToken(err.to_string()),
    }
}
