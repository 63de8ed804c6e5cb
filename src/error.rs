//! Error types for Lead Assist.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

/// Top-level error type for the service.
///
/// Variants map onto HTTP status codes via [`Error::status_code`]:
/// validation 400, auth 401, not-found 404, conflict 409, upstream 502,
/// everything else 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// The HTTP status this error renders as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind for JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Upstream(_) => "upstream",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
        }
    }
}

/// JSON error body for programmatic callers. Browser-facing handlers map
/// errors to HTML pages themselves before this kicks in.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Session and action-token errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("incorrect password")]
    BadPassword,

    #[error("missing session or action token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,

    #[error("role {role:?} is not permitted")]
    WrongRole { role: String },

    #[error("action token does not match record {record_id}")]
    RecordMismatch { record_id: Uuid },
}

/// Record store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A required external collaborator call failed.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("mail delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("CRM call failed: {0}")]
    Crm(#[from] CrmError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("draft generation failed: {0}")]
    Llm(#[from] LlmError),
}

/// SMTP delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP relay error: {0}")]
    Relay(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Chat notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Slack API error: {0}")]
    Api(String),
}

/// CRM client errors.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HubSpot API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Empty completion from {provider}")]
    EmptyCompletion { provider: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            Error::Validation("bad email".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Auth(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::NotFound {
                entity: "record",
                id: Uuid::nil()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Conflict("already approved".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Upstream(UpstreamError::Mail(MailError::Send("boom".into()))).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::Database(DatabaseError::Query("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upstream_wraps_collaborator_errors() {
        let err: Error = UpstreamError::from(MailError::Relay("no route".into())).into();
        assert!(matches!(err, Error::Upstream(UpstreamError::Mail(_))));
        assert_eq!(err.kind(), "upstream");
    }
}
