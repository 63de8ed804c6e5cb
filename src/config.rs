//! Application configuration, assembled from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::crm::HubSpotConfig;
use crate::error::ConfigError;
use crate::llm::{DrafterConfig, LlmBackend, LlmConfig};
use crate::mail::MailConfig;
use crate::notify::SlackConfig;

/// Top-level service configuration.
///
/// Mail, the LLM, and the admin secrets are required; Slack and HubSpot
/// are optional collaborators that disable their side effects when absent.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP server binds on.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Public base URL the action links are built against.
    pub base_url: String,
    /// Admin password the session gate compares against.
    pub admin_password: SecretString,
    /// HS256 secret signing session and action tokens.
    pub session_secret: SecretString,
    pub llm: LlmConfig,
    pub drafter: DrafterConfig,
    pub mail: MailConfig,
    pub slack: Option<SlackConfig>,
    pub hubspot: Option<HubSpotConfig>,
}

impl AppConfig {
    /// Build the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = match std::env::var("LEAD_ASSIST_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LEAD_ASSIST_PORT",
                message: format!("{raw:?} is not a port number"),
            })?,
            Err(_) => 8080,
        };

        let db_path = std::env::var("LEAD_ASSIST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/lead-assist.db"));

        let base_url = std::env::var("LEAD_ASSIST_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let admin_password = required_secret("ADMIN_PASSWORD")?;
        let session_secret = required_secret("SESSION_SECRET")?;

        let backend: LlmBackend = std::env::var("LEAD_ASSIST_LLM_BACKEND")
            .unwrap_or_else(|_| "anthropic".to_string())
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                key: "LEAD_ASSIST_LLM_BACKEND",
                message,
            })?;

        let (key_var, default_model) = match backend {
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
            LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o"),
        };

        let llm = LlmConfig {
            backend,
            api_key: required_secret(key_var)?,
            model: std::env::var("LEAD_ASSIST_MODEL")
                .unwrap_or_else(|_| default_model.to_string()),
        };

        let drafter = DrafterConfig {
            sender_name: std::env::var("LEAD_ASSIST_SENDER_NAME")
                .unwrap_or_else(|_| DrafterConfig::default().sender_name),
            ..DrafterConfig::default()
        };

        let mail = MailConfig::from_env().ok_or(ConfigError::MissingEnvVar("SMTP_HOST"))?;

        Ok(Self {
            port,
            db_path,
            base_url,
            admin_password,
            session_secret,
            llm,
            drafter,
            mail,
            slack: SlackConfig::from_env(),
            hubspot: HubSpotConfig::from_env(),
        })
    }
}

fn required_secret(key: &'static str) -> Result<SecretString, ConfigError> {
    std::env::var(key)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(key))
}
