//! Mail collaborator — SMTP delivery via lettre.
//!
//! Sending is the one fatal side effect of approval: a failed send must
//! surface to the caller so the workflow can release its claim.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::MailError;

// ── Configuration ───────────────────────────────────────────────────

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Subject line for outbound replies.
    pub subject: String,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMTP_HOST` is not set.
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        let subject = std::env::var("SMTP_SUBJECT")
            .unwrap_or_else(|_| "Thanks for reaching out".to_string());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            subject,
        })
    }
}

// ── Trait + SMTP implementation ─────────────────────────────────────

/// Delivers approved replies.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_reply(&self, to: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP mail sender.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_reply(&self, to: &str, body: &str) -> Result<(), MailError> {
        let config = self.config.clone();
        let to = to.to_string();
        let body = body.to_string();

        // lettre's SmtpTransport is blocking; keep it off the async runtime.
        tokio::task::spawn_blocking(move || send_smtp(&config, &to, &body))
            .await
            .map_err(|e| MailError::Send(format!("send task panicked: {e}")))?
    }
}

fn send_smtp(config: &MailConfig, to: &str, body: &str) -> Result<(), MailError> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());

    let transport = SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| MailError::Relay(e.to_string()))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| MailError::InvalidAddress {
                    address: config.from_address.clone(),
                    reason: format!("{e}"),
                })?,
        )
        .to(to.parse().map_err(|e| MailError::InvalidAddress {
            address: to.to_string(),
            reason: format!("{e}"),
        })?)
        .subject(&config.subject)
        .body(body.to_string())
        .map_err(|e| MailError::Build(e.to_string()))?;

    transport
        .send(&email)
        .map_err(|e| MailError::Send(e.to_string()))?;

    tracing::info!("Reply email sent to {to}");
    Ok(())
}
