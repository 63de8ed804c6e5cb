//! Slack notifier — posts drafts with edit/approve links via the Web API.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::records::model::MessageRecord;

/// Slack truncates around 40k characters; keep posted drafts well under it.
const MAX_DRAFT_PREVIEW_CHARS: usize = 3000;

/// Bounded timeout for Slack calls — these sit inside request handlers.
const SLACK_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// Slack configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

impl SlackConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SLACK_BOT_TOKEN` is not set (notifications disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("SLACK_BOT_TOKEN").ok()?;
        let channel_id = std::env::var("SLACK_CHANNEL_ID").ok()?;
        Some(Self {
            bot_token,
            channel_id,
        })
    }
}

// ── Trait ───────────────────────────────────────────────────────────

/// Posts review requests and confirmations to the chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a new draft with its edit and approve links.
    async fn post_draft(
        &self,
        record: &MessageRecord,
        edit_url: &str,
        approve_url: &str,
    ) -> Result<(), NotifyError>;

    /// Post a confirmation after the reply was sent.
    async fn post_confirmation(&self, record: &MessageRecord) -> Result<(), NotifyError>;
}

// ── Slack implementation ────────────────────────────────────────────

/// Slack notifier — posts to one channel via `chat.postMessage`.
pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SLACK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Post mrkdwn text to the configured channel.
    ///
    /// Slack reports API-level failures in a 200 body (`"ok": false`),
    /// so both the HTTP status and the body are checked.
    async fn post_message(&self, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "channel": self.config.channel_id,
            "text": text,
            "unfurl_links": false,
        });

        let resp = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.config.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError::Http(format!(
                "chat.postMessage returned {}",
                resp.status()
            )));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if payload["ok"].as_bool() != Some(true) {
            let reason = payload["error"].as_str().unwrap_or("unknown").to_string();
            return Err(NotifyError::Api(reason));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post_draft(
        &self,
        record: &MessageRecord,
        edit_url: &str,
        approve_url: &str,
    ) -> Result<(), NotifyError> {
        let text = draft_message_text(record, edit_url, approve_url);
        self.post_message(&text).await?;
        tracing::info!(record_id = %record.id, "Draft posted to Slack");
        Ok(())
    }

    async fn post_confirmation(&self, record: &MessageRecord) -> Result<(), NotifyError> {
        let text = format!(
            ":white_check_mark: Reply to *{}* approved and sent.",
            record.email
        );
        self.post_message(&text).await
    }
}

/// Render the review-request message.
fn draft_message_text(record: &MessageRecord, edit_url: &str, approve_url: &str) -> String {
    let mut text = format!(":email: New lead reply drafted for *{}*", record.email);

    if let Some(details) = &record.form_details {
        let who = [details.name.as_deref(), details.company.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        if !who.is_empty() {
            text.push_str(&format!(" ({who})"));
        }
    }

    if let Some(original) = &record.original_message {
        text.push_str(&format!("\n> {}", truncate(original, 500).replace('\n', "\n> ")));
    }

    text.push_str(&format!(
        "\n\n*Draft:*\n{}\n\n<{edit_url}|:pencil2: Edit> · <{approve_url}|:white_check_mark: Approve>",
        truncate(&record.message_text, MAX_DRAFT_PREVIEW_CHARS)
    ));

    text
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
