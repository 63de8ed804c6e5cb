//! Reply drafter — uses the LLM to produce a proposed reply from lead data.

use std::sync::Arc;

use tracing::info;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, DraftModel};
use crate::records::model::FormDetails;

/// Configuration for reply drafting.
#[derive(Debug, Clone)]
pub struct DrafterConfig {
    /// LLM temperature for reply generation.
    pub temperature: f32,
    /// Max tokens for the LLM response.
    pub max_tokens: u32,
    /// Name signed at the bottom of drafts.
    pub sender_name: String,
}

impl Default for DrafterConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 1024,
            sender_name: "The team".to_string(),
        }
    }
}

/// Lead data the drafter writes against.
#[derive(Debug, Clone)]
pub struct LeadContext<'a> {
    pub email: &'a str,
    pub message: Option<&'a str>,
    pub form_details: Option<&'a FormDetails>,
}

/// Produces reply drafts for inbound leads.
pub struct ReplyDrafter {
    model: Arc<dyn DraftModel>,
    config: DrafterConfig,
}

impl ReplyDrafter {
    pub fn new(model: Arc<dyn DraftModel>, config: DrafterConfig) -> Self {
        Self { model, config }
    }

    /// Draft a reply for the given lead. Returns cleaned markdown text.
    pub async fn draft_reply(&self, lead: &LeadContext<'_>) -> Result<String, LlmError> {
        let system_prompt = format!(
            "You draft email replies to inbound sales leads on behalf of {sender}. \
             A human reviews and edits every draft before it is sent.\n\n\
             Rules:\n\
             - Warm, concise, professional; two or three short paragraphs\n\
             - Address the lead's actual question; never invent pricing or commitments\n\
             - Plain markdown, no subject line, no placeholders like [NAME]\n\
             - Sign off as {sender}\n\n\
             Output only the reply body.",
            sender = self.config.sender_name
        );

        let user_prompt = build_lead_summary(lead);

        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.model.complete(request).await?;
        let draft = clean_draft(&response.content);

        if draft.is_empty() {
            return Err(LlmError::EmptyCompletion {
                provider: response.model,
            });
        }

        info!(
            email = lead.email,
            chars = draft.len(),
            "Reply draft generated"
        );

        Ok(draft)
    }
}

/// Render the lead into the user prompt.
fn build_lead_summary(lead: &LeadContext<'_>) -> String {
    let mut lines = vec![format!("Lead email: {}", lead.email)];

    if let Some(details) = lead.form_details {
        if let Some(name) = &details.name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(company) = &details.company {
            lines.push(format!("Company: {company}"));
        }
        if let Some(phone) = &details.phone {
            lines.push(format!("Phone: {phone}"));
        }
        for (key, value) in &details.extra {
            lines.push(format!("{key}: {value}"));
        }
    }

    match lead.message {
        Some(message) if !message.trim().is_empty() => {
            lines.push(format!("\nTheir message:\n{}", message.trim()));
        }
        _ => lines.push("\nNo message was included with the form.".into()),
    }

    lines.join("\n")
}

/// Strip code fences and surrounding quotes models sometimes wrap drafts in.
fn clean_draft(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(stripped) = text.strip_prefix("```") {
        // Drop an optional language tag on the opening fence.
        let stripped = stripped
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or(stripped);
        text = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    }

    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }

    text.trim().to_string()
}
