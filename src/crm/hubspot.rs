//! HubSpot CRM client — contact search/create plus engagement and note logging.
//!
//! The approval workflow treats every call here as best-effort: a failed
//! engagement falls back to a note, and a failed note is only logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::CrmError;

/// Bounded timeout for HubSpot calls — these run inside request handlers.
const HUBSPOT_TIMEOUT: Duration = Duration::from_secs(30);

/// HubSpot v4 association type ids (HUBSPOT_DEFINED).
const ASSOC_EMAIL_TO_CONTACT: u32 = 198;
const ASSOC_NOTE_TO_CONTACT: u32 = 202;

// ── Configuration ───────────────────────────────────────────────────

/// HubSpot configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct HubSpotConfig {
    pub api_key: String,
    pub base_url: String,
}

impl HubSpotConfig {
    /// Build config from environment variables.
    /// Returns `None` if `HUBSPOT_API_KEY` is not set (CRM logging disabled).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("HUBSPOT_API_KEY").ok()?;
        let base_url = std::env::var("HUBSPOT_BASE_URL")
            .unwrap_or_else(|_| "https://api.hubapi.com".to_string());
        Some(Self { api_key, base_url })
    }
}

// ── Trait ───────────────────────────────────────────────────────────

/// Records an approved outbound reply against the CRM.
#[async_trait]
pub trait CrmSink: Send + Sync {
    /// Log the sent reply as an email engagement on the lead's contact.
    async fn log_engagement(&self, email: &str, body: &str) -> Result<(), CrmError>;

    /// Log the sent reply as a plain note — the engagement fallback.
    async fn log_note(&self, email: &str, body: &str) -> Result<(), CrmError>;
}

// ── Response types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ObjectRef>,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    id: String,
}

// ── Client ──────────────────────────────────────────────────────────

/// HubSpot REST client.
pub struct HubSpotClient {
    config: HubSpotConfig,
    client: reqwest::Client,
}

impl HubSpotClient {
    pub fn new(config: HubSpotConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HUBSPOT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, CrmError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CrmError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| CrmError::Parse(e.to_string()))
    }

    /// Find a contact by email, creating one if none exists. Returns the
    /// contact id.
    pub async fn find_or_create_contact(&self, email: &str) -> Result<String, CrmError> {
        let search = serde_json::json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": "email",
                    "operator": "EQ",
                    "value": email,
                }]
            }],
            "limit": 1,
        });

        let found = self
            .post_json("/crm/v3/objects/contacts/search", &search)
            .await?;
        let found: SearchResponse =
            serde_json::from_value(found).map_err(|e| CrmError::Parse(e.to_string()))?;

        if let Some(contact) = found.results.into_iter().next() {
            return Ok(contact.id);
        }

        let create = serde_json::json!({
            "properties": { "email": email }
        });
        let created = self.post_json("/crm/v3/objects/contacts", &create).await?;
        let created: ObjectRef =
            serde_json::from_value(created).map_err(|e| CrmError::Parse(e.to_string()))?;

        tracing::info!(email, contact_id = %created.id, "Created HubSpot contact");
        Ok(created.id)
    }
}

#[async_trait]
impl CrmSink for HubSpotClient {
    async fn log_engagement(&self, email: &str, body: &str) -> Result<(), CrmError> {
        let contact_id = self.find_or_create_contact(email).await?;
        let engagement = email_engagement_body(&contact_id, body, Utc::now().timestamp_millis());
        self.post_json("/crm/v3/objects/emails", &engagement).await?;
        tracing::info!(email, contact_id = %contact_id, "Logged HubSpot email engagement");
        Ok(())
    }

    async fn log_note(&self, email: &str, body: &str) -> Result<(), CrmError> {
        let contact_id = self.find_or_create_contact(email).await?;
        let note = note_body(&contact_id, body, Utc::now().timestamp_millis());
        self.post_json("/crm/v3/objects/notes", &note).await?;
        tracing::info!(email, contact_id = %contact_id, "Logged HubSpot note");
        Ok(())
    }
}

fn email_engagement_body(contact_id: &str, body: &str, timestamp_ms: i64) -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "hs_timestamp": timestamp_ms,
            "hs_email_direction": "EMAIL",
            "hs_email_status": "SENT",
            "hs_email_text": body,
        },
        "associations": [{
            "to": { "id": contact_id },
            "types": [{
                "associationCategory": "HUBSPOT_DEFINED",
                "associationTypeId": ASSOC_EMAIL_TO_CONTACT,
            }]
        }]
    })
}

fn note_body(contact_id: &str, body: &str, timestamp_ms: i64) -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "hs_timestamp": timestamp_ms,
            "hs_note_body": body,
        },
        "associations": [{
            "to": { "id": contact_id },
            "types": [{
                "associationCategory": "HUBSPOT_DEFINED",
                "associationTypeId": ASSOC_NOTE_TO_CONTACT,
            }]
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_body_associates_contact() {
        let body = email_engagement_body("1234", "hello", 1_700_000_000_000);
        assert_eq!(body["properties"]["hs_email_text"], "hello");
        assert_eq!(body["properties"]["hs_email_status"], "SENT");
        assert_eq!(body["associations"][0]["to"]["id"], "1234");
        assert_eq!(
            body["associations"][0]["types"][0]["associationTypeId"],
            ASSOC_EMAIL_TO_CONTACT
        );
    }

    #[test]
    fn note_body_associates_contact() {
        let body = note_body("1234", "hello", 1_700_000_000_000);
        assert_eq!(body["properties"]["hs_note_body"], "hello");
        assert_eq!(
            body["associations"][0]["types"][0]["associationTypeId"],
            ASSOC_NOTE_TO_CONTACT
        );
    }

    #[test]
    fn search_response_parses_empty_results() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"total": 0, "results": []}"#).unwrap();
        assert!(parsed.results.is_empty());

        let parsed: SearchResponse =
            serde_json::from_str(r#"{"results": [{"id": "42", "properties": {}}]}"#).unwrap();
        assert_eq!(parsed.results[0].id, "42");
    }
}
