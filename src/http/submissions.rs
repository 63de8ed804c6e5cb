//! Inbound form submissions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::Error;
use crate::http::AppState;
use crate::records::model::FormDetails;

/// Body of `POST /submissions`.
#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub email: String,
    /// The lead's message from the contact form.
    #[serde(default)]
    pub message: Option<String>,
    /// Fuller inbound payload, when the form distinguishes it from `message`.
    #[serde(default, rename = "originalMessage")]
    pub original_message: Option<String>,
    /// Structured form payload, validated here once.
    #[serde(default, rename = "formDetails")]
    pub form_details: Option<FormDetails>,
}

/// `POST /submissions` — draft a reply and create the pending record.
pub async fn create_submission(
    State(state): State<AppState>,
    Json(body): Json<SubmissionRequest>,
) -> Result<impl IntoResponse, Error> {
    let record = state
        .workflow
        .submit(
            &body.email,
            body.message,
            body.original_message,
            body.form_details,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "messageId": record.id })),
    ))
}
