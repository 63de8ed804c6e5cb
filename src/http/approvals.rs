//! Approval endpoints — preview, approve, edit, regenerate, reject.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Error;
use crate::http::pages;
use crate::http::{AppState, BodyKind, JsonOrForm, require_record_access};

/// Parameters of `GET|POST /approve`.
///
/// `skipHubspot=true` (the default) renders the editable preview with no
/// side effects; `skipHubspot=false` runs the approval.
#[derive(Debug, Deserialize)]
pub struct ApproveParams {
    pub id: Uuid,
    pub email: String,
    #[serde(default, rename = "modifiedMessage")]
    pub modified_message: Option<String>,
    #[serde(default, rename = "skipHubspot")]
    pub skip_hubspot: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl ApproveParams {
    fn is_preview(&self) -> bool {
        self.skip_hubspot
            .as_deref()
            .map(|s| !s.eq_ignore_ascii_case("false"))
            .unwrap_or(true)
    }
}

/// `GET /approve` — the link target posted to the review channel.
pub async fn approve_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ApproveParams>,
) -> Response {
    handle_approve(&state, &headers, params, true).await
}

/// `POST /approve` — preview-page form submit or programmatic approval.
pub async fn approve_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(params, kind): JsonOrForm<ApproveParams>,
) -> Response {
    handle_approve(&state, &headers, params, kind == BodyKind::Form).await
}

async fn handle_approve(
    state: &AppState,
    headers: &HeaderMap,
    params: ApproveParams,
    html: bool,
) -> Response {
    if let Err(e) = require_record_access(state, headers, params.token.as_deref(), params.id) {
        return respond_error(e, html);
    }

    if params.is_preview() {
        match state.workflow.get_record(params.id).await {
            Ok(record) if record.is_pending() => {
                let text = params
                    .modified_message
                    .unwrap_or_else(|| record.message_text.clone());
                Html(pages::preview_page(&record, &text, params.token.as_deref())).into_response()
            }
            Ok(record) => respond_error(
                Error::Conflict(format!("record {} is already {}", record.id, record.status)),
                html,
            ),
            Err(e) => respond_error(e, html),
        }
    } else {
        match state
            .workflow
            .approve(params.id, &params.email, params.modified_message)
            .await
        {
            Ok(record) => {
                if html {
                    Html(pages::approved_page(&record)).into_response()
                } else {
                    Json(record).into_response()
                }
            }
            Err(e) => respond_error(e, html),
        }
    }
}

/// Optional `?token=` action-token parameter.
#[derive(Debug, Deserialize)]
pub struct TokenParam {
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of `PUT /pending/{id}`.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub message: String,
}

/// `PUT /pending/{id}` — update the draft text while pending.
pub async fn edit_pending(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<TokenParam>,
    Json(body): Json<EditRequest>,
) -> Result<impl IntoResponse, Error> {
    require_record_access(&state, &headers, query.token.as_deref(), id)?;
    let record = state.workflow.edit_pending(id, body.message).await?;
    Ok(Json(record))
}

/// `POST /pending/{id}/regenerate` — re-draft via the LLM while pending.
pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<TokenParam>,
) -> Result<impl IntoResponse, Error> {
    require_record_access(&state, &headers, query.token.as_deref(), id)?;
    let record = state.workflow.regenerate(id).await?;
    Ok(Json(record))
}

/// Body of `POST /reject`.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub id: Uuid,
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /reject` — terminal rejection, no side effects.
pub async fn reject(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(body, kind): JsonOrForm<RejectRequest>,
) -> Response {
    let html = kind == BodyKind::Form;

    if let Err(e) = require_record_access(&state, &headers, body.token.as_deref(), body.id) {
        return respond_error(e, html);
    }

    match state.workflow.reject(body.id).await {
        Ok(record) => {
            if html {
                Html(pages::rejected_page(&record)).into_response()
            } else {
                Json(record).into_response()
            }
        }
        Err(e) => respond_error(e, html),
    }
}

/// HTML error page for browser flows, JSON body otherwise.
fn respond_error(err: Error, html: bool) -> Response {
    if html {
        let status = err.status_code();
        (status, Html(pages::error_page(status, &err.to_string()))).into_response()
    } else {
        err.into_response()
    }
}
