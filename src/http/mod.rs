//! HTTP surface — router, shared state, auth extraction, and handlers.

pub mod admin;
pub mod approvals;
pub mod pages;
pub mod submissions;

use std::sync::Arc;

use axum::extract::{Form, FromRequest, Json, Request};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::auth::SessionGate;
use crate::error::{AuthError, Error};
use crate::records::ApprovalWorkflow;

/// Name of the admin session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ApprovalWorkflow>,
    pub gate: Arc<SessionGate>,
}

/// Build the Axum router with the full HTTP surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submissions", post(submissions::create_submission))
        .route(
            "/approve",
            get(approvals::approve_get).post(approvals::approve_post),
        )
        .route("/pending/{id}", put(approvals::edit_pending))
        .route("/pending/{id}/regenerate", post(approvals::regenerate))
        .route("/reject", post(approvals::reject))
        .route("/session", post(admin::create_session))
        .route("/session/revoke", post(admin::revoke_session))
        .route("/records", get(admin::list_records))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lead-assist"
    }))
}

// ── Auth helpers ────────────────────────────────────────────────────

/// Pull the session cookie value out of request headers, if any.
pub(crate) fn session_cookie(headers: &axum::http::HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Require a valid admin session.
pub(crate) fn require_session(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<(), Error> {
    let token = session_cookie(headers).ok_or(AuthError::MissingToken)?;
    state.gate.validate_session(&token)?;
    Ok(())
}

/// Require either a valid action token for `record_id` or an admin session.
///
/// An action token, when present, must verify — an invalid token never
/// falls through to the cookie.
pub(crate) fn require_record_access(
    state: &AppState,
    headers: &axum::http::HeaderMap,
    action_token: Option<&str>,
    record_id: Uuid,
) -> Result<(), Error> {
    match action_token.filter(|t| !t.is_empty()) {
        Some(token) => {
            state.gate.validate_action_token(token, record_id)?;
            Ok(())
        }
        None => require_session(state, headers),
    }
}

// ── Body extraction ─────────────────────────────────────────────────

/// How a request body arrived — decides whether the response is a page
/// (browser form) or JSON (programmatic caller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
}

/// Accepts the same payload as JSON or an urlencoded form, remembering
/// which one it was.
pub struct JsonOrForm<T>(pub T, pub BodyKind);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value, BodyKind::Form))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value, BodyKind::Json))
        }
    }
}
