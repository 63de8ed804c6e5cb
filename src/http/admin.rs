//! Admin endpoints — session issue/revoke and the record listing.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;

use crate::error::Error;
use crate::http::pages;
use crate::http::{AppState, BodyKind, JsonOrForm, SESSION_COOKIE, require_session};

/// Session cookie lifetime, matching the token's own expiry.
const COOKIE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Body of `POST /session`.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub password: String,
}

/// `POST /session` — verify the admin password and set the session cookie.
pub async fn create_session(
    State(state): State<AppState>,
    JsonOrForm(body, kind): JsonOrForm<SessionRequest>,
) -> Response {
    match state.gate.issue_session(&body.password) {
        Ok(token) => {
            let cookie = format!(
                "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={COOKIE_MAX_AGE_SECS}"
            );
            let headers = [(header::SET_COOKIE, cookie)];
            match kind {
                BodyKind::Form => (headers, Redirect::to("/records")).into_response(),
                BodyKind::Json => {
                    (headers, Json(serde_json::json!({ "ok": true }))).into_response()
                }
            }
        }
        Err(e) => match kind {
            BodyKind::Form => (
                StatusCode::UNAUTHORIZED,
                Html(pages::login_page(Some("Incorrect password."))),
            )
                .into_response(),
            BodyKind::Json => Error::from(e).into_response(),
        },
    }
}

/// `POST /session/revoke` — clear the session cookie.
pub async fn revoke_session() -> Response {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    let headers = [(header::SET_COOKIE, cookie)];
    (headers, Redirect::to("/records")).into_response()
}

/// `GET /records` — admin-only listing of all records, newest first.
///
/// An unauthenticated browser gets the login form with a 401 rather than a
/// bare error body.
pub async fn list_records(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if require_session(&state, &headers).is_err() {
        return (StatusCode::UNAUTHORIZED, Html(pages::login_page(None))).into_response();
    }

    match state.workflow.list_records().await {
        Ok(records) => Html(pages::records_page(&records)).into_response(),
        Err(e) => {
            let status = e.status_code();
            (status, Html(pages::error_page(status, &e.to_string()))).into_response()
        }
    }
}
