//! HTTP-level integration tests for the approval workflow.
//!
//! Drives the full router with an in-memory store and mock collaborators:
//! session auth, submission intake, the preview/approve path, and the
//! degraded-success policy for CRM failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use tower::ServiceExt;
use uuid::Uuid;

use lead_assist::auth::SessionGate;
use lead_assist::crm::CrmSink;
use lead_assist::error::{CrmError, LlmError, MailError, NotifyError};
use lead_assist::http::{AppState, build_router};
use lead_assist::llm::provider::{CompletionRequest, CompletionResponse, DraftModel};
use lead_assist::llm::{DrafterConfig, ReplyDrafter};
use lead_assist::mail::MailSender;
use lead_assist::notify::Notifier;
use lead_assist::records::model::MessageRecord;
use lead_assist::records::ApprovalWorkflow;
use lead_assist::store::{LibSqlBackend, RecordStore};

const ADMIN_PASSWORD: &str = "integration-password";
const DRAFT_TEXT: &str = "Thanks for writing in! Happy to walk you through it.";

// ── Mock collaborators ──────────────────────────────────────────────

#[derive(Default)]
struct MockMail {
    sent: AtomicUsize,
}

#[async_trait]
impl MailSender for MockMail {
    async fn send_reply(&self, _to: &str, _body: &str) -> Result<(), MailError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// CRM stub whose engagement endpoint always fails — exercises the
/// degraded-success policy end to end.
#[derive(Default)]
struct FlakyCrm {
    notes: AtomicUsize,
}

#[async_trait]
impl CrmSink for FlakyCrm {
    async fn log_engagement(&self, _email: &str, _body: &str) -> Result<(), CrmError> {
        Err(CrmError::Api {
            status: 500,
            body: "engagement service down".into(),
        })
    }

    async fn log_note(&self, _email: &str, _body: &str) -> Result<(), CrmError> {
        self.notes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn post_draft(
        &self,
        _record: &MessageRecord,
        _edit_url: &str,
        _approve_url: &str,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn post_confirmation(&self, _record: &MessageRecord) -> Result<(), NotifyError> {
        Ok(())
    }
}

struct CannedModel;

#[async_trait]
impl DraftModel for CannedModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: DRAFT_TEXT.into(),
            model: "canned".into(),
        })
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

// ── Test app builder ────────────────────────────────────────────────

struct TestApp {
    router: Router,
    gate: Arc<SessionGate>,
    mail: Arc<MockMail>,
    crm: Arc<FlakyCrm>,
}

async fn build_test_app() -> TestApp {
    let store: Arc<dyn RecordStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let mail = Arc::new(MockMail::default());
    let crm = Arc::new(FlakyCrm::default());
    let gate = Arc::new(SessionGate::new(
        SecretString::from(ADMIN_PASSWORD),
        SecretString::from("integration-signing-secret"),
    ));
    let drafter = Arc::new(ReplyDrafter::new(
        Arc::new(CannedModel),
        DrafterConfig::default(),
    ));

    let workflow = Arc::new(ApprovalWorkflow::new(
        store,
        mail.clone() as Arc<dyn MailSender>,
        drafter,
        Arc::clone(&gate),
        Some(crm.clone() as Arc<dyn CrmSink>),
        Some(Arc::new(SilentNotifier) as Arc<dyn Notifier>),
        "http://localhost:8080".into(),
    ));

    let router = build_router(AppState {
        workflow,
        gate: Arc::clone(&gate),
    });

    TestApp {
        router,
        gate,
        mail,
        crm,
    }
}

// ── Request helpers ─────────────────────────────────────────────────

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_cookie(mut request: Request<Body>, cookie: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    request
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn response_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Log in and return the `session=…` cookie pair.
async fn login(app: &TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/session",
            serde_json::json!({ "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

/// Create a record through the submission endpoint, returning its id.
async fn submit_lead(app: &TestApp, email: &str) -> Uuid {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/submissions",
            serde_json::json!({
                "email": email,
                "message": "Do you have an API?",
                "formDetails": { "name": "Ada", "company": "Acme" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    body["messageId"].as_str().unwrap().parse().unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = build_test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submission_creates_pending_record() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;

    let cookie = login(&app).await;
    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            Request::get("/records").body(Body::empty()).unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = response_text(response).await;
    assert!(html.contains("lead@x.com"));
    assert!(html.contains("pending"));
    assert!(html.contains(&format!("id={id}")));
}

#[tokio::test]
async fn malformed_email_is_rejected_with_400() {
    let app = build_test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/submissions",
            serde_json::json!({ "email": "not-an-email", "message": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn records_listing_requires_session() {
    let app = build_test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/records").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong password gets no cookie.
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/session",
            serde_json::json!({ "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn approve_flow_sends_exactly_one_mail() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;
    let cookie = login(&app).await;

    let approve_body = serde_json::json!({
        "id": id,
        "email": "lead@x.com",
        "skipHubspot": "false",
    });

    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request("POST", "/approve", approve_body.clone()),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["message_text"], DRAFT_TEXT);
    assert_eq!(app.mail.sent.load(Ordering::SeqCst), 1);

    // Engagement always fails in this harness — the note fallback ran and
    // the approval still succeeded.
    assert_eq!(app.crm.notes.load(Ordering::SeqCst), 1);

    // A second approval (double-clicked link, retried webhook) conflicts.
    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request("POST", "/approve", approve_body),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.mail.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn action_token_substitutes_for_session() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;
    let token = app.gate.issue_action_token(id).unwrap();

    // Preview via the signed link, no cookie.
    let uri = format!("/approve?id={id}&email=lead@x.com&token={token}");
    let response = app
        .router
        .clone()
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = response_text(response).await;
    assert!(html.contains(DRAFT_TEXT));
    assert!(html.contains("Send reply"));

    // A token for a different record does not open this one.
    let other_token = app.gate.issue_action_token(Uuid::new_v4()).unwrap();
    let uri = format!("/approve?id={id}&email=lead@x.com&token={other_token}");
    let response = app
        .router
        .clone()
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // No token, no session: denied.
    let uri = format!("/approve?id={id}&email=lead@x.com");
    let response = app
        .router
        .clone()
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn edit_updates_draft_before_approval() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;
    let cookie = login(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                &format!("/pending/{id}"),
                serde_json::json!({ "message": "Hello there" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["message_text"], "Hello there");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn reject_is_terminal_over_http() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;
    let cookie = login(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request("POST", "/reject", serde_json::json!({ "id": id })),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "rejected");

    // Approval after rejection conflicts and sends nothing.
    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/approve",
                serde_json::json!({ "id": id, "email": "lead@x.com", "skipHubspot": "false" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.mail.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_record_is_404() {
    let app = build_test_app().await;
    let cookie = login(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/approve",
                serde_json::json!({
                    "id": Uuid::new_v4(),
                    "email": "lead@x.com",
                    "skipHubspot": "false",
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn regenerate_replaces_draft() {
    let app = build_test_app().await;
    let id = submit_lead(&app, "lead@x.com").await;
    let cookie = login(&app).await;

    // Edit away from the canned text first, then regenerate back to it.
    app.router
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                &format!("/pending/{id}"),
                serde_json::json!({ "message": "manual edit" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                &format!("/pending/{id}/regenerate"),
                serde_json::json!({}),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message_text"], DRAFT_TEXT);
}
