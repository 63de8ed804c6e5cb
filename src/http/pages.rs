//! Inline HTML templates for the browser-facing flows.

use axum::http::StatusCode;

use crate::records::model::{MessageRecord, RecordStatus};

/// Minimal HTML escaping for interpolated text.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Shared page shell.
fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body {{ font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; color: #1a1a1a; }}
  textarea {{ width: 100%; min-height: 14rem; font: inherit; padding: .5rem; }}
  table {{ border-collapse: collapse; width: 100%; }}
  th, td {{ text-align: left; padding: .4rem .6rem; border-bottom: 1px solid #ddd; vertical-align: top; }}
  .status-pending {{ color: #b45309; }}
  .status-approved {{ color: #15803d; }}
  .status-rejected {{ color: #b91c1c; }}
  .muted {{ color: #666; font-size: .9rem; }}
  button {{ font: inherit; padding: .4rem 1rem; cursor: pointer; }}
  blockquote {{ border-left: 3px solid #ddd; margin: .5rem 0; padding: .2rem .8rem; color: #444; }}
</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn status_label(status: RecordStatus) -> String {
    format!(r#"<span class="status-{status}">{status}</span>"#)
}

/// Editable preview of a pending draft.
pub fn preview_page(record: &MessageRecord, draft_text: &str, action_token: Option<&str>) -> String {
    let token_input = action_token
        .map(|t| format!(r#"<input type="hidden" name="token" value="{}">"#, escape(t)))
        .unwrap_or_default();

    let original = record
        .original_message
        .as_deref()
        .map(|m| format!("<blockquote>{}</blockquote>", escape(m)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Review reply to {email}</h1>
<p class="muted">Record {id} · created {created} · {status}</p>
{original}
<form method="post" action="/approve">
  <input type="hidden" name="id" value="{id}">
  <input type="hidden" name="email" value="{email}">
  <input type="hidden" name="skipHubspot" value="false">
  {token_input}
  <p><textarea name="modifiedMessage">{draft}</textarea></p>
  <p><button type="submit">Send reply</button></p>
</form>
<form method="post" action="/reject">
  <input type="hidden" name="id" value="{id}">
  {token_input}
  <p><button type="submit">Reject without sending</button></p>
</form>"#,
        email = escape(&record.email),
        id = record.id,
        created = record.created_at.format("%Y-%m-%d %H:%M UTC"),
        status = status_label(record.status),
        draft = escape(draft_text),
    );

    layout("Review reply", &body)
}

/// Confirmation shown after a successful approval.
pub fn approved_page(record: &MessageRecord) -> String {
    let body = format!(
        r#"<h1>Reply sent</h1>
<p>The reply to <strong>{email}</strong> was approved and sent.</p>
<blockquote>{text}</blockquote>
<p class="muted">Record {id}</p>"#,
        email = escape(&record.email),
        text = escape(&record.message_text),
        id = record.id,
    );
    layout("Reply sent", &body)
}

/// Confirmation shown after a rejection.
pub fn rejected_page(record: &MessageRecord) -> String {
    let body = format!(
        r#"<h1>Draft rejected</h1>
<p>The draft reply to <strong>{email}</strong> was rejected. Nothing was sent.</p>
<p class="muted">Record {id}</p>"#,
        email = escape(&record.email),
        id = record.id,
    );
    layout("Draft rejected", &body)
}

/// Admin login form. `error` renders an inline failure note.
pub fn login_page(error: Option<&str>) -> String {
    let note = error
        .map(|e| format!(r#"<p class="status-rejected">{}</p>"#, escape(e)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Admin sign-in</h1>
{note}
<form method="post" action="/session">
  <p><input type="password" name="password" placeholder="Admin password" autofocus></p>
  <p><button type="submit">Sign in</button></p>
</form>"#
    );
    layout("Sign in", &body)
}

/// Admin listing of all records, newest first.
pub fn records_page(records: &[MessageRecord]) -> String {
    let rows: String = records
        .iter()
        .map(|record| {
            let actions = if record.is_pending() {
                format!(
                    r#"<a href="/approve?id={id}&amp;email={email}">review</a>"#,
                    id = record.id,
                    email = escape(&record.email),
                )
            } else {
                String::new()
            };
            format!(
                r#"<tr>
  <td class="muted">{created}</td>
  <td>{email}</td>
  <td>{status}</td>
  <td>{preview}</td>
  <td>{actions}</td>
</tr>"#,
                created = record.created_at.format("%Y-%m-%d %H:%M"),
                email = escape(&record.email),
                status = status_label(record.status),
                preview = escape(&truncate(&record.message_text, 120)),
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Lead replies</h1>
<p class="muted">{count} records</p>
<table>
<tr><th>Created</th><th>Email</th><th>Status</th><th>Draft</th><th></th></tr>
{rows}
</table>
<form method="post" action="/session/revoke"><p><button type="submit">Sign out</button></p></form>"#,
        count = records.len(),
    );
    layout("Lead replies", &body)
}

/// Generic error page for browser flows.
pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        r#"<h1>{code} {reason}</h1>
<p>{message}</p>"#,
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
        message = escape(message),
    );
    layout("Error", &body)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
