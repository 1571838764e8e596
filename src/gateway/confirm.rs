//! Mobile confirmation web flow.
//!
//! The QR code shown in the browser encodes
//! `{frontend}/mobile/confirm?sessionId={id}`. When the gateway itself is
//! the frontend, these endpoints serve that page.
//!
//! ## Flow
//!
//! 1. Phone scans the QR code → `GET /mobile/confirm?sessionId=...`
//! 2. Page shows a confirm button (and an optional display name field)
//! 3. `POST /mobile/confirm` → session moves to Confirmed
//! 4. The browser's status poll picks up the confirmation

use super::AppState;
use crate::login::LoginStatus;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Form,
};

/// Query parameters of the confirmation page.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPageQuery {
    pub session_id: Option<String>,
}

/// Form data posted by the confirmation page.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmForm {
    pub session_id: String,
    #[serde(default)]
    pub user_info: Option<String>,
}

/// GET /mobile/confirm?sessionId={id}
pub async fn handle_confirm_page(
    State(state): State<AppState>,
    Query(query): Query<ConfirmPageQuery>,
) -> impl IntoResponse {
    let session_id = query.session_id.unwrap_or_default();

    match state.sessions.get(&session_id) {
        Some(session) if session.status == LoginStatus::Pending => {
            (StatusCode::OK, Html(render_confirm_page(&session.id)))
        }
        Some(_) => (StatusCode::OK, Html(render_already_confirmed())),
        None => (StatusCode::NOT_FOUND, Html(render_failure_page())),
    }
}

/// POST /mobile/confirm
pub async fn handle_confirm_submit(
    State(state): State<AppState>,
    Form(form): Form<ConfirmForm>,
) -> impl IntoResponse {
    if state
        .sessions
        .confirm(&form.session_id, form.user_info.as_deref())
    {
        (StatusCode::OK, Html(render_success_page()))
    } else {
        (StatusCode::BAD_REQUEST, Html(render_failure_page()))
    }
}

// ── HTML Templates ────────────────────────────────────────────────────

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #f5f5f5; color: #333;
        display: flex; justify-content: center; align-items: center;
        min-height: 100vh; padding: 20px;
    }
    .card {
        background: #fff; border-radius: 16px; padding: 32px;
        max-width: 400px; width: 100%; box-shadow: 0 4px 24px rgba(0,0,0,0.08);
    }
    .title { text-align: center; margin-bottom: 24px; }
    .title h1 { font-size: 24px; color: #1a1a2e; }
    .title p { font-size: 14px; color: #666; margin-top: 4px; }
    .form-group { margin-bottom: 16px; }
    .form-group label { display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #444; }
    .form-group input {
        width: 100%; padding: 12px 14px; border: 1.5px solid #ddd;
        border-radius: 10px; font-size: 16px; outline: none;
    }
    .form-group input:focus { border-color: #4a6cf7; }
    .btn {
        width: 100%; padding: 14px; border: none; border-radius: 10px;
        font-size: 16px; font-weight: 600; cursor: pointer;
        background: #4a6cf7; color: #fff;
    }
    .btn:hover { background: #3b5de7; }
    .icon { text-align: center; font-size: 64px; margin-bottom: 16px; }
    .note { text-align: center; font-size: 14px; color: #666; margin-top: 16px; }
    "#
}

fn render_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head><body>
<div class="card">
{body}
</div>
</body></html>"#,
        style = base_style(),
    )
}

fn render_confirm_page(session_id: &str) -> String {
    let session_id = escape_html(session_id);
    render_page(
        "Confirm login",
        &format!(
            r#"  <div class="title"><h1>Confirm login</h1><p>A browser is waiting for you to approve this sign-in.</p></div>
  <form method="POST" action="/mobile/confirm">
    <input type="hidden" name="sessionId" value="{session_id}">
    <div class="form-group">
      <label>Display name (optional)</label>
      <input type="text" name="userInfo" autocomplete="name" placeholder="Your name">
    </div>
    <button type="submit" class="btn">Confirm login</button>
  </form>
  <p class="note">Only confirm if you started this login yourself.</p>"#
        ),
    )
}

fn render_success_page() -> String {
    render_page(
        "Login confirmed",
        r#"  <div class="icon">✅</div>
  <div class="title"><h1>Login confirmed</h1><p>You can return to your browser.</p></div>"#,
    )
}

fn render_already_confirmed() -> String {
    render_page(
        "Already confirmed",
        r#"  <div class="icon">✅</div>
  <div class="title"><h1>Already confirmed</h1><p>This login was approved already.</p></div>"#,
    )
}

fn render_failure_page() -> String {
    render_page(
        "Login expired",
        r#"  <div class="icon">⌛</div>
  <div class="title"><h1>Invalid or expired session</h1><p>Refresh the QR code in your browser and scan again.</p></div>"#,
    )
}

/// Minimal HTML escaping for values interpolated into templates.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::LoginSessionStore;
    use http_body_util::BodyExt;
    use std::sync::Arc;

    fn test_state() -> AppState {
        AppState {
            sessions: Arc::new(LoginSessionStore::new()),
            frontend_url: None,
            gateway_base_url: "http://127.0.0.1:3000".into(),
        }
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn escape_html_neutralises_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>&'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;&amp;&#x27;"
        );
        assert_eq!(escape_html("plain_ID-123"), "plain_ID-123");
    }

    #[tokio::test]
    async fn page_for_pending_session_has_form() {
        let state = test_state();
        let session = state.sessions.create("http://x").unwrap();

        let response = handle_confirm_page(
            State(state),
            Query(ConfirmPageQuery {
                session_id: Some(session.id.clone()),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(&format!(r#"name="sessionId" value="{}""#, session.id)));
        assert!(html.contains(r#"action="/mobile/confirm""#));
    }

    #[tokio::test]
    async fn page_for_unknown_session_is_not_found() {
        let response = handle_confirm_page(
            State(test_state()),
            Query(ConfirmPageQuery { session_id: None }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Invalid or expired session"));
    }

    #[tokio::test]
    async fn page_for_confirmed_session_says_so() {
        let state = test_state();
        let session = state.sessions.create("http://x").unwrap();
        assert!(state.sessions.confirm(&session.id, None));

        let response = handle_confirm_page(
            State(state),
            Query(ConfirmPageQuery {
                session_id: Some(session.id),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Already confirmed"));
    }

    #[tokio::test]
    async fn submit_confirms_once() {
        let state = test_state();
        let session = state.sessions.create("http://x").unwrap();

        let form = || ConfirmForm {
            session_id: session.id.clone(),
            user_info: Some("Alice".into()),
        };

        let first = handle_confirm_submit(State(state.clone()), Form(form()))
            .await
            .into_response();
        assert_eq!(first.status(), StatusCode::OK);

        let second = handle_confirm_submit(State(state.clone()), Form(form()))
            .await
            .into_response();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);

        let stored = state.sessions.get(&session.id).unwrap();
        assert_eq!(stored.status, LoginStatus::Confirmed);
        assert_eq!(stored.user_info.as_deref(), Some("Alice"));
    }
}
