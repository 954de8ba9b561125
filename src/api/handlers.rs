//! HTTP request handlers

use super::render::to_html;
use super::types::{ChatRequest, ChatResponse, ErrorResponse, SessionResponse, SuccessResponse};
use super::AppState;
use crate::error::ChatError;
use crate::runtime::TurnOutcome;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate, Utc};

const MAX_MESSAGE_CHARS: usize = 2000;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat
        .route("/api/chat", post(send_chat))
        // Sessions
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        .route("/api/sessions/:id/expire", post(expire_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Message is longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let outcome = state
        .runtime
        .handle_message(req.session_id.as_deref(), message, Utc::now(), today())
        .await;
    Ok(Json(chat_response(outcome)))
}

fn chat_response(outcome: TurnOutcome) -> ChatResponse {
    ChatResponse {
        response: to_html(&outcome.response),
        session_id: outcome.session_id,
        session_state: outcome.session_state,
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================
// Sessions
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.runtime.session(&id).await?;
    let slots = serde_json::to_value(&session.slots)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(SessionResponse {
        session_id: session.id,
        session_state: session.state.label(),
        slots,
        last_activity: session.last_activity.to_rfc3339(),
        created_at: session.created_at.to_rfc3339(),
    }))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    // Only existing sessions can be cancelled
    state.runtime.session(&id).await?;
    let outcome = state.runtime.cancel(&id, Utc::now(), today()).await;
    Ok(Json(chat_response(outcome)))
}

async fn expire_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.runtime.expire(&id).await? {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn get_version() -> &'static str {
    concat!("munim ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::SessionNotFound(id) => AppError::NotFound(format!("Session not found: {id}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Database;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config {
            db_path: PathBuf::from(":memory:"),
            port: 0,
            business_id: "test".to_string(),
            session_timeout_secs: 1800,
            gstin: None,
        };
        let db = Database::open_in_memory().unwrap();
        create_router(AppState::new(db, &config))
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_starts_session_and_renders_html() {
        let app = app();
        let response = send(
            &app,
            post_json("/api/chat", serde_json::json!({ "message": "help" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: ChatResponse = json(response).await;
        assert!(!body.session_id.is_empty());
        assert_eq!(body.session_state, "idle");
        assert!(body.response.contains("<strong>"));
    }

    #[tokio::test]
    async fn test_multi_turn_over_http() {
        let app = app();
        let first: ChatResponse = json(
            send(
                &app,
                post_json("/api/chat", serde_json::json!({ "message": "add expense" })),
            )
            .await,
        )
        .await;
        assert!(first.session_state.starts_with("awaiting_expense_field"));

        let session: SessionResponse = json(
            send(
                &app,
                Request::get(format!("/api/sessions/{}", first.session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await,
        )
        .await;
        assert_eq!(session.session_state, first.session_state);

        let cancelled: ChatResponse = json(
            send(
                &app,
                Request::post(format!("/api/sessions/{}/cancel", first.session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await,
        )
        .await;
        assert_eq!(cancelled.session_state, "idle");
        assert_eq!(cancelled.session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_wire_keys_are_camel_case() {
        let app = app();
        let first: serde_json::Value = json(
            send(
                &app,
                post_json(
                    "/api/chat",
                    serde_json::json!({ "message": "add expense", "sessionId": null }),
                ),
            )
            .await,
        )
        .await;
        let session_id = first["sessionId"].as_str().unwrap().to_string();
        assert!(first.get("session_id").is_none());
        assert_eq!(first["sessionState"], "awaiting_expense_field:amount");

        let second: serde_json::Value = json(
            send(
                &app,
                post_json(
                    "/api/chat",
                    serde_json::json!({ "message": "450", "sessionId": session_id }),
                ),
            )
            .await,
        )
        .await;
        assert_eq!(second["sessionId"], session_id.as_str());
        assert_eq!(second["sessionState"], "awaiting_expense_field:category");

        let session: serde_json::Value = json(
            send(
                &app,
                Request::get(format!("/api/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await,
        )
        .await;
        assert_eq!(session["sessionState"], "awaiting_expense_field:category");
        assert!(session["lastActivity"].is_string());
    }

    #[tokio::test]
    async fn test_snake_case_session_id_still_accepted() {
        let app = app();
        let first: ChatResponse = json(
            send(
                &app,
                post_json("/api/chat", serde_json::json!({ "message": "add expense" })),
            )
            .await,
        )
        .await;

        let second: ChatResponse = json(
            send(
                &app,
                post_json(
                    "/api/chat",
                    serde_json::json!({ "message": "450", "session_id": first.session_id }),
                ),
            )
            .await,
        )
        .await;
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.session_state, "awaiting_expense_field:category");
    }

    #[tokio::test]
    async fn test_user_html_is_not_rendered() {
        let app = app();
        let body: ChatResponse = json(
            send(
                &app,
                post_json(
                    "/api/chat",
                    serde_json::json!({ "message": "<script>alert(1)</script>" }),
                ),
            )
            .await,
        )
        .await;
        assert!(!body.response.contains("<script>"));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let app = app();
        let response = send(
            &app,
            post_json("/api/chat", serde_json::json!({ "message": "   " })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorResponse = json(response).await;
        assert!(body.error.contains("empty"));
    }

    #[tokio::test]
    async fn test_long_message_rejected() {
        let app = app();
        let message = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let response = send(
            &app,
            post_json("/api/chat", serde_json::json!({ "message": message })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let app = app();
        for request in [
            Request::get("/api/sessions/nope").body(Body::empty()).unwrap(),
            Request::post("/api/sessions/nope/cancel")
                .body(Body::empty())
                .unwrap(),
            Request::post("/api/sessions/nope/expire")
                .body(Body::empty())
                .unwrap(),
        ] {
            let response = send(&app, request).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_expire_removes_session() {
        let app = app();
        let first: ChatResponse = json(
            send(
                &app,
                post_json("/api/chat", serde_json::json!({ "message": "hi" })),
            )
            .await,
        )
        .await;

        let expire = Request::post(format!("/api/sessions/{}/expire", first.session_id))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, expire).await.status(), StatusCode::OK);

        let lookup = Request::get(format!("/api/sessions/{}", first.session_id))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, lookup).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_version() {
        let app = app();
        let response = send(&app, Request::get("/version").body(Body::empty()).unwrap()).await;
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("munim "));
    }
}
