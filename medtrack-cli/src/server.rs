//! HTTP surface: task status queries and completion logging.
//!
//! Completion history lives in memory for the life of the process.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono_tz::Tz;
use medtrack_core::{CompletionEntry, EngineError, Instant, TaskBoard, TaskReport};
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::render;

/// Shared application state.
pub struct AppState {
    /// Readers evaluate under the read lock; appends take the write lock.
    pub board: RwLock<TaskBoard>,
    pub tz: Tz,
}

pub type SharedState = Arc<AppState>;

/// Start the HTTP server.
pub async fn serve(config: Config, board: TaskBoard) -> anyhow::Result<()> {
    let tz = config.display.tz()?;
    let state = Arc::new(AppState {
        board: RwLock::new(board),
        tz,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/entries", get(list_entries).post(add_entry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::UnknownTask(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Malformed bodies (bad JSON, unparseable timestamps) are client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewEntry {
    pub author: String,
    #[serde(default)]
    pub notes: String,
    /// Defaults to the time the request is handled.
    #[serde(default)]
    pub timestamp: Option<Instant>,
}

async fn index(State(state): State<SharedState>) -> String {
    let board = state.board.read().await;
    render::status_lines(&board.reports(Instant::now()), state.tz)
}

async fn list_tasks(State(state): State<SharedState>) -> Json<Vec<TaskReport>> {
    let board = state.board.read().await;
    Json(board.reports(Instant::now()))
}

async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TaskReport>, ApiError> {
    let board = state.board.read().await;
    Ok(Json(board.report(&id, Instant::now())?))
}

async fn list_entries(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CompletionEntry>>, ApiError> {
    let board = state.board.read().await;
    let task = board
        .get(&id)
        .ok_or_else(|| EngineError::UnknownTask(id.as_str().into()))?;
    Ok(Json(task.entries().to_vec()))
}

async fn add_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<NewEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskReport>), ApiError> {
    let Json(body) = body?;
    if body.author.trim().is_empty() {
        return Err(ApiError::bad_request("author must be non-empty"));
    }

    let now = Instant::now();
    let timestamp = body.timestamp.unwrap_or(now);

    let mut board = state.board.write().await;
    let entry = board.record(&id, body.author, timestamp, body.notes)?;
    tracing::info!(
        task = %id,
        author = entry.author(),
        at = %entry.timestamp(),
        "Recorded completion"
    );

    Ok((StatusCode::CREATED, Json(board.report(&id, now)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtrack_core::{Duration, Policy, Task, TaskStatus};

    fn test_state() -> SharedState {
        let board = TaskBoard::new([
            Task::new("pill", "Pill", Policy::every(Duration::from_hours(8))).unwrap(),
            Task::new("walk", "Walk", Policy::every(Duration::from_hours(4)))
                .unwrap()
                .optional(),
        ])
        .unwrap();
        Arc::new(AppState {
            board: RwLock::new(board),
            tz: Tz::UTC,
        })
    }

    fn entry(author: &str) -> Result<Json<NewEntry>, JsonRejection> {
        Ok(Json(NewEntry {
            author: author.to_string(),
            notes: "with water".to_string(),
            timestamp: None,
        }))
    }

    /// Send one HTTP/1.1 request to a live router and return the status code.
    async fn send(state: SharedState, request: String) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap()
    }

    fn post_entry(id: &str, body: &str) -> String {
        format!(
            "POST /api/tasks/{id}/entries HTTP/1.1\r\n\
             Host: localhost\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn posting_completion_moves_task_to_waiting() {
        let state = test_state();

        let Json(before) = get_task(State(state.clone()), Path("pill".to_string()))
            .await
            .unwrap();
        assert_eq!(before.status, TaskStatus::Needed);

        let (code, Json(after)) =
            add_entry(State(state.clone()), Path("pill".to_string()), entry("sam"))
                .await
                .unwrap();
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(after.status, TaskStatus::Waiting);
        assert_eq!(after.completions, 1);

        let Json(entries) = list_entries(State(state), Path("pill".to_string()))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].author(), "sam");
        assert_eq!(entries[0].notes(), "with water");
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let state = test_state();
        let err = get_task(State(state.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = add_entry(State(state), Path("nope".to_string()), entry("sam"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_author_is_rejected() {
        let err = add_entry(State(test_state()), Path("pill".to_string()), entry("  "))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_and_index_cover_every_task() {
        let state = test_state();
        let Json(reports) = list_tasks(State(state.clone())).await;
        assert_eq!(reports.len(), 2);

        let text = index(State(state)).await;
        assert!(text.contains("NEEDED"));
        assert!(text.contains("READY"));
    }

    #[tokio::test]
    async fn never_timestamp_is_rejected_and_not_recorded() {
        let state = test_state();

        let code = send(
            state.clone(),
            post_entry("pill", r#"{"author":"sam","timestamp":"never"}"#),
        )
        .await;
        assert_eq!(code, 400);

        let err = add_entry(
            State(state.clone()),
            Path("pill".to_string()),
            Ok(Json(NewEntry {
                author: "sam".to_string(),
                notes: String::new(),
                timestamp: Some(Instant::NEVER),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let board = state.board.read().await;
        assert!(board.get("pill").unwrap().entries().is_empty());
        assert_eq!(board.status("pill", Instant::now()).unwrap(), TaskStatus::Needed);
    }

    #[tokio::test]
    async fn valid_post_over_http_is_created() {
        let code = send(
            test_state(),
            post_entry("pill", r#"{"author":"sam","timestamp":"2026-02-20T08:00:00Z"}"#),
        )
        .await;
        assert_eq!(code, 201);
    }

    #[test]
    fn new_entry_accepts_explicit_timestamp() {
        let body: NewEntry = serde_json::from_str(
            r#"{"author":"sam","timestamp":"2026-02-20T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            body.timestamp,
            Some(Instant::from_components(2026, 2, 20, 8, 0, 0).unwrap())
        );
        assert_eq!(body.notes, "");
    }
}
