//! HTTP API for the analysis pipeline.
//!
//! One endpoint: `POST /api/` with a multipart file upload whose decoded
//! text is the analysis question. On success the final JSON array is
//! forwarded verbatim as the response body; any pipeline failure becomes a
//! `{"error": ...}` object with a non-200 status.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{error, info};

use crate::pipeline::AnalysisOrchestrator;

/// Shared state for request handlers.
pub struct AppState {
    /// The pipeline behind the endpoint.
    pub orchestrator: AnalysisOrchestrator,
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/", post(create_analysis))
        .with_state(state)
}

/// Runs the HTTP server until it is shut down.
pub async fn serve(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "tableqa API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn create_analysis(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let question = match read_question(&mut multipart).await {
        Ok(question) => question,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    info!(question_len = question.len(), "received analysis request");

    match state.orchestrator.answer(&question).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => {
            error!(error = %e, "analysis pipeline failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Reads the uploaded question file as UTF-8 text.
async fn read_question(multipart: &mut Multipart) -> Result<String, String> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| format!("invalid multipart upload: {e}"))?
        .ok_or_else(|| "request must include a question file".to_string())?;

    let bytes = field
        .bytes()
        .await
        .map_err(|e| format!("failed to read question file: {e}"))?;

    let question = String::from_utf8(bytes.to_vec())
        .map_err(|_| "question file must be valid UTF-8".to_string())?;

    if question.trim().is_empty() {
        return Err("question file is empty".to_string());
    }

    Ok(question)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
