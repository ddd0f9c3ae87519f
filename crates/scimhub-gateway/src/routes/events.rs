//! Event publication endpoint.

use axum::{extract::State, http::StatusCode, routing::post, Router};

use crate::error::AppError;
use crate::AppState;

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/Events", post(publish_event))
}

/// Ingest a raw event document.
///
/// The body is parsed by the core so that document errors map to 400 with
/// the core's message rather than an extractor rejection.
async fn publish_event(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, AppError> {
    state.execute(move |router| router.ingest_json(&body)).await?;
    Ok(StatusCode::NO_CONTENT)
}
