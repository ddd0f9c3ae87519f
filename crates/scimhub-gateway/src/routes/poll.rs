//! Poll endpoint.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::error::AppError;
use crate::AppState;

/// Poll routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/Poll/:id", get(poll))
}

/// Return the unread events of every pull subscription of a subscriber.
async fn poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let events = state
        .execute(move |router| router.poll_subscriber(&id))
        .await?;
    Ok(Json(events.iter().map(|event| event.to_json()).collect()))
}
