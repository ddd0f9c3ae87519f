//! Subscription management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use scimhub_core::SubscriptionMode;
use uuid::Uuid;

use crate::error::AppError;
use crate::json::{CreateSubscriptionRequest, SubscriberJson, SubscriptionCreated, UnsubscribeQuery};
use crate::AppState;

/// Subscription routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/Subscriptions", post(create_subscription))
        .route(
            "/Subscriptions/:id",
            get(get_subscriber).delete(delete_subscriber),
        )
}

/// Register a new subscriber with one subscription.
///
/// Malformed bodies are reported as `AppError::BadRequest`.
async fn create_subscription(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let request: CreateSubscriptionRequest = serde_json::from_str(&body)?;
    let mode = SubscriptionMode::from_urn(&request.mode)?;
    let target = match (mode, request.event_uri) {
        (_, Some(event_uri)) => event_uri,
        (SubscriptionMode::Pull, None) => request.feed_uri.clone(),
        (SubscriptionMode::Push, None) => {
            return Err(AppError::BadRequest(
                "eventUri is required for web callback subscriptions".to_string(),
            ))
        }
    };
    let feed_uri = request.feed_uri;

    let id = state
        .execute(move |router| {
            let id = loop {
                let candidate = Uuid::new_v4().to_string();
                if router.subscriber(&candidate)?.is_none() {
                    break candidate;
                }
            };
            router.subscribe(&id, &feed_uri, mode, &target)?;
            Ok(id)
        })
        .await?;

    let location = state.config.subscription_location(&id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location.clone())],
        Json(SubscriptionCreated { id, location }),
    ))
}

/// Return a subscriber and its subscriptions.
async fn get_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubscriberJson>, AppError> {
    let lookup = id.clone();
    let subscriber = state
        .execute(move |router| router.subscriber(&lookup))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("subscriber {} does not exist", id)))?;

    Ok(Json(subscriber.into()))
}

/// Remove a subscriber, or only its subscriptions to `feedUri`.
async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<StatusCode, AppError> {
    let target = id.clone();
    let removed = state
        .execute(move |router| match query.feed_uri {
            Some(feed_uri) => router.unsubscribe(&target, &feed_uri),
            None => router.unsubscribe_all(&target),
        })
        .await?;

    if removed {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::NotFound(format!(
            "subscriber {} has no matching subscription",
            id
        )))
    }
}
