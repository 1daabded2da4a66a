//! HTTP server for JIRA webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::JiraEvent;
use crate::Dispatcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Read-only channel set built at startup.
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the HTTP router for the service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/jira", post(jira_webhook_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// HTTP status used to report a failed event.
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidPayload(_) | Error::Parse(_) => StatusCode::BAD_REQUEST,
        Error::UnknownEvent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Delivery(_) => StatusCode::BAD_GATEWAY,
        Error::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &Error) -> (StatusCode, Json<Value>) {
    (
        status_for(err),
        Json(json!({
            "status": "error",
            "kind": err.kind(),
            "error": err.to_string(),
        })),
    )
}

/// Handle an incoming JIRA webhook.
///
/// The event is parsed, routed and forwarded to every enabled channel before
/// the response is written. The first channel failure decides the status.
pub async fn jira_webhook_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event = match JiraEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Rejected malformed JIRA webhook");
            return error_response(&Error::InvalidPayload(e));
        }
    };

    info!(
        issue_key = %event.issue.key,
        webhook_event = %event.webhook_event,
        "Received JIRA webhook"
    );

    if !state.dispatcher.has_channels() {
        debug!("No chat channels enabled, ignoring webhook");
        return (
            StatusCode::OK,
            Json(json!({
                "status": "ignored",
                "reason": "no_channels"
            })),
        );
    }

    let results = state.dispatcher.dispatch(&event).await;

    let mut delivered = vec![];
    for (channel, result) in &results {
        match result {
            Ok(category) => delivered.push(json!({
                "channel": channel,
                "category": category,
            })),
            Err(e) => return error_response(e),
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "delivered",
            "issue": event.issue.key,
            "channels": delivered,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::Parse("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::UnknownEvent {
                issue_key: "P-1".to_string()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::Delivery(DeliveryError::Status {
                status: 500,
                body: String::new()
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_body() {
        let err = Error::Parse("Invalid timespent field x".to_string());
        let (status, Json(body)) = error_response(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "parse_error");
    }
}
