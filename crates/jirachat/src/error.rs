//! Error types for event handling and delivery.

use thiserror::Error;

/// Errors raised while posting a payload to a chat endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request failed (connect error, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while turning a JIRA event into a notification.
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound body was not a JIRA webhook payload
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// A field required to build the message is missing or malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The event did not match any known category
    #[error("Unknown event for issue {issue_key}")]
    UnknownEvent { issue_key: String },

    /// The notification could not be delivered
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Channel is missing required configuration
    #[error("Channel not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Short machine-readable name for this error, used in HTTP responses.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) | Self::Parse(_) => "parse_error",
            Self::UnknownEvent { .. } => "unknown_event",
            Self::Delivery(_) => "delivery_error",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}
