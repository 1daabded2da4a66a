//! JIRA webhook to chat notification bridge.
//!
//! This crate receives JIRA issue webhooks, works out what happened
//! (issue created or deleted, comment added, status or assignee changed,
//! work logged) and posts a formatted notification to Slack and/or HipChat.
//!
//! # Usage
//!
//! ```no_run
//! use jirachat::{Config, Dispatcher, JiraEvent, SlackConfig};
//!
//! # async fn run(body: &[u8]) -> Result<(), jirachat::Error> {
//! let config = Config {
//!     slack: SlackConfig::new("https://hooks.slack.com/services/T/B/X", "example")
//!         .with_channel("#jira")
//!         .with_error_url("https://hooks.slack.com/services/T/B/ERR"),
//!     ..Config::default()
//! };
//! let dispatcher = Dispatcher::from_config(&config)?;
//!
//! let event = JiraEvent::from_slice(body).map_err(jirachat::Error::InvalidPayload)?;
//! for (channel, result) in dispatcher.dispatch(&event).await {
//!     println!("{channel}: {result:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`events`] models the inbound JIRA payload
//! - [`classify`] maps an event onto an [`EventCategory`]
//! - [`channels`] builds and sends platform-specific messages through the
//!   [`ChatChannel`] trait
//! - [`delivery`] posts JSON and falls back to an error notice on failure
//! - [`server`] exposes the webhook endpoint over HTTP

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod channels;
pub mod classify;
pub mod config;
pub mod delivery;
pub mod diagnostic;
pub mod error;
pub mod events;
pub mod server;

pub use channels::hipchat::HipChatChannel;
pub use channels::slack::SlackChannel;
pub use channels::ChatChannel;
pub use classify::{classify, route, EventCategory};
pub use config::{Config, HipChatConfig, SlackConfig};
pub use delivery::{Deliverer, HttpTransport, Transport};
pub use error::{DeliveryError, Error};
pub use events::JiraEvent;

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fans JIRA events out to every enabled chat channel.
pub struct Dispatcher {
    channels: Vec<Arc<dyn ChatChannel>>,
}

impl Dispatcher {
    /// Build the channels described by `config`.
    ///
    /// Slack is enabled when a webhook URL or API token is set; HipChat when
    /// its section is present, in which case a missing token is an error.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.request_timeout)?);
        let deliverer = Deliverer::new(transport);

        let mut channels: Vec<Arc<dyn ChatChannel>> = vec![];

        if config.slack.enabled() {
            info!("Slack notifications enabled");
            channels.push(Arc::new(SlackChannel::new(
                config.slack.clone(),
                deliverer.clone(),
            )));
        }

        if let Some(hipchat) = &config.hipchat {
            info!(room = %hipchat.room, "HipChat notifications enabled");
            channels.push(Arc::new(HipChatChannel::new(hipchat.clone(), deliverer)?));
        }

        if channels.is_empty() {
            warn!("No chat channels configured");
        } else {
            info!(channel_count = channels.len(), "Dispatcher initialized");
        }

        Ok(Self { channels })
    }

    /// Create a dispatcher with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn ChatChannel>>) -> Self {
        Self { channels }
    }

    /// Check if any chat channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        self.channels.iter().any(|c| c.enabled())
    }

    /// Get the number of configured channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send one event to every enabled channel, in order, and collect results.
    pub async fn dispatch(&self, event: &JiraEvent) -> Vec<(String, Result<EventCategory, Error>)> {
        let mut results = vec![];

        for channel in &self.channels {
            let channel_name = channel.name();

            if !channel.enabled() {
                debug!(channel = channel_name, "Channel disabled, skipping");
                continue;
            }

            let result = channel.send(event).await;
            if let Err(e) = &result {
                warn!(
                    channel = channel_name,
                    issue_key = %event.issue.key,
                    error = %e,
                    "Failed to forward JIRA event"
                );
            }
            results.push((channel_name.to_string(), result));
        }

        results
    }
}
