//! Static configuration for the chat channels.
//!
//! Values are read once at startup (see the `jirachat` binary) and shared
//! read-only with every request handler.

use std::time::Duration;

use crate::error::Error;

/// Default Slack Web API endpoint for token-authenticated posting.
pub const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Default HipChat REST API v2 base.
pub const HIPCHAT_API_URL: &str = "https://api.hipchat.com/v2";

/// Bot name used when none is configured.
pub const DEFAULT_BOT_NAME: &str = "jirachat";

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default timeout applied to every outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the service needs, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Timeout applied to every outbound POST.
    pub request_timeout: Duration,
    /// Slack destination; ignored unless [`SlackConfig::enabled`].
    pub slack: SlackConfig,
    /// HipChat destination, when configured.
    pub hipchat: Option<HipChatConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            slack: SlackConfig::default(),
            hipchat: None,
        }
    }
}

/// Slack channel configuration.
#[derive(Debug, Clone, Default)]
pub struct SlackConfig {
    /// Channel override sent with each message (empty = webhook default).
    pub channel: String,
    /// Bot name shown as the message author.
    pub bot_name: String,
    /// Incoming webhook URL for notifications.
    pub webhook_url: Option<String>,
    /// Incoming webhook URL for error notices and unknown-event dumps.
    pub error_url: Option<String>,
    /// JIRA cloud domain, e.g. `example` for `example.atlassian.net`.
    pub domain: String,
    /// Web API token; when set, messages go through `chat.postMessage`.
    pub api_token: Option<String>,
    /// Web API endpoint used together with `api_token`.
    pub api_url: String,
}

impl SlackConfig {
    /// Build a webhook-based Slack configuration.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            channel: String::new(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            webhook_url: Some(webhook_url.into()),
            error_url: None,
            domain: domain.into(),
            api_token: None,
            api_url: SLACK_API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    #[must_use]
    pub fn with_bot_name(mut self, bot_name: impl Into<String>) -> Self {
        self.bot_name = bot_name.into();
        self
    }

    #[must_use]
    pub fn with_error_url(mut self, error_url: impl Into<String>) -> Self {
        self.error_url = Some(error_url.into());
        self
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Whether there is anywhere to post notifications to.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.webhook_url.is_some() || self.api_token.is_some()
    }

    /// Destination URL for notifications.
    ///
    /// The Web API takes precedence over the incoming webhook when a token
    /// is configured.
    pub fn destination(&self) -> Result<&str, Error> {
        if self.api_token.is_some() {
            return Ok(&self.api_url);
        }
        self.webhook_url
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("SLACK_WEBHOOK_URL".to_string()))
    }
}

/// HipChat room notification configuration.
#[derive(Debug, Clone, Default)]
pub struct HipChatConfig {
    /// Room notification token.
    pub token: String,
    /// Room id or name receiving notifications.
    pub room: String,
    /// Room receiving unknown-event dumps and delivery errors.
    pub error_room: Option<String>,
    /// REST API base, without trailing slash.
    pub base_url: String,
    /// JIRA cloud domain used for links.
    pub domain: String,
}

impl HipChatConfig {
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        room: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            room: room.into(),
            error_room: None,
            base_url: HIPCHAT_API_URL.to_string(),
            domain: domain.into(),
        }
    }

    #[must_use]
    pub fn with_error_room(mut self, room: impl Into<String>) -> Self {
        self.error_room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reject configurations that cannot authenticate.
    pub fn validate(&self) -> Result<(), Error> {
        if self.token.trim().is_empty() {
            return Err(Error::NotConfigured("HIPCHAT_TOKEN".to_string()));
        }
        if self.room.trim().is_empty() {
            return Err(Error::NotConfigured("HIPCHAT_ROOM".to_string()));
        }
        Ok(())
    }

    /// Notification endpoint for a room.
    #[must_use]
    pub fn notification_url(&self, room: &str) -> String {
        format!(
            "{}/room/{room}/notification",
            self.base_url.trim_end_matches('/')
        )
    }
}
