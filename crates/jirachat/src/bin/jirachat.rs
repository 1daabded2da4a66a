//! jirachat service binary.
//!
//! Standalone HTTP service that forwards JIRA webhooks to Slack and HipChat.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jirachat::config::{
    Config, HipChatConfig, SlackConfig, DEFAULT_BOT_NAME, DEFAULT_PORT, HIPCHAT_API_URL,
    SLACK_API_URL,
};
use jirachat::server::{self, AppState};
use jirachat::Dispatcher;

/// Forward JIRA webhook events to chat.
#[derive(Parser, Debug)]
#[command(name = "jirachat")]
#[command(about = "Forward JIRA webhook events to Slack and HipChat")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "JIRACHAT_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Timeout for outbound requests, in seconds.
    #[arg(long, env = "JIRACHAT_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,

    /// JIRA cloud domain (the `example` in `example.atlassian.net`).
    #[arg(long, env = "JIRA_DOMAIN")]
    jira_domain: String,

    /// Slack incoming webhook URL.
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<String>,

    /// Slack incoming webhook URL for error reports.
    #[arg(long, env = "SLACK_ERROR_URL")]
    slack_error_url: Option<String>,

    /// Slack channel to post to (defaults to the webhook's channel).
    #[arg(long, env = "SLACK_CHANNEL", default_value = "")]
    slack_channel: String,

    /// Bot name shown on Slack messages.
    #[arg(long, env = "SLACK_BOT_NAME", default_value = DEFAULT_BOT_NAME)]
    slack_bot_name: String,

    /// Slack Web API token; switches posting to `chat.postMessage`.
    #[arg(long, env = "SLACK_API_TOKEN", hide_env_values = true)]
    slack_api_token: Option<String>,

    /// HipChat room notification token.
    #[arg(long, env = "HIPCHAT_TOKEN", hide_env_values = true)]
    hipchat_token: Option<String>,

    /// HipChat room receiving notifications.
    #[arg(long, env = "HIPCHAT_ROOM")]
    hipchat_room: Option<String>,

    /// HipChat room receiving error reports.
    #[arg(long, env = "HIPCHAT_ERROR_ROOM")]
    hipchat_error_room: Option<String>,

    /// HipChat API base URL.
    #[arg(long, env = "HIPCHAT_BASE_URL", default_value = HIPCHAT_API_URL)]
    hipchat_base_url: String,
}

impl Cli {
    fn into_config(self) -> Config {
        let slack = SlackConfig {
            channel: self.slack_channel,
            bot_name: self.slack_bot_name,
            webhook_url: self.slack_webhook_url,
            error_url: self.slack_error_url,
            domain: self.jira_domain.clone(),
            api_token: self.slack_api_token,
            api_url: SLACK_API_URL.to_string(),
        };

        let hipchat = match (self.hipchat_token, self.hipchat_room) {
            (None, None) => None,
            (token, room) => Some(HipChatConfig {
                token: token.unwrap_or_default(),
                room: room.unwrap_or_default(),
                error_room: self.hipchat_error_room,
                base_url: self.hipchat_base_url,
                domain: self.jira_domain,
            }),
        };

        Config {
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            slack,
            hipchat,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("jirachat=info".parse()?))
        .init();

    info!("Starting jirachat service...");

    let config = Cli::parse().into_config();

    let dispatcher = Dispatcher::from_config(&config).context("Invalid chat configuration")?;
    if !dispatcher.has_channels() {
        warn!("Neither SLACK_WEBHOOK_URL nor HIPCHAT_TOKEN set. Webhooks will be ignored.");
    }

    let app = server::build_router(AppState {
        dispatcher: Arc::new(dispatcher),
    });

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = config.port, "jirachat listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
