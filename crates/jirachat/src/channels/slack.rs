//! Slack notification channel.
//!
//! Messages use the legacy attachment layout: the message `text` stays empty
//! and the title and detail fields live in a single attachment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{or_unassigned, total_work, ChatChannel};
use crate::classify::{
    route, routed_change, EventCategory, FIELD_ASSIGNEE, FIELD_STATUS,
};
use crate::config::SlackConfig;
use crate::delivery::{Deliverer, Endpoint};
use crate::diagnostic::Diagnostic;
use crate::error::Error;
use crate::events::JiraEvent;

/// Title of the error-notice attachment.
const ERROR_NOTICE_TITLE: &str = "Error occurred on jirachat-slack";

/// Icon used for error notices.
const ERROR_NOTICE_EMOJI: &str = ":persevere:";

/// Color used for error notices.
const ERROR_NOTICE_COLOR: &str = "#FF0000";

/// Slack notification channel.
pub struct SlackChannel {
    config: SlackConfig,
    deliverer: Deliverer,
}

impl SlackChannel {
    #[must_use]
    pub fn new(config: SlackConfig, deliverer: Deliverer) -> Self {
        Self { config, deliverer }
    }

    fn error_endpoint(&self) -> Option<Endpoint> {
        self.config.error_url.as_ref().map(Endpoint::new)
    }

    /// Dump an event Slack cannot render to the error channel.
    async fn report_unknown(&self, event: &JiraEvent) {
        let Some(endpoint) = self.error_endpoint() else {
            debug!(channel = "slack", "No error channel configured, dropping unknown event");
            return;
        };
        let dump = Diagnostic::new().with("Erroring Event", event);
        let notice = error_notice(&dump.to_string(), &self.config);
        self.deliverer.report(&notice, &endpoint).await;
    }
}

#[async_trait]
impl ChatChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        self.config.enabled()
    }

    async fn send(&self, event: &JiraEvent) -> Result<EventCategory, Error> {
        let category = route(event);
        let destination = self.config.destination()?;

        let message = match build_message(category, event, &self.config) {
            Ok(message) => message,
            Err(err @ Error::UnknownEvent { .. }) => {
                warn!(
                    channel = "slack",
                    issue_key = %event.issue.key,
                    webhook_event = %event.webhook_event,
                    "Unrecognized JIRA event"
                );
                self.report_unknown(event).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        debug!(
            channel = "slack",
            issue_key = %event.issue.key,
            category = %category,
            "Sending notification"
        );

        let endpoint =
            Endpoint::new(destination).with_bearer(self.config.api_token.clone());
        let error_endpoint = self.error_endpoint();
        self.deliverer
            .deliver_or_report(&message, &endpoint, error_endpoint.as_ref(), |detail| {
                error_notice(&detail, &self.config)
            })
            .await?;

        info!(
            channel = "slack",
            issue_key = %event.issue.key,
            category = %category,
            "Notification sent"
        );
        Ok(category)
    }
}

/// Build the Slack message for an already-routed event.
pub fn build_message(
    category: EventCategory,
    event: &JiraEvent,
    config: &SlackConfig,
) -> Result<SlackMessage, Error> {
    match category {
        EventCategory::IssueCreated => Ok(issue_created(event, config)),
        EventCategory::IssueDeleted => Ok(issue_deleted(event, config)),
        EventCategory::Comment => Ok(comment(event, config)),
        EventCategory::StatusChanged => Ok(status_changed(event, config)),
        EventCategory::AssigneeChanged => Ok(assignee_changed(event, config)),
        EventCategory::WorklogUpdated => worklog_updated(event, config),
        EventCategory::Unrecognized => Err(Error::UnknownEvent {
            issue_key: event.issue.key.clone(),
        }),
    }
}

#[must_use]
pub fn issue_created(event: &JiraEvent, config: &SlackConfig) -> SlackMessage {
    let title = format!(
        "{} created {}",
        event.user_link(&config.domain),
        event.issue_link(&config.domain)
    );
    let fields = vec![
        SlackField::long("Summary", &event.issue.fields.summary),
        SlackField::short("Assignee", event.issue.assignee_name()),
        SlackField::short("Priority", &event.issue.fields.priority.name),
    ];
    SlackMessage::for_event(event, config, title, event.priority_color(), fields)
}

/// Deleted issues are referenced by bare key since the link would be dead.
#[must_use]
pub fn issue_deleted(event: &JiraEvent, config: &SlackConfig) -> SlackMessage {
    let title = format!(
        "{} deleted {}",
        event.user_link(&config.domain),
        event.issue.key
    );
    let fields = vec![
        SlackField::long("Issue", &event.issue.fields.summary),
        SlackField::long("Last Comment", event.issue.last_comment().unwrap_or("None")),
    ];
    SlackMessage::for_event(event, config, title, "", fields)
}

#[must_use]
pub fn comment(event: &JiraEvent, config: &SlackConfig) -> SlackMessage {
    let title = format!(
        "{} commented on {}",
        event.user_link(&config.domain),
        event.issue_link(&config.domain)
    );
    let fields = vec![
        SlackField::long("Issue", &event.issue.fields.summary),
        SlackField::long("Comment", &event.comment.body),
    ];
    SlackMessage::for_event(event, config, title, event.priority_color(), fields)
}

#[must_use]
pub fn status_changed(event: &JiraEvent, config: &SlackConfig) -> SlackMessage {
    let title = format!(
        "{} changed status of {}",
        event.user_link(&config.domain),
        event.issue_link(&config.domain)
    );
    let change = routed_change(event, FIELD_STATUS).cloned().unwrap_or_default();
    let fields = vec![
        SlackField::long("From", &change.from_string),
        SlackField::long("To", &change.to_string),
    ];
    SlackMessage::for_event(event, config, title, event.priority_color(), fields)
}

#[must_use]
pub fn assignee_changed(event: &JiraEvent, config: &SlackConfig) -> SlackMessage {
    let title = format!(
        "{} changed assignee of {}",
        event.user_link(&config.domain),
        event.issue_link(&config.domain)
    );
    let change = routed_change(event, FIELD_ASSIGNEE).cloned().unwrap_or_default();
    let fields = vec![
        SlackField::long("From", or_unassigned(&change.from_string)),
        SlackField::long("To", or_unassigned(&change.to_string)),
    ];
    SlackMessage::for_event(event, config, title, event.priority_color(), fields)
}

pub fn worklog_updated(event: &JiraEvent, config: &SlackConfig) -> Result<SlackMessage, Error> {
    let total = total_work(event)?;
    let title = format!(
        "{} updated work log {}",
        event.user_link(&config.domain),
        event.issue_link(&config.domain)
    );
    let fields = vec![SlackField::long("Total Work", &total)];
    Ok(SlackMessage::for_event(
        event,
        config,
        title,
        event.priority_color(),
        fields,
    ))
}

/// Notice posted to the error channel when something goes wrong.
#[must_use]
pub fn error_notice(detail: &str, config: &SlackConfig) -> SlackMessage {
    SlackMessage {
        channel: String::new(),
        username: config.bot_name.clone(),
        text: String::new(),
        icon_emoji: ERROR_NOTICE_EMOJI.to_string(),
        icon_url: String::new(),
        unfurl_links: true,
        attachments: vec![SlackAttachment {
            fallback: ERROR_NOTICE_TITLE.to_string(),
            text: String::new(),
            pretext: ERROR_NOTICE_TITLE.to_string(),
            color: ERROR_NOTICE_COLOR.to_string(),
            fields: vec![SlackField::long("Detail", detail)],
        }],
    }
}

// =============================================================================
// Slack API types
// =============================================================================

/// Incoming-webhook / `chat.postMessage` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_emoji: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    #[serde(default)]
    pub unfurl_links: bool,
    #[serde(default)]
    pub attachments: Vec<SlackAttachment>,
}

impl SlackMessage {
    fn for_event(
        event: &JiraEvent,
        config: &SlackConfig,
        title: String,
        color: &str,
        fields: Vec<SlackField>,
    ) -> Self {
        Self {
            channel: config.channel.clone(),
            username: config.bot_name.clone(),
            text: String::new(),
            icon_emoji: String::new(),
            icon_url: event.user.large_avatar().to_string(),
            unfurl_links: true,
            attachments: vec![SlackAttachment {
                fallback: title.clone(),
                text: String::new(),
                pretext: title,
                color: color.to_string(),
                fields,
            }],
        }
    }

    /// Title of the first attachment.
    #[must_use]
    pub fn title(&self) -> &str {
        self.attachments.first().map_or("", |a| a.pretext.as_str())
    }

    /// Value of the first field with the given title.
    #[must_use]
    pub fn field(&self, title: &str) -> Option<&str> {
        self.attachments
            .iter()
            .flat_map(|a| a.fields.iter())
            .find(|f| f.title == title)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackAttachment {
    /// Plain-text summary for clients that do not render attachments.
    pub fallback: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pretext: String,
    /// `good`, `warning`, `danger` or a hex color.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default)]
    pub fields: Vec<SlackField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackField {
    pub title: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

impl SlackField {
    fn long(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: false,
        }
    }

    fn short(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: true,
        }
    }
}
