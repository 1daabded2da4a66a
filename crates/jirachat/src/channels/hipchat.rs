//! HipChat room notification channel.
//!
//! HipChat has no attachment fields, so the title and detail lines are
//! rendered into a single HTML message body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, info, warn};

use super::{or_unassigned, total_work, ChatChannel};
use crate::classify::{
    route, routed_change, EventCategory, FIELD_ASSIGNEE, FIELD_STATUS,
};
use crate::config::HipChatConfig;
use crate::delivery::{Deliverer, Endpoint};
use crate::diagnostic::Diagnostic;
use crate::error::Error;
use crate::events::JiraEvent;

/// Background color of a HipChat notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HipChatColor {
    #[default]
    Yellow,
    Green,
    Red,
    Purple,
    Gray,
    Random,
}

impl HipChatColor {
    /// Color for a JIRA priority id.
    #[must_use]
    pub fn for_priority(id: &str) -> Self {
        match id {
            "1" | "2" | "3" => Self::Red,
            "4" | "5" | "6" => Self::Green,
            "10000" => Self::Gray,
            _ => Self::Yellow,
        }
    }
}

/// How HipChat renders the message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Html,
    Text,
}

/// Room notification request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HipChatNotification {
    pub color: HipChatColor,
    pub message: String,
    #[serde(default)]
    pub notify: bool,
    pub message_format: MessageFormat,
}

/// HipChat room notification channel.
pub struct HipChatChannel {
    config: HipChatConfig,
    deliverer: Deliverer,
}

impl HipChatChannel {
    /// Create a HipChat channel, rejecting configurations without a token.
    pub fn new(config: HipChatConfig, deliverer: Deliverer) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config, deliverer })
    }

    fn endpoint(&self, room: &str) -> Endpoint {
        Endpoint::new(self.config.notification_url(room))
            .with_bearer(Some(self.config.token.clone()))
    }

    fn error_endpoint(&self) -> Option<Endpoint> {
        self.config.error_room.as_deref().map(|room| self.endpoint(room))
    }
}

#[async_trait]
impl ChatChannel for HipChatChannel {
    fn name(&self) -> &'static str {
        "hipchat"
    }

    fn enabled(&self) -> bool {
        !self.config.token.is_empty() && !self.config.room.is_empty()
    }

    async fn send(&self, event: &JiraEvent) -> Result<EventCategory, Error> {
        let category = route(event);

        let notification = match build_notification(category, event, &self.config.domain) {
            Ok(notification) => notification,
            Err(err @ Error::UnknownEvent { .. }) => {
                warn!(
                    channel = "hipchat",
                    issue_key = %event.issue.key,
                    "Unrecognized JIRA event"
                );
                if let Some(endpoint) = self.error_endpoint() {
                    let dump = Diagnostic::new().with("Erroring Event", event);
                    self.deliverer
                        .report(&error_notice(&dump.to_string()), &endpoint)
                        .await;
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        debug!(
            channel = "hipchat",
            room = %self.config.room,
            issue_key = %event.issue.key,
            category = %category,
            "Sending notification"
        );

        let endpoint = self.endpoint(&self.config.room);
        let error_endpoint = self.error_endpoint();
        self.deliverer
            .deliver_or_report(&notification, &endpoint, error_endpoint.as_ref(), |detail| {
                error_notice(&detail)
            })
            .await?;

        info!(
            channel = "hipchat",
            issue_key = %event.issue.key,
            category = %category,
            "Notification sent"
        );
        Ok(category)
    }
}

/// Build the HipChat notification for an already-routed event.
pub fn build_notification(
    category: EventCategory,
    event: &JiraEvent,
    domain: &str,
) -> Result<HipChatNotification, Error> {
    let user = anchor(&event.user.profile_url(domain), &event.user.display_name);
    let issue = anchor(&event.issue.url(domain), &event.issue.key);
    let summary = event.issue.fields.summary.as_str();

    let (title, lines) = match category {
        EventCategory::IssueCreated => (
            format!("{user} created {issue}"),
            vec![
                ("Summary", summary),
                ("Assignee", event.issue.assignee_name()),
                ("Priority", event.issue.fields.priority.name.as_str()),
            ],
        ),
        EventCategory::IssueDeleted => (
            format!("{user} deleted {}", escape(&event.issue.key)),
            vec![
                ("Issue", summary),
                ("Last Comment", event.issue.last_comment().unwrap_or("None")),
            ],
        ),
        EventCategory::Comment => (
            format!("{user} commented on {issue}"),
            vec![("Issue", summary), ("Comment", event.comment.body.as_str())],
        ),
        EventCategory::StatusChanged => {
            let change = routed_change(event, FIELD_STATUS);
            (
                format!("{user} changed status of {issue}"),
                vec![
                    ("From", change.map_or("", |c| c.from_string.as_str())),
                    ("To", change.map_or("", |c| c.to_string.as_str())),
                ],
            )
        }
        EventCategory::AssigneeChanged => {
            let change = routed_change(event, FIELD_ASSIGNEE);
            (
                format!("{user} changed assignee of {issue}"),
                vec![
                    ("From", or_unassigned(change.map_or("", |c| c.from_string.as_str()))),
                    ("To", or_unassigned(change.map_or("", |c| c.to_string.as_str()))),
                ],
            )
        }
        EventCategory::WorklogUpdated => {
            let total = total_work(event)?;
            return Ok(render(
                format!("{user} updated work log {issue}"),
                &[("Total Work", total.as_str())],
                event,
            ));
        }
        EventCategory::Unrecognized => {
            return Err(Error::UnknownEvent {
                issue_key: event.issue.key.clone(),
            })
        }
    };

    Ok(render(title, &lines, event))
}

fn render(title: String, lines: &[(&str, &str)], event: &JiraEvent) -> HipChatNotification {
    let mut message = title;
    for (name, value) in lines {
        let _ = write!(message, "<br/><b>{name}:</b> {}", escape(value));
    }
    HipChatNotification {
        color: HipChatColor::for_priority(&event.issue.fields.priority.id),
        message,
        notify: true,
        message_format: MessageFormat::Html,
    }
}

/// Plain-text notice for the error room.
#[must_use]
pub fn error_notice(detail: &str) -> HipChatNotification {
    HipChatNotification {
        color: HipChatColor::Red,
        message: format!("Error occurred on jirachat-hipchat: {detail}"),
        notify: false,
        message_format: MessageFormat::Text,
    }
}

fn anchor(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(href), escape(text))
}

/// Minimal HTML escaping for user-supplied text.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{HttpTransport, Transport};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(value: serde_json::Value) -> JiraEvent {
        serde_json::from_value(value).unwrap()
    }

    fn deliverer() -> Deliverer {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(Duration::from_secs(2)).unwrap());
        Deliverer::new(transport)
    }

    #[test]
    fn test_priority_colors() {
        assert_eq!(HipChatColor::for_priority("1"), HipChatColor::Red);
        assert_eq!(HipChatColor::for_priority("6"), HipChatColor::Green);
        assert_eq!(HipChatColor::for_priority("10000"), HipChatColor::Gray);
        assert_eq!(HipChatColor::for_priority(""), HipChatColor::Yellow);
    }

    #[test]
    fn test_created_renders_html() {
        let event = event(json!({
            "webhookEvent": "jira:issue_created",
            "issue": { "key": "PROJ-1", "fields": {
                "summary": "Fix <script>",
                "priority": { "id": "2", "name": "Critical" }
            } },
            "user": { "name": "bob", "displayName": "Bob" }
        }));
        let n = build_notification(route(&event), &event, "acme").unwrap();

        let profile = "https://acme.atlassian.net/secure/ViewProfile.jspa?name=bob";
        let issue = "https://acme.atlassian.net/browse/PROJ-1";
        assert!(n.message.starts_with(&format!(
            r#"<a href="{profile}">Bob</a> created <a href="{issue}">PROJ-1</a>"#
        )));
        assert!(n.message.contains("<b>Summary:</b> Fix &lt;script&gt;"));
        assert!(n.message.contains("<b>Assignee:</b> unassigned"));
        assert_eq!(n.color, HipChatColor::Red);
        assert_eq!(n.message_format, MessageFormat::Html);
        assert!(n.notify);
    }

    #[test]
    fn test_deleted_has_no_issue_link() {
        let event = event(json!({
            "webhookEvent": "issue_deleted",
            "issue": { "key": "PROJ-9", "fields": { "summary": "Bug", "comment": { "total": 0 } } }
        }));
        let n = build_notification(route(&event), &event, "acme").unwrap();
        assert!(!n.message.contains("/browse/"));
        assert!(n.message.contains("deleted PROJ-9"));
        assert!(n.message.contains("<b>Last Comment:</b> None"));
    }

    #[test]
    fn test_worklog_and_unknown() {
        let worklog = event(json!({
            "issue": { "key": "P-1" },
            "changelog": { "items": [ { "field": "timespent", "toString": "60" } ] }
        }));
        let n = build_notification(route(&worklog), &worklog, "acme").unwrap();
        assert!(n.message.ends_with("<b>Total Work:</b> 1 minute"));

        let unknown = event(json!({ "issue": { "key": "P-2" } }));
        assert!(matches!(
            build_notification(route(&unknown), &unknown, "acme"),
            Err(Error::UnknownEvent { .. })
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(error_notice("boom")).unwrap();
        assert_eq!(value["color"], "red");
        assert_eq!(value["message_format"], "text");
        assert_eq!(value["notify"], false);
    }

    #[test]
    fn test_rejects_missing_token() {
        let config = HipChatConfig::new("", "ops", "acme");
        assert!(matches!(
            HipChatChannel::new(config, deliverer()),
            Err(Error::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_send_posts_room_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/room/ops/notification"))
            .and(header("authorization", "Bearer room-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let config = HipChatConfig::new("room-token", "ops", "acme")
            .with_base_url(format!("{}/v2", server.uri()));
        let channel = HipChatChannel::new(config, deliverer()).unwrap();
        let event = event(json!({
            "issue": { "key": "P-3" },
            "comment": { "id": "77", "body": "hi" }
        }));

        assert_eq!(channel.send(&event).await.unwrap(), EventCategory::Comment);
    }

    #[tokio::test]
    async fn test_unknown_event_dumped_to_error_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/room/ops-errors/notification"))
            .and(header("authorization", "Bearer room-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let config = HipChatConfig::new("room-token", "ops", "acme")
            .with_error_room("ops-errors")
            .with_base_url(format!("{}/v2", server.uri()));
        let channel = HipChatChannel::new(config, deliverer()).unwrap();
        let event = event(json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "P-4" },
            "changelog": { "items": [ { "field": "labels", "toString": "x" } ] }
        }));

        let err = channel.send(&event).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEvent { .. }));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let notice: HipChatNotification = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(notice.message.contains("Erroring Event"));
        assert!(notice.message.contains("P-4"));
        assert_eq!(notice.message_format, MessageFormat::Text);
        assert_eq!(notice.color, HipChatColor::Red);
    }

    #[tokio::test]
    async fn test_send_failure_reports_to_error_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/room/ops/notification"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/room/ops-errors/notification"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let config = HipChatConfig::new("room-token", "ops", "acme")
            .with_error_room("ops-errors")
            .with_base_url(format!("{}/v2", server.uri()));
        let channel = HipChatChannel::new(config, deliverer()).unwrap();
        let event = event(json!({
            "issue": { "key": "P-5" },
            "comment": { "id": "78", "body": "ping" }
        }));

        let err = channel.send(&event).await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));

        let requests = server.received_requests().await.unwrap();
        let notice = requests
            .iter()
            .find(|r| r.url.path() == "/v2/room/ops-errors/notification")
            .unwrap();
        let notice: HipChatNotification = serde_json::from_slice(&notice.body).unwrap();
        assert!(notice
            .message
            .starts_with("Error occurred on jirachat-hipchat: "));
        assert!(notice.message.contains("500"));
        assert!(!notice.notify);
    }
}
