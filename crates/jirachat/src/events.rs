//! JIRA webhook payload types.
//!
//! These mirror the JSON JIRA posts to a registered webhook. Only the fields
//! used to build notifications are modelled; anything else in the payload is
//! ignored. Every sub-object defaults when absent so that partial payloads
//! (deleted issues, comment-only events) still deserialize.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Base for links into a JIRA cloud instance.
const ATLASSIAN_HOST: &str = "atlassian.net";

/// Avatar resolution used for message icons.
const LARGE_AVATAR: &str = "48x48";

/// A single webhook call from JIRA.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraEvent {
    /// Event id assigned by JIRA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Raw event tag, e.g. `jira:issue_created`.
    #[serde(default)]
    pub webhook_event: String,
    #[serde(default, deserialize_with = "null_default")]
    pub issue: Issue,
    #[serde(default, deserialize_with = "null_default")]
    pub user: User,
    #[serde(default, deserialize_with = "null_default")]
    pub changelog: Changelog,
    #[serde(default, deserialize_with = "null_default")]
    pub comment: Comment,
}

impl JiraEvent {
    /// Parse a webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The event tag without JIRA's `jira:` namespace.
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.webhook_event
            .strip_prefix("jira:")
            .unwrap_or(&self.webhook_event)
    }

    /// Slack-formatted link to the issue, with the key as link text.
    #[must_use]
    pub fn issue_link(&self, domain: &str) -> String {
        format!("<{}|{}>", self.issue.url(domain), self.issue.key)
    }

    /// Slack-formatted link to the acting user's profile.
    #[must_use]
    pub fn user_link(&self, domain: &str) -> String {
        format!("<{}|{}>", self.user.profile_url(domain), self.user.display_name)
    }

    /// Hex color for the issue priority, or `"good"` for unmapped ids.
    #[must_use]
    pub fn priority_color(&self) -> &'static str {
        priority_color(&self.issue.fields.priority.id)
    }

    /// First changelog item touching `field`, searching the whole list.
    #[must_use]
    pub fn change_for(&self, field: &str) -> Option<&ChangelogItem> {
        self.changelog.items.iter().find(|item| item.field == field)
    }

    /// First changelog item touching any of `fields`, in payload order.
    #[must_use]
    pub fn first_change(&self, fields: &[&str]) -> Option<&ChangelogItem> {
        self.changelog
            .items
            .iter()
            .find(|item| fields.contains(&item.field.as_str()))
    }
}

/// Map a JIRA priority id to a Slack attachment color.
///
/// Total over all inputs: unknown ids (including the empty string) map to
/// Slack's `"good"` color keyword.
#[must_use]
pub fn priority_color(id: &str) -> &'static str {
    match id {
        "1" => "#990000",     // Blocker
        "2" => "#cc0000",     // Critical
        "3" => "#ff0000",     // Major
        "4" => "#006600",     // Minor
        "5" => "#003300",     // Trivial
        "6" => "#339933",     // Normal
        "10000" => "#000000", // Holding
        _ => "good",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "self", default)]
    pub self_url: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub fields: IssueFields,
}

impl Issue {
    /// Browse URL for this issue on the given JIRA cloud domain.
    #[must_use]
    pub fn url(&self, domain: &str) -> String {
        format!("https://{domain}.{ATLASSIAN_HOST}/browse/{}", self.key)
    }

    /// Body of the most recent comment, if the issue has any.
    #[must_use]
    pub fn last_comment(&self) -> Option<&str> {
        let total = self.fields.comment.total;
        if total == 0 {
            return None;
        }
        self.fields
            .comment
            .comments
            .get(total - 1)
            .or_else(|| self.fields.comment.comments.last())
            .map(|c| c.body.as_str())
    }

    /// Display name of the assignee, or `"unassigned"`.
    #[must_use]
    pub fn assignee_name(&self) -> &str {
        self.fields
            .assignee
            .as_ref()
            .map(|u| u.display_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNASSIGNED)
    }
}

/// Placeholder used wherever an assignee is missing.
pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: String,
    #[serde(default, deserialize_with = "null_default")]
    pub priority: Named,
    #[serde(default, deserialize_with = "null_default")]
    pub status: Named,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default, deserialize_with = "null_default")]
    pub comment: CommentList,
}

/// An `{id, name}` pair such as a priority or status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentList {
    #[serde(default, deserialize_with = "null_default")]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "self", default)]
    pub self_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub avatar_urls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl User {
    /// Avatar URL for a resolution key such as `"48x48"`, empty when absent.
    #[must_use]
    pub fn avatar(&self, resolution: &str) -> &str {
        self.avatar_urls
            .get(resolution)
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn large_avatar(&self) -> &str {
        self.avatar(LARGE_AVATAR)
    }

    /// Profile page on the given JIRA cloud domain.
    #[must_use]
    pub fn profile_url(&self, domain: &str) -> String {
        format!(
            "https://{domain}.{ATLASSIAN_HOST}/secure/ViewProfile.jspa?name={}",
            self.name
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changelog {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub items: Vec<ChangelogItem>,
}

/// One field-level diff inside an issue update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub field: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fieldtype: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from_string: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "self", default)]
    pub self_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated: String,
}

impl Comment {
    /// A comment counts as present when it carries a non-zero id.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.id.is_empty() && self.id != "0"
    }
}

/// Accept strings, numbers, booleans and `null` for string-typed fields.
///
/// JIRA is inconsistent about ids (`"10000"` vs `10000`) and sends `null` for
/// cleared values such as an emptied assignee in a changelog item.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Treat an explicit `null` object the same as a missing one.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
