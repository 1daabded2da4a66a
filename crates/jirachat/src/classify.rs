//! Mapping of JIRA events onto notification categories.

use serde::Serialize;

use crate::events::{ChangelogItem, JiraEvent};

/// Changelog field names that identify an update category.
pub const FIELD_STATUS: &str = "status";
pub const FIELD_ASSIGNEE: &str = "assignee";
pub const FIELD_TIMESPENT: &str = "timespent";

const IDENTIFYING_FIELDS: [&str; 3] = [FIELD_STATUS, FIELD_ASSIGNEE, FIELD_TIMESPENT];

/// The kinds of events a notification can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    IssueCreated,
    IssueDeleted,
    Comment,
    StatusChanged,
    AssigneeChanged,
    WorklogUpdated,
    Unrecognized,
}

impl EventCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IssueCreated => "issue_created",
            Self::IssueDeleted => "issue_deleted",
            Self::Comment => "comment",
            Self::StatusChanged => "status_changed",
            Self::AssigneeChanged => "assignee_changed",
            Self::WorklogUpdated => "worklog_updated",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the category for an inbound event.
///
/// Creation and deletion are trusted from the `webhookEvent` tag. Everything
/// else is classified from the payload structure since JIRA reuses
/// `issue_updated` for comments, transitions and worklog changes.
#[must_use]
pub fn route(event: &JiraEvent) -> EventCategory {
    match event.event_name() {
        "issue_created" => EventCategory::IssueCreated,
        "issue_deleted" => EventCategory::IssueDeleted,
        _ => classify(event),
    }
}

/// Classify an event from its comment and changelog contents.
///
/// A present comment wins over any changelog. Otherwise the first changelog
/// item whose field is status, assignee or timespent decides the category;
/// unrelated items before it are skipped.
#[must_use]
pub fn classify(event: &JiraEvent) -> EventCategory {
    if event.comment.is_present() {
        return EventCategory::Comment;
    }

    match identifying_change(event).map(|item| item.field.as_str()) {
        Some(FIELD_STATUS) => EventCategory::StatusChanged,
        Some(FIELD_ASSIGNEE) => EventCategory::AssigneeChanged,
        Some(FIELD_TIMESPENT) => EventCategory::WorklogUpdated,
        _ => EventCategory::Unrecognized,
    }
}

/// The changelog item [`classify`] bases its decision on.
#[must_use]
pub fn identifying_change(event: &JiraEvent) -> Option<&ChangelogItem> {
    event.first_change(&IDENTIFYING_FIELDS)
}

/// Changelog item a builder should read for `field`.
///
/// This is the identifying item when it touches `field`, so a message always
/// describes the change that classified it. Builders called for a category
/// the event was not routed to fall back to the first matching item.
#[must_use]
pub fn routed_change<'a>(event: &'a JiraEvent, field: &str) -> Option<&'a ChangelogItem> {
    identifying_change(event)
        .filter(|item| item.field == field)
        .or_else(|| event.change_for(field))
}
