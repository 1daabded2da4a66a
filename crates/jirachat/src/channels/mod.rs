//! Chat channel implementations.

pub mod hipchat;
pub mod slack;

use async_trait::async_trait;

use crate::classify::{routed_change, EventCategory, FIELD_TIMESPENT};
use crate::error::Error;
use crate::events::JiraEvent;

/// Trait for chat destinations (Slack, HipChat).
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Build and deliver the notification for one JIRA event.
    ///
    /// Returns the category the event was handled as.
    async fn send(&self, event: &JiraEvent) -> Result<EventCategory, Error>;
}

/// Total logged work from the `timespent` changelog item, e.g. `"2 minutes"`.
///
/// JIRA reports the running total in seconds; partial minutes are truncated.
/// When several `timespent` items are present the first one is used.
pub(crate) fn total_work(event: &JiraEvent) -> Result<String, Error> {
    let raw = routed_change(event, FIELD_TIMESPENT)
        .map(|item| item.to_string.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Parse("Unable to read timespent field".to_string()))?;

    let seconds: u64 = raw
        .parse()
        .map_err(|_| Error::Parse(format!("Invalid timespent field {raw}")))?;

    let minutes = seconds / 60;
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    Ok(format!("{minutes} {unit}"))
}

/// Replace an empty value with `"unassigned"`.
pub(crate) fn or_unassigned(value: &str) -> &str {
    if value.is_empty() {
        crate::events::UNASSIGNED
    } else {
        value
    }
}
