//! Read-only view of the owning event.
//!
//! Event rows are owned and edited by the event-management application; this
//! engine only reads the fields it needs to render and gate invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of an event this engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Optional per-event sender identity for outgoing mail
    pub sender_address: Option<String>,
    /// Optional operator-authored subject template
    pub subject_template: Option<String>,
    /// Optional operator-authored body template
    pub body_template: Option<String>,
}

impl EventSummary {
    /// Whether the event's end time has passed.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(ends_in: Duration) -> EventSummary {
        let now = Utc::now();
        EventSummary {
            id: Uuid::new_v4(),
            name: "Town Hall".to_string(),
            description: None,
            starts_at: now - Duration::hours(1),
            ends_at: now + ends_in,
            sender_address: None,
            subject_template: None,
            body_template: None,
        }
    }

    #[test]
    fn test_has_ended() {
        let now = Utc::now();
        assert!(!event(Duration::hours(2)).has_ended(now));
        assert!(event(Duration::hours(-2)).has_ended(now));
    }
}
