//! Immutable audit trail for dispatch attempts.
//!
//! Every reachable terminal state of a dispatch writes exactly one audit
//! record, and the records are the single source of truth for quota
//! accounting. Rejected attempts (`RateLimited`) are recorded for the trail
//! but never consume quota, so limit checks cannot self-amplify.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of one dispatch attempt.
///
/// This is a closed set: stored values outside it are a data error, and
/// status filters that do not match one of these are rejected rather than
/// silently matching everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchOutcome {
    /// The transport accepted the message
    Sent,
    /// The transport failed or timed out
    Failed,
    /// Delivery was found disabled mid-flight
    Disabled,
    /// The operator's quota window was exhausted
    RateLimited,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "SENT",
            DispatchOutcome::Failed => "FAILED",
            DispatchOutcome::Disabled => "DISABLED",
            DispatchOutcome::RateLimited => "RATE_LIMITED",
        }
    }

    /// Parse a stored or caller-supplied value. Unknown strings are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SENT" => Some(DispatchOutcome::Sent),
            "FAILED" => Some(DispatchOutcome::Failed),
            "DISABLED" => Some(DispatchOutcome::Disabled),
            "RATE_LIMITED" => Some(DispatchOutcome::RateLimited),
            _ => None,
        }
    }

    /// Whether a record with this outcome counts toward quota windows.
    pub fn counts_toward_quota(&self) -> bool {
        !matches!(self, DispatchOutcome::RateLimited)
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Event the dispatch targeted
    pub event_id: Uuid,
    /// Invitation the dispatch produced, if one exists
    pub invitation_id: Option<Uuid>,
    /// Operator who triggered the dispatch, when known
    pub operator_id: Option<String>,
    /// Recipient address the dispatch was aimed at
    pub recipient: Option<String>,
    /// Rendered subject line, when a message was rendered
    pub subject: Option<String>,
    pub outcome: DispatchOutcome,
    /// Short, non-sensitive failure description
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Start a record for an event with the given outcome; the optional
    /// references are attached with the chained setters.
    pub fn new(event_id: Uuid, outcome: DispatchOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            invitation_id: None,
            operator_id: None,
            recipient: None,
            subject: None,
            outcome,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn invitation(mut self, invitation_id: Uuid) -> Self {
        self.invitation_id = Some(invitation_id);
        self
    }

    pub fn operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [
            DispatchOutcome::Sent,
            DispatchOutcome::Failed,
            DispatchOutcome::Disabled,
            DispatchOutcome::RateLimited,
        ] {
            assert_eq!(DispatchOutcome::parse(outcome.as_str()), Some(outcome));
        }
    }

    #[test]
    fn test_outcome_rejects_unknown() {
        assert_eq!(DispatchOutcome::parse("sent"), None);
        assert_eq!(DispatchOutcome::parse("PENDING"), None);
        assert_eq!(DispatchOutcome::parse(""), None);
    }

    #[test]
    fn test_rate_limited_is_not_chargeable() {
        assert!(DispatchOutcome::Sent.counts_toward_quota());
        assert!(DispatchOutcome::Failed.counts_toward_quota());
        assert!(DispatchOutcome::Disabled.counts_toward_quota());
        assert!(!DispatchOutcome::RateLimited.counts_toward_quota());
    }

    #[test]
    fn test_record_builder() {
        let event_id = Uuid::new_v4();
        let invitation_id = Uuid::new_v4();
        let record = AuditRecord::new(event_id, DispatchOutcome::Failed)
            .invitation(invitation_id)
            .operator("ops-1")
            .recipient("guest@example.com")
            .subject("You are invited")
            .error("connection refused");

        assert_eq!(record.event_id, event_id);
        assert_eq!(record.invitation_id, Some(invitation_id));
        assert_eq!(record.operator_id.as_deref(), Some("ops-1"));
        assert_eq!(record.error_message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_outcome_wire_format() {
        let json = serde_json::to_string(&DispatchOutcome::RateLimited).unwrap();
        assert_eq!(json, "\"RATE_LIMITED\"");
    }
}
