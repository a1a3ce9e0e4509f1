//! Invitation model and join-token issuance.
//!
//! An invitation grants access to an event through an opaque token. Tokens
//! are generated once at issuance, are unique across the system, and never
//! change afterwards; only the active flag and its timestamps move.

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of alphanumeric characters in a join token.
///
/// 40 characters at ~5.95 bits each is well beyond the 128 bits needed to
/// make brute-force guessing infeasible.
pub const TOKEN_LENGTH: usize = 40;

/// How an invitation reaches its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryMethod {
    /// The operator shares the join link out of band.
    Link,
    /// The service emails the join link to the recipient.
    Email,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Link => "LINK",
            DeliveryMethod::Email => "EMAIL",
        }
    }

    /// Parse a stored value. Unknown strings are rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LINK" => Some(DeliveryMethod::Link),
            "EMAIL" => Some(DeliveryMethod::Email),
            _ => None,
        }
    }
}

/// A join capability for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    /// Unique identifier
    pub id: Uuid,
    /// Owning event
    pub event_id: Uuid,
    /// Opaque unguessable join token, immutable once created
    pub token: String,
    /// Delivery method chosen at issuance
    pub delivery: DeliveryMethod,
    /// Recipient address, present iff delivery is `Email`
    pub recipient: Option<String>,
    /// Whether the token currently grants access
    pub is_active: bool,
    /// When the invitation was issued
    pub created_at: DateTime<Utc>,
    /// Set iff `is_active` is false
    pub deactivated_at: Option<DateTime<Utc>>,
    /// Stamped by the join flow collaborator when the token is redeemed
    pub used_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Issue a fresh invitation for an event.
    ///
    /// The token is generated here and never regenerated; the row starts
    /// active with no usage or deactivation timestamps.
    pub fn issue(event_id: Uuid, delivery: DeliveryMethod, recipient: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            token: generate_token(),
            delivery,
            recipient,
            is_active: true,
            created_at: Utc::now(),
            deactivated_at: None,
            used_at: None,
        }
    }

    /// Flip the active flag, stamping or clearing `deactivated_at` so the
    /// invariant `deactivated_at.is_some() == !is_active` holds.
    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.deactivated_at = if active { None } else { Some(now) };
    }
}

/// Generate an opaque alphanumeric join token.
fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
