use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::event::EventSummary;
use crate::invitation::{DeliveryMethod, Invitation};
use crate::storage::StoreError;

/// One request to create an invitation and, for email delivery, send it.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub event_id: Uuid,
    pub delivery: DeliveryMethod,
    /// Required for `Email`, optional metadata for `Link`
    pub recipient: Option<String>,
    /// Operator identity used for quota accounting, when known
    pub operator_id: Option<String>,
}

/// What happened to the delivery leg of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    /// Link delivery: nothing to send
    NotRequested,
    /// The transport accepted the message
    Sent,
    /// Delivery was disabled mid-flight; the invitation still stands
    Disabled,
}

/// Successful dispatch result.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub invitation: Invitation,
    pub join_link: String,
    pub delivery: DeliveryState,
}

/// Terminal failures of a dispatch request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Structurally invalid request; rejected before any durable effect
    #[error("{0}")]
    InvalidRequest(String),

    /// The target event does not exist
    #[error("Event {0} not found")]
    UnknownEvent(Uuid),

    /// The referenced invitation does not exist under the given event
    #[error("Invitation not found")]
    InvitationNotFound,

    /// Email delivery unusable at the request boundary; no token, no audit
    #[error("{0}")]
    Disabled(String),

    /// The operator's quota window is exhausted
    #[error("{0}")]
    RateLimited(String),

    /// The transport failed or timed out; the invitation survives
    #[error("{0}")]
    SendFailed(String),

    /// The durable store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the join read path.
///
/// Inactive and expired tokens share one deliberately generic message so an
/// unauthenticated caller cannot distinguish "deactivated" from "ended"
/// from the wording.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("This invitation could not be found")]
    NotFound,

    #[error("This invitation is no longer valid")]
    Inactive,

    #[error("This invitation is no longer valid")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolved join view: the event plus the invitation that granted access.
#[derive(Debug, Clone)]
pub struct JoinView {
    pub event: EventSummary,
    pub invitation: Invitation,
}
