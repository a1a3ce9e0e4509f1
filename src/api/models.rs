//! Wire models for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditRecord, DispatchOutcome};
use crate::dispatch::{DeliveryState, DispatchReceipt, JoinView};
use crate::invitation::{DeliveryMethod, Invitation};

/// Body of `POST /api/v1/events/{event_id}/invitations`.
#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub recipient: Option<String>,
    /// Operator identity for quota accounting
    #[serde(default)]
    pub operator_id: Option<String>,
}

/// Body of `PATCH /api/v1/events/{event_id}/invitations/{invitation_id}`.
#[derive(Debug, Deserialize)]
pub struct SetInvitationActiveRequest {
    pub active: bool,
}

/// Query string of `GET /api/v1/events/{event_id}/audit`.
#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    /// Outcome filter; unknown values are rejected, never match-all
    pub status: Option<String>,
}

/// An invitation as exposed over the API.
#[derive(Debug, Serialize)]
pub struct InvitationView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub token: String,
    pub delivery_method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl From<Invitation> for InvitationView {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            event_id: invitation.event_id,
            token: invitation.token,
            delivery_method: invitation.delivery,
            recipient: invitation.recipient,
            is_active: invitation.is_active,
            created_at: invitation.created_at,
            deactivated_at: invitation.deactivated_at,
            used_at: invitation.used_at,
        }
    }
}

/// Response of a successful dispatch.
#[derive(Debug, Serialize)]
pub struct CreateInvitationResponse {
    pub invitation: InvitationView,
    pub join_link: String,
    pub delivery: DeliveryState,
}

impl From<DispatchReceipt> for CreateInvitationResponse {
    fn from(receipt: DispatchReceipt) -> Self {
        Self {
            invitation: receipt.invitation.into(),
            join_link: receipt.join_link,
            delivery: receipt.delivery,
        }
    }
}

/// One audit row as exposed over the API.
#[derive(Debug, Serialize)]
pub struct AuditRecordView {
    pub id: Uuid,
    pub event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub outcome: DispatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditRecord> for AuditRecordView {
    fn from(record: AuditRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            invitation_id: record.invitation_id,
            operator_id: record.operator_id,
            recipient: record.recipient,
            subject: record.subject,
            outcome: record.outcome,
            error_message: record.error_message,
            created_at: record.created_at,
        }
    }
}

/// Audit listing page, newest first.
#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub records: Vec<AuditRecordView>,
}

/// The public join view: enough to present the event, nothing more.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub event: JoinEventView,
    pub invitation: JoinInvitationView,
}

#[derive(Debug, Serialize)]
pub struct JoinEventView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JoinInvitationView {
    pub token: String,
    pub delivery_method: DeliveryMethod,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl From<JoinView> for JoinResponse {
    fn from(view: JoinView) -> Self {
        Self {
            event: JoinEventView {
                id: view.event.id,
                name: view.event.name,
                description: view.event.description,
                starts_at: view.event.starts_at,
                ends_at: view.event.ends_at,
            },
            invitation: JoinInvitationView {
                token: view.invitation.token,
                delivery_method: view.invitation.delivery,
                created_at: view.invitation.created_at,
                used_at: view.invitation.used_at,
            },
        }
    }
}

/// Response of a cascade purge.
#[derive(Debug, Serialize)]
pub struct PurgeEventResponse {
    pub deleted: bool,
}
