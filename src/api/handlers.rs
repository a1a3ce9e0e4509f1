//! Invitation and audit endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::audit::DispatchOutcome;
use crate::dispatch::DispatchRequest;
use crate::error::{AppError, Result};
use crate::server::AppState;

use super::models::{
    AuditListQuery, AuditListResponse, CreateInvitationRequest, CreateInvitationResponse,
    InvitationView, JoinResponse, PurgeEventResponse, SetInvitationActiveRequest,
};

/// Create an invitation for an event and, for email delivery, dispatch it.
#[tracing::instrument(
    name = "http.create_invitation",
    skip(state, request),
    fields(event_id = %event_id, delivery = request.delivery_method.as_str())
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>)> {
    let receipt = state
        .engine
        .create_invitation(DispatchRequest {
            event_id,
            delivery: request.delivery_method,
            recipient: request.recipient,
            operator_id: request.operator_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Toggle an invitation's active flag.
#[tracing::instrument(
    name = "http.set_invitation_active",
    skip(state, request),
    fields(event_id = %event_id, invitation_id = %invitation_id, active = request.active)
)]
pub async fn set_invitation_active(
    State(state): State<AppState>,
    Path((event_id, invitation_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetInvitationActiveRequest>,
) -> Result<Json<InvitationView>> {
    let invitation = state
        .engine
        .set_invitation_active(event_id, invitation_id, request.active)
        .await?;

    Ok(Json(invitation.into()))
}

/// List an event's audit records, newest first, one page.
#[tracing::instrument(
    name = "http.list_audit_records",
    skip(state, query),
    fields(event_id = %event_id)
)]
pub async fn list_audit_records(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<AuditListQuery>,
) -> Result<Json<AuditListResponse>> {
    let outcome = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(DispatchOutcome::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("unknown audit status '{raw}'"))
        })?),
    };

    let records = state.engine.audit_records(event_id, outcome).await?;

    Ok(Json(AuditListResponse {
        records: records.into_iter().map(Into::into).collect(),
    }))
}

/// Resolve a join token to its event view. Public, side-effect free.
#[tracing::instrument(name = "http.resolve_join", skip(state, token))]
pub async fn resolve_join(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<JoinResponse>> {
    let view = state.engine.resolve_join(&token).await?;
    Ok(Json(view.into()))
}

/// Delete an event together with its invitations and audit trail.
///
/// Called by the surrounding event-management application when an event is
/// removed; the cascade is a single all-or-nothing operation.
#[tracing::instrument(name = "http.purge_event", skip(state), fields(event_id = %event_id))]
pub async fn purge_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<PurgeEventResponse>> {
    let deleted = state.engine.purge_event(event_id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Event {event_id} not found")));
    }

    Ok(Json(PurgeEventResponse { deleted }))
}
