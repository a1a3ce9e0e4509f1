use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::audit::{AuditRecord, DispatchOutcome};
use crate::config::DispatchConfig;
use crate::delivery::{InviteEmail, InviteTransport};
use crate::event::EventSummary;
use crate::invitation::{DeliveryMethod, Invitation};
use crate::metrics::{DispatchMetrics, JoinMetrics};
use crate::quota::{QuotaDecision, QuotaLedger};
use crate::storage::{DispatchSettings, DispatchStore, StoreError};
use crate::template::{
    ensure_join_link, render, TemplateContext, DEFAULT_BODY, DEFAULT_SUBJECT,
    INVITE_LINK_PLACEHOLDER,
};

use super::types::{
    DeliveryState, DispatchError, DispatchReceipt, DispatchRequest, JoinError, JoinView,
};

/// Fixed page size for audit listings.
const AUDIT_PAGE_SIZE: u32 = 100;

/// Orchestrates invitation dispatch.
pub struct DispatchEngine {
    store: Arc<dyn DispatchStore>,
    /// Present when the deployment has an SMTP relay configured
    transport: Option<Arc<dyn InviteTransport>>,
    quota: QuotaLedger,
    join_link_base: String,
    send_timeout: Duration,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        transport: Option<Arc<dyn InviteTransport>>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            quota: QuotaLedger::new(store.clone()),
            store,
            transport,
            join_link_base: config.join_link_base.trim_end_matches('/').to_string(),
            send_timeout: Duration::from_secs(config.send_timeout_seconds),
        }
    }

    /// Whether the engine has a transport at startup.
    pub fn transport_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Build the public join link for a token.
    pub fn join_link(&self, token: &str) -> String {
        format!("{}/join/{}", self.join_link_base, token)
    }

    fn email_usable(&self, settings: &DispatchSettings) -> bool {
        self.transport.is_some() && settings.email_enabled
    }

    /// Create an invitation and, for email delivery, render and send it.
    ///
    /// Terminal states and their durable traces:
    /// - invalid request / delivery unusable at the boundary: rejected, no
    ///   token, no audit record;
    /// - quota denied: `RATE_LIMITED` record, no invitation (the
    ///   authoritative re-check deletes the freshly issued one);
    /// - delivery disabled mid-flight: `DISABLED` record, invitation kept;
    /// - transport send: `SENT` or `FAILED` record, invitation kept.
    #[tracing::instrument(
        name = "dispatch.create_invitation",
        skip(self, request),
        fields(
            event_id = %request.event_id,
            delivery = request.delivery.as_str(),
            operator_id = request.operator_id.as_deref().unwrap_or("-")
        )
    )]
    pub async fn create_invitation(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchReceipt, DispatchError> {
        let recipient = normalize_recipient(request.recipient.as_deref());
        if request.delivery == DeliveryMethod::Email && recipient.is_none() {
            return Err(DispatchError::InvalidRequest(
                "an EMAIL invitation requires a recipient address".to_string(),
            ));
        }

        let event = self
            .store
            .event(request.event_id)
            .await?
            .ok_or(DispatchError::UnknownEvent(request.event_id))?;

        if request.delivery == DeliveryMethod::Email {
            // Boundary capability check: an unusable transport rejects the
            // request before any token exists. A later disablement is
            // handled differently (audit record, invitation kept).
            let settings = self.store.dispatch_settings().await?;
            if !self.email_usable(&settings) {
                return Err(DispatchError::Disabled(
                    "email delivery is not configured for this deployment".to_string(),
                ));
            }

            // Pre-quota gate, only when an operator identity is known.
            if let Some(operator) = request.operator_id.as_deref() {
                if let QuotaDecision::Denied { message, .. } =
                    self.quota.check(operator, Utc::now()).await?
                {
                    let mut record = AuditRecord::new(event.id, DispatchOutcome::RateLimited)
                        .operator(operator)
                        .error(message.as_str());
                    if let Some(ref recipient) = recipient {
                        record = record.recipient(recipient.clone());
                    }
                    self.store.append_audit_record(&record).await?;
                    DispatchMetrics::record_outcome(DispatchOutcome::RateLimited);
                    return Err(DispatchError::RateLimited(message));
                }
            }
        }

        // Token issuance. Link invitations are done here; email continues
        // into the send phase. The authoritative quota re-check happens
        // after issuance by design: the narrow race window between the two
        // checks is accepted as a soft bound.
        let invitation = Invitation::issue(event.id, request.delivery, recipient);
        self.store.insert_invitation(&invitation).await?;
        DispatchMetrics::record_issued(request.delivery);
        let join_link = self.join_link(&invitation.token);

        tracing::debug!(invitation_id = %invitation.id, "Invitation issued");

        if request.delivery == DeliveryMethod::Link {
            return Ok(DispatchReceipt {
                invitation,
                join_link,
                delivery: DeliveryState::NotRequested,
            });
        }

        self.send_invitation_email(&event, invitation, join_link, request.operator_id.as_deref())
            .await
    }

    /// Render and send the invitation email, writing the audit record that
    /// reflects the true outcome.
    async fn send_invitation_email(
        &self,
        event: &EventSummary,
        invitation: Invitation,
        join_link: String,
        operator: Option<&str>,
    ) -> Result<DispatchReceipt, DispatchError> {
        let recipient = invitation.recipient.clone().ok_or_else(|| {
            DispatchError::InvalidRequest("email invitation lost its recipient".to_string())
        })?;

        let (subject, body) = render_message(event, &join_link);

        // Settings may have changed since the boundary check. A mid-flight
        // disablement is recorded and the invitation stays usable as a
        // plain link.
        let settings = self.store.dispatch_settings().await?;
        let transport = match (&self.transport, settings.email_enabled) {
            (Some(transport), true) => transport,
            _ => {
                let mut record = AuditRecord::new(event.id, DispatchOutcome::Disabled)
                    .invitation(invitation.id)
                    .recipient(recipient.clone())
                    .subject(subject.clone());
                if let Some(operator) = operator {
                    record = record.operator(operator);
                }
                self.store.append_audit_record(&record).await?;
                DispatchMetrics::record_outcome(DispatchOutcome::Disabled);
                tracing::warn!(
                    invitation_id = %invitation.id,
                    "Email delivery disabled mid-flight, invitation kept"
                );
                return Ok(DispatchReceipt {
                    invitation,
                    join_link,
                    delivery: DeliveryState::Disabled,
                });
            }
        };

        // Authoritative quota re-check, race-safe against concurrent
        // dispatches whose audit records landed since the pre-check. A
        // denial here must not leave a dangling token: the invitation is
        // deleted as a compensating action, guarded so the deletion also
        // happens if the audit write fails.
        if let Some(operator) = operator {
            if let QuotaDecision::Denied { message, .. } =
                self.quota.check(operator, Utc::now()).await?
            {
                let guard = RevocationGuard::arm(self.store.clone(), invitation.id);
                let record = AuditRecord::new(event.id, DispatchOutcome::RateLimited)
                    .operator(operator)
                    .recipient(recipient.clone())
                    .subject(subject.clone())
                    .error(message.as_str());
                self.store.append_audit_record(&record).await?;
                guard.revoke().await;
                DispatchMetrics::record_outcome(DispatchOutcome::RateLimited);
                return Err(DispatchError::RateLimited(message));
            }
        }

        let email = InviteEmail {
            to: recipient.clone(),
            from: event.sender_address.clone(),
            subject: subject.clone(),
            body,
        };

        let started = Instant::now();
        let send_result = timeout(self.send_timeout, transport.send(&email)).await;
        DispatchMetrics::record_send_duration(started.elapsed().as_secs_f64());

        let failure = match send_result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.short_reason()),
            Err(_) => Some(format!(
                "delivery timed out after {}s",
                self.send_timeout.as_secs()
            )),
        };

        match failure {
            None => {
                let mut record = AuditRecord::new(event.id, DispatchOutcome::Sent)
                    .invitation(invitation.id)
                    .recipient(recipient)
                    .subject(subject);
                if let Some(operator) = operator {
                    record = record.operator(operator);
                }
                self.store.append_audit_record(&record).await?;
                DispatchMetrics::record_outcome(DispatchOutcome::Sent);
                tracing::info!(invitation_id = %invitation.id, "Invitation email sent");
                Ok(DispatchReceipt {
                    invitation,
                    join_link,
                    delivery: DeliveryState::Sent,
                })
            }
            Some(reason) => {
                // The invitation is not rolled back: the operator may still
                // share the link manually, and the failure stays visible in
                // the audit trail.
                let mut record = AuditRecord::new(event.id, DispatchOutcome::Failed)
                    .invitation(invitation.id)
                    .recipient(recipient)
                    .subject(subject)
                    .error(reason.as_str());
                if let Some(operator) = operator {
                    record = record.operator(operator);
                }
                self.store.append_audit_record(&record).await?;
                DispatchMetrics::record_outcome(DispatchOutcome::Failed);
                tracing::warn!(
                    invitation_id = %invitation.id,
                    reason = %reason,
                    "Invitation email failed"
                );
                Err(DispatchError::SendFailed(reason))
            }
        }
    }

    /// Resolve a join token. Side-effect free.
    #[tracing::instrument(name = "dispatch.resolve_join", skip(self, token))]
    pub async fn resolve_join(&self, token: &str) -> Result<JoinView, JoinError> {
        let invitation = match self.store.invitation_by_token(token).await? {
            Some(invitation) => invitation,
            None => {
                JoinMetrics::record_not_found();
                return Err(JoinError::NotFound);
            }
        };

        if !invitation.is_active {
            JoinMetrics::record_inactive();
            return Err(JoinError::Inactive);
        }

        let event = match self.store.event(invitation.event_id).await? {
            Some(event) => event,
            None => {
                JoinMetrics::record_not_found();
                return Err(JoinError::NotFound);
            }
        };

        if event.has_ended(Utc::now()) {
            JoinMetrics::record_expired();
            return Err(JoinError::Expired);
        }

        JoinMetrics::record_resolved();
        Ok(JoinView { event, invitation })
    }

    /// Toggle an invitation's active flag.
    pub async fn set_invitation_active(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
        active: bool,
    ) -> Result<Invitation, DispatchError> {
        self.store
            .set_invitation_active(event_id, invitation_id, active)
            .await?
            .ok_or(DispatchError::InvitationNotFound)
    }

    /// List an event's audit records, newest first, one fixed-size page.
    pub async fn audit_records(
        &self,
        event_id: Uuid,
        outcome: Option<DispatchOutcome>,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.store
            .audit_records(event_id, outcome, AUDIT_PAGE_SIZE)
            .await
    }

    /// Delete an event together with its invitations and audit records.
    pub async fn purge_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        self.store.purge_event(event_id).await
    }
}

/// Render subject and body for an event, guaranteeing the join link is
/// present even when an operator's custom body template omits it.
fn render_message(event: &EventSummary, join_link: &str) -> (String, String) {
    let mut ctx = TemplateContext::new();
    ctx.set("eventName", event.name.clone())
        .set_opt("eventDescription", event.description.as_deref())
        .set("eventStart", event.starts_at.to_rfc3339())
        .set("eventEnd", event.ends_at.to_rfc3339())
        .set(INVITE_LINK_PLACEHOLDER, join_link);

    let subject = render(
        event.subject_template.as_deref().unwrap_or(DEFAULT_SUBJECT),
        &ctx,
    );
    let body = render(event.body_template.as_deref().unwrap_or(DEFAULT_BODY), &ctx);
    let body = ensure_join_link(&body, INVITE_LINK_PLACEHOLDER, join_link);

    (subject, body)
}

fn normalize_recipient(recipient: Option<&str>) -> Option<String> {
    recipient
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Guaranteed compensation for a quota denial after token issuance.
///
/// The deletion is normally awaited through [`revoke`](Self::revoke); if
/// the routine unwinds first (audit write failure, panic), the drop
/// handler still runs it on a detached task.
struct RevocationGuard {
    store: Arc<dyn DispatchStore>,
    invitation_id: Uuid,
    armed: bool,
}

impl RevocationGuard {
    fn arm(store: Arc<dyn DispatchStore>, invitation_id: Uuid) -> Self {
        Self {
            store,
            invitation_id,
            armed: true,
        }
    }

    async fn revoke(mut self) {
        self.armed = false;
        Self::delete(self.store.clone(), self.invitation_id).await;
    }

    async fn delete(store: Arc<dyn DispatchStore>, invitation_id: Uuid) {
        match store.delete_invitation(invitation_id).await {
            Ok(_) => {
                DispatchMetrics::record_revoked();
                tracing::debug!(
                    invitation_id = %invitation_id,
                    "Deleted invitation after authoritative quota denial"
                );
            }
            Err(e) => {
                tracing::error!(
                    invitation_id = %invitation_id,
                    error = %e,
                    "Failed to delete invitation after quota denial"
                );
            }
        }
    }
}

impl Drop for RevocationGuard {
    fn drop(&mut self) {
        if self.armed {
            let store = self.store.clone();
            let invitation_id = self.invitation_id;
            tokio::spawn(async move {
                RevocationGuard::delete(store, invitation_id).await;
            });
        }
    }
}
