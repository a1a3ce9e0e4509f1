//! Cross-component integration tests
//!
//! These tests drive the dispatch engine against the in-memory store and a
//! mock transport, covering the full state machine: quota windows, token
//! lifecycle, mid-flight disablement, compensation, and join resolution.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use gather_invite_service::audit::{AuditRecord, DispatchOutcome};
use gather_invite_service::config::DispatchConfig;
use gather_invite_service::delivery::{InviteEmail, InviteTransport, TransportError};
use gather_invite_service::dispatch::{
    DeliveryState, DispatchEngine, DispatchError, DispatchRequest, JoinError,
};
use gather_invite_service::event::EventSummary;
use gather_invite_service::invitation::{DeliveryMethod, Invitation};
use gather_invite_service::storage::{DispatchSettings, DispatchStore, MemoryStore, StoreError};

// =============================================================================
// Test doubles
// =============================================================================

/// Transport that records sends and always succeeds.
struct RecordingTransport {
    sends: AtomicUsize,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sends: AtomicUsize::new(0),
        })
    }

    fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InviteTransport for RecordingTransport {
    async fn send(&self, _email: &InviteEmail) -> Result<(), TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store wrapper that scripts settings reads and quota counts to exercise
/// the races the engine guards against (settings changing between the
/// boundary check and the send, audit records landing between the two
/// quota checks).
struct ScriptedStore {
    inner: Arc<MemoryStore>,
    settings_reads: AtomicUsize,
    /// Settings reads beyond this threshold report email delivery disabled
    disable_email_after: Option<usize>,
    /// Scripted return values for chargeable-dispatch counts; empty
    /// delegates to the real store
    quota_counts: Mutex<VecDeque<u64>>,
}

impl ScriptedStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            settings_reads: AtomicUsize::new(0),
            disable_email_after: None,
            quota_counts: Mutex::new(VecDeque::new()),
        }
    }

    fn disable_email_after(mut self, reads: usize) -> Self {
        self.disable_email_after = Some(reads);
        self
    }

    fn script_quota_counts(self, counts: &[u64]) -> Self {
        self.quota_counts
            .lock()
            .unwrap()
            .extend(counts.iter().copied());
        self
    }
}

#[async_trait]
impl DispatchStore for ScriptedStore {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn event(&self, event_id: Uuid) -> Result<Option<EventSummary>, StoreError> {
        self.inner.event(event_id).await
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        self.inner.insert_invitation(invitation).await
    }

    async fn invitation(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, StoreError> {
        self.inner.invitation(event_id, invitation_id).await
    }

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        self.inner.invitation_by_token(token).await
    }

    async fn set_invitation_active(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
        active: bool,
    ) -> Result<Option<Invitation>, StoreError> {
        self.inner
            .set_invitation_active(event_id, invitation_id, active)
            .await
    }

    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_invitation(invitation_id).await
    }

    async fn append_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.inner.append_audit_record(record).await
    }

    async fn audit_records(
        &self,
        event_id: Uuid,
        outcome: Option<DispatchOutcome>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.inner.audit_records(event_id, outcome, limit).await
    }

    async fn count_chargeable_dispatches(
        &self,
        operator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if let Some(count) = self.quota_counts.lock().unwrap().pop_front() {
            return Ok(count);
        }
        self.inner
            .count_chargeable_dispatches(operator_id, since)
            .await
    }

    async fn dispatch_settings(&self) -> Result<DispatchSettings, StoreError> {
        let reads = self.settings_reads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut settings = self.inner.dispatch_settings().await?;
        if let Some(threshold) = self.disable_email_after {
            if reads > threshold {
                settings.email_enabled = false;
            }
        }
        Ok(settings)
    }

    async fn purge_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        self.inner.purge_event(event_id).await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn upcoming_event() -> EventSummary {
    let now = Utc::now();
    EventSummary {
        id: Uuid::new_v4(),
        name: "Harvest Dinner".to_string(),
        description: Some("Seasonal menu, long tables".to_string()),
        starts_at: now + Duration::days(3),
        ends_at: now + Duration::days(3) + Duration::hours(5),
        sender_address: None,
        subject_template: None,
        body_template: None,
    }
}

fn engine(
    store: Arc<dyn DispatchStore>,
    transport: Option<Arc<dyn InviteTransport>>,
) -> DispatchEngine {
    let config = DispatchConfig {
        join_link_base: "https://gather.test".to_string(),
        send_timeout_seconds: 2,
    };
    DispatchEngine::new(store, transport, &config)
}

fn email_request(event_id: Uuid, operator: &str) -> DispatchRequest {
    DispatchRequest {
        event_id,
        delivery: DeliveryMethod::Email,
        recipient: Some("guest@example.com".to_string()),
        operator_id: Some(operator.to_string()),
    }
}

fn link_request(event_id: Uuid) -> DispatchRequest {
    DispatchRequest {
        event_id,
        delivery: DeliveryMethod::Link,
        recipient: None,
        operator_id: None,
    }
}

// =============================================================================
// Quota window scenarios
// =============================================================================

#[tokio::test]
async fn third_dispatch_in_the_hour_is_rate_limited() {
    let store = Arc::new(MemoryStore::with_settings(DispatchSettings {
        hourly_limit: 2,
        daily_limit: 10,
        email_enabled: true,
    }));
    let event = upcoming_event();
    store.insert_event(event.clone());
    let transport = RecordingTransport::new();
    let engine = engine(store.clone(), Some(transport.clone()));

    for _ in 0..2 {
        let receipt = engine
            .create_invitation(email_request(event.id, "operator-a"))
            .await
            .expect("dispatch under the ceiling succeeds");
        assert_eq!(receipt.delivery, DeliveryState::Sent);
    }

    let err = engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .unwrap_err();

    match err {
        DispatchError::RateLimited(message) => {
            // The denial names the ceiling that was hit.
            assert!(message.contains('2'), "message should name the ceiling: {message}");
            assert!(message.contains("hour"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    assert_eq!(transport.send_count(), 2);

    let sent = store
        .audit_records(event.id, Some(DispatchOutcome::Sent), 100)
        .await
        .unwrap();
    let limited = store
        .audit_records(event.id, Some(DispatchOutcome::RateLimited), 100)
        .await
        .unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].operator_id.as_deref(), Some("operator-a"));
}

#[tokio::test]
async fn rejected_attempts_do_not_shrink_the_allowance() {
    let store = Arc::new(MemoryStore::with_settings(DispatchSettings {
        hourly_limit: 2,
        daily_limit: 0,
        email_enabled: true,
    }));
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), Some(RecordingTransport::new()));

    for _ in 0..2 {
        engine
            .create_invitation(email_request(event.id, "operator-a"))
            .await
            .unwrap();
    }

    // Hammer the limit: every attempt is rejected and recorded, but the
    // chargeable count must stay at 2.
    for _ in 0..5 {
        let err = engine
            .create_invitation(email_request(event.id, "operator-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RateLimited(_)));
    }

    let count = store
        .count_chargeable_dispatches("operator-a", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(count, 2);

    let limited = store
        .audit_records(event.id, Some(DispatchOutcome::RateLimited), 100)
        .await
        .unwrap();
    assert_eq!(limited.len(), 5);

    // Raising the ceiling by one admits exactly one more dispatch, proving
    // the rejections never consumed quota.
    store.set_settings(DispatchSettings {
        hourly_limit: 3,
        daily_limit: 0,
        email_enabled: true,
    });
    engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .expect("one slot opened up");
    assert!(matches!(
        engine
            .create_invitation(email_request(event.id, "operator-a"))
            .await
            .unwrap_err(),
        DispatchError::RateLimited(_)
    ));
}

#[tokio::test]
async fn quota_is_per_operator() {
    let store = Arc::new(MemoryStore::with_settings(DispatchSettings {
        hourly_limit: 1,
        daily_limit: 0,
        email_enabled: true,
    }));
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), Some(RecordingTransport::new()));

    engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .unwrap();
    assert!(matches!(
        engine
            .create_invitation(email_request(event.id, "operator-a"))
            .await
            .unwrap_err(),
        DispatchError::RateLimited(_)
    ));

    // A different operator has an untouched window.
    engine
        .create_invitation(email_request(event.id, "operator-b"))
        .await
        .expect("other operators are unaffected");
}

// =============================================================================
// Race narrowing: mid-flight disablement and the authoritative re-check
// =============================================================================

#[tokio::test]
async fn mid_flight_disablement_keeps_the_invitation() {
    let inner = Arc::new(MemoryStore::new());
    let event = upcoming_event();
    inner.insert_event(event.clone());

    // Boundary check (read 1) and quota pre-check (read 2) see email
    // enabled; the re-read before sending sees it disabled.
    let store = Arc::new(ScriptedStore::new(inner.clone()).disable_email_after(2));
    let transport = RecordingTransport::new();
    let engine = engine(store, Some(transport.clone()));

    let receipt = engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .expect("mid-flight disablement is success-with-disabled-status");

    assert_eq!(receipt.delivery, DeliveryState::Disabled);
    assert_eq!(transport.send_count(), 0);

    // The invitation survives and works as a plain link.
    let view = engine.resolve_join(&receipt.invitation.token).await.unwrap();
    assert_eq!(view.event.id, event.id);

    let disabled = inner
        .audit_records(event.id, Some(DispatchOutcome::Disabled), 100)
        .await
        .unwrap();
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].invitation_id, Some(receipt.invitation.id));
}

#[tokio::test]
async fn boundary_disablement_leaves_no_trace() {
    let store = Arc::new(MemoryStore::with_settings(DispatchSettings {
        hourly_limit: 0,
        daily_limit: 0,
        email_enabled: false,
    }));
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), Some(RecordingTransport::new()));

    let err = engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Disabled(_)));

    // Unlike the mid-flight case there is no token and no audit record.
    assert_eq!(store.audit_len(), 0);
}

#[tokio::test]
async fn authoritative_denial_deletes_the_fresh_invitation() {
    let inner = Arc::new(MemoryStore::with_settings(DispatchSettings {
        hourly_limit: 1,
        daily_limit: 0,
        email_enabled: true,
    }));
    let event = upcoming_event();
    inner.insert_event(event.clone());

    // Pre-check sees 0 dispatches; by the authoritative check a concurrent
    // dispatch has landed and the count is over the ceiling.
    let store = Arc::new(
        ScriptedStore::new(inner.clone()).script_quota_counts(&[0, 5]),
    );
    let transport = RecordingTransport::new();
    let engine = engine(store, Some(transport.clone()));

    let err = engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::RateLimited(_)));

    // Nothing was sent and no dangling token remains.
    assert_eq!(transport.send_count(), 0);
    let limited = inner
        .audit_records(event.id, Some(DispatchOutcome::RateLimited), 100)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert!(limited[0].invitation_id.is_none());

    let engine_over_inner = engine_for_inner(inner.clone());
    let receipt = engine_over_inner
        .create_invitation(link_request(event.id))
        .await
        .unwrap();
    // Only the link invitation just created exists; the compensated one is
    // gone (its token would otherwise resolve too).
    assert!(engine_over_inner
        .resolve_join(&receipt.invitation.token)
        .await
        .is_ok());
    let records = inner.audit_records(event.id, None, 100).await.unwrap();
    assert_eq!(records.len(), 1);
}

fn engine_for_inner(inner: Arc<MemoryStore>) -> DispatchEngine {
    engine(inner, None)
}

// =============================================================================
// Token lifecycle and join resolution
// =============================================================================

#[tokio::test]
async fn link_dispatch_works_without_operator_or_transport() {
    let store = Arc::new(MemoryStore::new());
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), None);

    let receipt = engine
        .create_invitation(link_request(event.id))
        .await
        .expect("link dispatch has no transport or quota involvement");

    assert_eq!(receipt.delivery, DeliveryState::NotRequested);
    assert!(receipt.invitation.is_active);
    assert!(receipt.join_link.ends_with(&receipt.invitation.token));

    // No audit record of any kind, in particular no DISABLED.
    assert_eq!(store.audit_len(), 0);
}

#[tokio::test]
async fn toggling_active_restores_a_clean_state() {
    let store = Arc::new(MemoryStore::new());
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), None);

    let receipt = engine.create_invitation(link_request(event.id)).await.unwrap();
    let id = receipt.invitation.id;

    for _ in 0..4 {
        let off = engine
            .set_invitation_active(event.id, id, false)
            .await
            .unwrap();
        assert!(!off.is_active);
        assert!(off.deactivated_at.is_some());

        let on = engine.set_invitation_active(event.id, id, true).await.unwrap();
        assert!(on.is_active);
        assert!(on.deactivated_at.is_none());
    }

    // The token itself never changed.
    let current = store.invitation(event.id, id).await.unwrap().unwrap();
    assert_eq!(current.token, receipt.invitation.token);
}

#[tokio::test]
async fn deactivated_token_gets_a_generic_answer_not_a_404() {
    let store = Arc::new(MemoryStore::new());
    let event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), None);

    let receipt = engine.create_invitation(link_request(event.id)).await.unwrap();
    engine
        .set_invitation_active(event.id, receipt.invitation.id, false)
        .await
        .unwrap();

    let err = engine
        .resolve_join(&receipt.invitation.token)
        .await
        .unwrap_err();

    // Neutral wording: the caller cannot tell deactivated from expired,
    // and the message differs from the unknown-token case.
    assert!(matches!(err, JoinError::Inactive));
    assert_eq!(err.to_string(), "This invitation is no longer valid");
    assert_ne!(
        err.to_string(),
        JoinError::NotFound.to_string(),
        "must not read like a 404"
    );
}

#[tokio::test]
async fn ended_event_expires_its_tokens() {
    let store = Arc::new(MemoryStore::new());
    let mut event = upcoming_event();
    store.insert_event(event.clone());
    let engine = engine(store.clone(), None);

    let receipt = engine.create_invitation(link_request(event.id)).await.unwrap();
    assert!(engine.resolve_join(&receipt.invitation.token).await.is_ok());

    event.ends_at = Utc::now() - Duration::minutes(1);
    store.insert_event(event);

    let err = engine
        .resolve_join(&receipt.invitation.token)
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::Expired));
    assert_eq!(err.to_string(), "This invitation is no longer valid");
}

// =============================================================================
// Cascade deletion
// =============================================================================

#[tokio::test]
async fn purging_an_event_leaves_no_orphans() {
    let store = Arc::new(MemoryStore::new());
    let event = upcoming_event();
    let unrelated = upcoming_event();
    store.insert_event(event.clone());
    store.insert_event(unrelated.clone());

    let transport = RecordingTransport::new();
    let engine = engine(store.clone(), Some(transport));

    let kept = engine.create_invitation(link_request(unrelated.id)).await.unwrap();
    let doomed_link = engine.create_invitation(link_request(event.id)).await.unwrap();
    engine
        .create_invitation(email_request(event.id, "operator-a"))
        .await
        .unwrap();

    assert!(engine.purge_event(event.id).await.unwrap());

    // Invitations and audit records of the purged event are gone.
    assert!(matches!(
        engine.resolve_join(&doomed_link.invitation.token).await.unwrap_err(),
        JoinError::NotFound
    ));
    assert!(store.audit_records(event.id, None, 100).await.unwrap().is_empty());
    assert!(store.event(event.id).await.unwrap().is_none());

    // The unrelated event is untouched.
    assert!(engine.resolve_join(&kept.invitation.token).await.is_ok());
    assert!(store.event(unrelated.id).await.unwrap().is_some());

    // A second purge reports the event as already gone.
    assert!(!engine.purge_event(event.id).await.unwrap());
}
