//! In-memory store backend using DashMap.
//!
//! Backs tests and single-node development. State is lost on restart; the
//! all-or-nothing guarantee for `purge_event` is only as strong as the
//! process (the PostgreSQL backend provides the transactional version).

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::audit::{AuditRecord, DispatchOutcome};
use crate::event::EventSummary;
use crate::invitation::Invitation;

use super::{DispatchSettings, DispatchStore, StoreError};

/// In-memory store.
///
/// Invitations are indexed both by id and by token; audit records live in an
/// append-only vector that windowed counts scan.
#[derive(Default)]
pub struct MemoryStore {
    events: DashMap<Uuid, EventSummary>,
    invitations: DashMap<Uuid, Invitation>,
    tokens: DashMap<String, Uuid>,
    audit: RwLock<Vec<AuditRecord>>,
    settings: RwLock<DispatchSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: DispatchSettings) -> Self {
        let store = Self::new();
        *store.settings.write().unwrap() = settings;
        store
    }

    /// Seed an event row. The event aggregate is owned by the surrounding
    /// application; tests and dev setups insert views directly.
    pub fn insert_event(&self, event: EventSummary) {
        self.events.insert(event.id, event);
    }

    /// Replace the dispatch settings, as a central admin update would.
    pub fn set_settings(&self, settings: DispatchSettings) {
        *self.settings.write().unwrap() = settings;
    }

    /// Number of audit records currently held (test helper).
    pub fn audit_len(&self) -> usize {
        self.audit.read().unwrap().len()
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn event(&self, event_id: Uuid) -> Result<Option<EventSummary>, StoreError> {
        Ok(self.events.get(&event_id).map(|e| e.clone()))
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        self.tokens.insert(invitation.token.clone(), invitation.id);
        self.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn invitation(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(self
            .invitations
            .get(&invitation_id)
            .filter(|i| i.event_id == event_id)
            .map(|i| i.clone()))
    }

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        let id = match self.tokens.get(token) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.invitations.get(&id).map(|i| i.clone()))
    }

    async fn set_invitation_active(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
        active: bool,
    ) -> Result<Option<Invitation>, StoreError> {
        let mut entry = match self.invitations.get_mut(&invitation_id) {
            Some(entry) if entry.event_id == event_id => entry,
            _ => return Ok(None),
        };
        entry.set_active(active, Utc::now());
        Ok(Some(entry.clone()))
    }

    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<bool, StoreError> {
        match self.invitations.remove(&invitation_id) {
            Some((_, invitation)) => {
                self.tokens.remove(&invitation.token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.audit.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn audit_records(
        &self,
        event_id: Uuid,
        outcome: Option<DispatchOutcome>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let audit = self.audit.read().unwrap();
        let mut records: Vec<AuditRecord> = audit
            .iter()
            .filter(|r| r.event_id == event_id)
            .filter(|r| outcome.map_or(true, |o| r.outcome == o))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn count_chargeable_dispatches(
        &self,
        operator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let audit = self.audit.read().unwrap();
        let count = audit
            .iter()
            .filter(|r| r.operator_id.as_deref() == Some(operator_id))
            .filter(|r| r.created_at >= since)
            .filter(|r| r.outcome.counts_toward_quota())
            .count();
        Ok(count as u64)
    }

    async fn dispatch_settings(&self) -> Result<DispatchSettings, StoreError> {
        Ok(*self.settings.read().unwrap())
    }

    async fn purge_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let existed = self.events.remove(&event_id).is_some();

        self.invitations.retain(|_, invitation| {
            if invitation.event_id == event_id {
                self.tokens.remove(&invitation.token);
                false
            } else {
                true
            }
        });

        self.audit
            .write()
            .unwrap()
            .retain(|record| record.event_id != event_id);

        Ok(existed)
    }
}
