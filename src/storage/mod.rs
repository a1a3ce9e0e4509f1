//! Durable store abstraction for the dispatch engine.
//!
//! The engine never talks to a database directly; it goes through the
//! [`DispatchStore`] trait so different storage implementations (memory,
//! PostgreSQL) can be used interchangeably. The in-memory backend serves
//! tests and single-node development, the PostgreSQL backend is the
//! production store.

mod memory_backend;
mod postgres_backend;

pub use memory_backend::MemoryStore;
pub use postgres_backend::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditRecord, DispatchOutcome};
use crate::event::EventSummary;
use crate::invitation::Invitation;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored value could not be interpreted (e.g. unknown enum text)
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Operator-tunable dispatch settings.
///
/// These are read from the store on every consultation rather than cached,
/// so administrators can retune ceilings or disable email delivery without
/// a service restart. A ceiling of 0 means that window is unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Maximum chargeable dispatches per operator per hour (0 = unlimited)
    pub hourly_limit: u32,
    /// Maximum chargeable dispatches per operator per 24 hours (0 = unlimited)
    pub daily_limit: u32,
    /// Whether email delivery is administratively enabled
    pub email_enabled: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            hourly_limit: 10,
            daily_limit: 50,
            email_enabled: true,
        }
    }
}

/// Storage backend for invitations, audit records, and dispatch settings.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; the store is shared across all
/// in-flight requests.
///
/// # Consistency
///
/// `purge_event` must be all-or-nothing: an event must never lose its
/// invitations while audit records referencing them survive.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Short backend identifier for health reporting.
    fn backend_name(&self) -> &'static str;

    /// Read the engine's view of an event.
    async fn event(&self, event_id: Uuid) -> Result<Option<EventSummary>, StoreError>;

    /// Persist a freshly issued invitation.
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;

    /// Fetch an invitation scoped to its owning event.
    async fn invitation(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Resolve a join token to its invitation.
    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError>;

    /// Flip the active flag, stamping or clearing the deactivation
    /// timestamp. Returns `None` when the invitation does not exist under
    /// the given event.
    async fn set_invitation_active(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
        active: bool,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Remove an invitation (compensating action after an authoritative
    /// quota denial). Returns whether a row was removed.
    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<bool, StoreError>;

    /// Append one immutable audit record.
    async fn append_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// List audit records for an event, newest first, bounded by `limit`.
    async fn audit_records(
        &self,
        event_id: Uuid,
        outcome: Option<DispatchOutcome>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError>;

    /// Count audit records for an operator since the given instant whose
    /// outcome consumes quota. `RATE_LIMITED` rows are rejected attempts,
    /// not consumed quota, and are excluded.
    async fn count_chargeable_dispatches(
        &self,
        operator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Read the current dispatch settings. Called per consultation, never
    /// cached by the engine.
    async fn dispatch_settings(&self) -> Result<DispatchSettings, StoreError>;

    /// Delete an event together with its invitations and every audit record
    /// referencing either, as a single all-or-nothing operation. Returns
    /// whether the event existed.
    async fn purge_event(&self, event_id: Uuid) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = DispatchSettings::default();
        assert_eq!(settings.hourly_limit, 10);
        assert_eq!(settings.daily_limit, 50);
        assert!(settings.email_enabled);
    }
}
