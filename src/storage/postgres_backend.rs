//! PostgreSQL store backend.
//!
//! Production implementation of [`DispatchStore`] on top of sqlx. Enum
//! fields are stored as text and validated on the way out; `purge_event`
//! wraps its multi-row delete in one transaction so a partially deleted
//! event can never be observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditRecord, DispatchOutcome};
use crate::event::EventSummary;
use crate::invitation::{DeliveryMethod, Invitation};

use super::{DispatchSettings, DispatchStore, StoreError};

type InvitationRow = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

type AuditRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    DateTime<Utc>,
);

const INVITATION_COLUMNS: &str =
    "id, event_id, token, delivery, recipient, is_active, created_at, deactivated_at, used_at";

const AUDIT_COLUMNS: &str =
    "id, event_id, invitation_id, operator_id, recipient, subject, outcome, error_message, created_at";

/// PostgreSQL-backed store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn invitation_from_row(row: InvitationRow) -> Result<Invitation, StoreError> {
        let (id, event_id, token, delivery, recipient, is_active, created_at, deactivated_at, used_at) =
            row;
        let delivery = DeliveryMethod::parse(&delivery)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown delivery method '{delivery}'")))?;
        Ok(Invitation {
            id,
            event_id,
            token,
            delivery,
            recipient,
            is_active,
            created_at,
            deactivated_at,
            used_at,
        })
    }

    fn audit_from_row(row: AuditRow) -> Result<AuditRecord, StoreError> {
        let (id, event_id, invitation_id, operator_id, recipient, subject, outcome, error_message, created_at) =
            row;
        let outcome = DispatchOutcome::parse(&outcome)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown outcome '{outcome}'")))?;
        Ok(AuditRecord {
            id,
            event_id,
            invitation_id,
            operator_id,
            recipient,
            subject,
            outcome,
            error_message,
            created_at,
        })
    }
}

#[async_trait]
impl DispatchStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn event(&self, event_id: Uuid) -> Result<Option<EventSummary>, StoreError> {
        let row: Option<(
            Uuid,
            String,
            Option<String>,
            DateTime<Utc>,
            DateTime<Utc>,
            Option<String>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT id, name, description, starts_at, ends_at,
                   sender_address, subject_template, body_template
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, name, description, starts_at, ends_at, sender_address, subject_template, body_template)| {
                EventSummary {
                    id,
                    name,
                    description,
                    starts_at,
                    ends_at,
                    sender_address,
                    subject_template,
                    body_template,
                }
            },
        ))
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO invitations
                (id, event_id, token, delivery, recipient, is_active, created_at, deactivated_at, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.event_id)
        .bind(&invitation.token)
        .bind(invitation.delivery.as_str())
        .bind(&invitation.recipient)
        .bind(invitation.is_active)
        .bind(invitation.created_at)
        .bind(invitation.deactivated_at)
        .bind(invitation.used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invitation(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE event_id = $1 AND id = $2"
        ))
        .bind(event_id)
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::invitation_from_row).transpose()
    }

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::invitation_from_row).transpose()
    }

    async fn set_invitation_active(
        &self,
        event_id: Uuid,
        invitation_id: Uuid,
        active: bool,
    ) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE invitations
            SET is_active = $3,
                deactivated_at = CASE WHEN $3 THEN NULL ELSE NOW() END
            WHERE event_id = $1 AND id = $2
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(invitation_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::invitation_from_row).transpose()
    }

    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records
                (id, event_id, invitation_id, operator_id, recipient, subject, outcome, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.event_id)
        .bind(record.invitation_id)
        .bind(&record.operator_id)
        .bind(&record.recipient)
        .bind(&record.subject)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn audit_records(
        &self,
        event_id: Uuid,
        outcome: Option<DispatchOutcome>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_records
            WHERE event_id = $1 AND ($2::text IS NULL OR outcome = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(event_id)
        .bind(outcome.map(|o| o.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::audit_from_row).collect()
    }

    async fn count_chargeable_dispatches(
        &self,
        operator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM audit_records
            WHERE operator_id = $1 AND created_at >= $2 AND outcome <> 'RATE_LIMITED'
            "#,
        )
        .bind(operator_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn dispatch_settings(&self) -> Result<DispatchSettings, StoreError> {
        let row: Option<(i32, i32, bool)> = sqlx::query_as(
            "SELECT hourly_limit, daily_limit, email_enabled FROM dispatch_settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((hourly, daily, email_enabled)) => DispatchSettings {
                hourly_limit: hourly.max(0) as u32,
                daily_limit: daily.max(0) as u32,
                email_enabled,
            },
            None => DispatchSettings::default(),
        })
    }

    async fn purge_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM audit_records WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM invitations WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let existed = result.rows_affected() > 0;
        if existed {
            tracing::info!(event_id = %event_id, "Purged event with invitations and audit trail");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_row_mapping() {
        let id = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let now = Utc::now();
        let row: InvitationRow = (
            id,
            event_id,
            "tok".to_string(),
            "EMAIL".to_string(),
            Some("guest@example.com".to_string()),
            true,
            now,
            None,
            None,
        );

        let invitation = PostgresStore::invitation_from_row(row).unwrap();
        assert_eq!(invitation.id, id);
        assert_eq!(invitation.delivery, DeliveryMethod::Email);
    }

    #[test]
    fn test_corrupt_delivery_is_rejected() {
        let row: InvitationRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "tok".to_string(),
            "FAX".to_string(),
            None,
            true,
            Utc::now(),
            None,
            None,
        );

        let err = PostgresStore::invitation_from_row(row).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_corrupt_outcome_is_rejected() {
        let row: AuditRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            None,
            None,
            None,
            "MAYBE".to_string(),
            None,
            Utc::now(),
        );

        let err = PostgresStore::audit_from_row(row).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
