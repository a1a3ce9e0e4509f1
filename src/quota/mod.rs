//! Sliding-window dispatch quota.
//!
//! The ledger does not keep its own counters; it derives the count from the
//! audit trail on every check, so quota accounting can never drift from the
//! records. Dispatch is operator-triggered and low-frequency, which makes
//! the extra read per check an acceptable price for a single source of
//! truth.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::storage::{DispatchStore, StoreError};

/// The two rolling windows a dispatch is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindow {
    Hourly,
    Daily,
}

impl QuotaWindow {
    fn span(&self) -> Duration {
        match self {
            QuotaWindow::Hourly => Duration::hours(1),
            QuotaWindow::Daily => Duration::hours(24),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            QuotaWindow::Hourly => "hour",
            QuotaWindow::Daily => "24 hours",
        }
    }

    /// Suggested wait before retrying, in seconds.
    fn retry_hint_seconds(&self) -> u64 {
        match self {
            QuotaWindow::Hourly => 3600,
            QuotaWindow::Daily => 86_400,
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone)]
pub enum QuotaDecision {
    Allowed,
    Denied {
        window: QuotaWindow,
        limit: u32,
        message: String,
        retry_after_seconds: u64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }

    fn denied(window: QuotaWindow, limit: u32) -> Self {
        QuotaDecision::Denied {
            window,
            limit,
            message: format!(
                "Invitation limit of {} per {} reached, please try again later",
                limit,
                window.label()
            ),
            retry_after_seconds: window.retry_hint_seconds(),
        }
    }
}

/// Counts past dispatches per operator against the configured ceilings.
pub struct QuotaLedger {
    store: Arc<dyn DispatchStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self { store }
    }

    /// Check whether an operator may dispatch at `now`.
    ///
    /// Ceilings are read from the store on every call so central updates
    /// take effect immediately. The hourly window is evaluated first and an
    /// exhausted hourly ceiling short-circuits without touching the daily
    /// window. A ceiling of 0 means that window is unlimited.
    pub async fn check(
        &self,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, StoreError> {
        let settings = self.store.dispatch_settings().await?;

        if settings.hourly_limit > 0 {
            let since = now - QuotaWindow::Hourly.span();
            let count = self
                .store
                .count_chargeable_dispatches(operator_id, since)
                .await?;
            if count >= settings.hourly_limit as u64 {
                tracing::debug!(
                    operator_id = %operator_id,
                    count = count,
                    limit = settings.hourly_limit,
                    "Hourly dispatch quota exhausted"
                );
                return Ok(QuotaDecision::denied(
                    QuotaWindow::Hourly,
                    settings.hourly_limit,
                ));
            }
        }

        if settings.daily_limit > 0 {
            let since = now - QuotaWindow::Daily.span();
            let count = self
                .store
                .count_chargeable_dispatches(operator_id, since)
                .await?;
            if count >= settings.daily_limit as u64 {
                tracing::debug!(
                    operator_id = %operator_id,
                    count = count,
                    limit = settings.daily_limit,
                    "Daily dispatch quota exhausted"
                );
                return Ok(QuotaDecision::denied(
                    QuotaWindow::Daily,
                    settings.daily_limit,
                ));
            }
        }

        Ok(QuotaDecision::Allowed)
    }
}
