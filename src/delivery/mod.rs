//! Pluggable delivery transport.
//!
//! The dispatch engine treats delivery as a black box behind the
//! [`InviteTransport`] trait: it hands over a fully rendered message and
//! observes success or failure. The SMTP implementation lives in
//! [`smtp`]; tests substitute mocks.

mod smtp;

pub use smtp::{SmtpConfig, SmtpTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Longest error description recorded in the audit trail.
const MAX_REASON_LENGTH: usize = 200;

/// A fully rendered invitation message ready for delivery.
#[derive(Debug, Clone)]
pub struct InviteEmail {
    pub to: String,
    /// Per-event sender identity, falling back to the deployment default
    pub from: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Errors a transport can surface.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The recipient or sender address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled
    #[error("Email build error: {0}")]
    Build(String),

    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl TransportError {
    /// Short description safe for the audit trail: bounded length, no
    /// credentials, no stack traces.
    pub fn short_reason(&self) -> String {
        let mut reason = self.to_string();
        if reason.len() > MAX_REASON_LENGTH {
            reason.truncate(MAX_REASON_LENGTH);
            reason.push_str("...");
        }
        reason
    }
}

/// Sends rendered invitation messages.
///
/// Implementations must be `Send + Sync`. A send either succeeds or fails;
/// there is no retry inside the transport — failures surface to the engine
/// so they are always recorded and visible.
#[async_trait]
pub trait InviteTransport: Send + Sync {
    async fn send(&self, email: &InviteEmail) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reason_is_bounded() {
        let err = TransportError::Build("x".repeat(500));
        let reason = err.short_reason();
        assert!(reason.len() <= MAX_REASON_LENGTH + 3);
        assert!(reason.ends_with("..."));
    }

    #[test]
    fn test_short_reason_keeps_small_messages() {
        let err = TransportError::Build("relay rejected sender".to_string());
        assert_eq!(err.short_reason(), "Email build error: relay rejected sender");
    }
}
