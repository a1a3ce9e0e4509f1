//! SMTP delivery via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use super::{InviteEmail, InviteTransport, TransportError};

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@gather.local".to_string()
}

/// SMTP connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Default RFC 5322 "From" address
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Optional SMTP username
    #[serde(default)]
    pub username: Option<String>,
    /// Optional SMTP password
    #[serde(default)]
    pub password: Option<String>,
}

/// Sends invitation emails through an async SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    default_from: String,
}

impl SmtpTransport {
    /// Build the relay once at startup; individual sends reuse it.
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            default_from: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl InviteTransport for SmtpTransport {
    async fn send(&self, email: &InviteEmail) -> Result<(), TransportError> {
        let from = email.from.as_deref().unwrap_or(&self.default_from);

        let message = Message::builder()
            .from(from.parse()?)
            .to(email.to.parse()?)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.mailer.send(message).await?;

        tracing::info!(to = %email.to, "Invitation email sent");
        Ok(())
    }
}
