//! services/api/src/adapters/mailer.rs
//!
//! Implementations of the `NotificationService` port: an SMTP relay via `lettre`,
//! and a logging fallback for deployments without mail settings.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};
use vibeprep_core::ports::{NotificationService, OutgoingEmail, PortError, PortResult};

use crate::config::MailConfig;

//=========================================================================================
// SMTP
//=========================================================================================

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the relay transport. Port 465 uses implicit TLS, anything else STARTTLS.
    pub fn new(config: &MailConfig) -> PortResult<Self> {
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        }
        .map_err(|e| PortError::Unexpected(format!("Invalid SMTP relay: {e}")))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("Invalid MAIL_FROM address: {e}")))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationService for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML);
        for recipient in &email.recipients {
            let mailbox = recipient.parse::<Mailbox>().map_err(|e| {
                PortError::Unexpected(format!("Invalid recipient '{recipient}': {e}"))
            })?;
            builder = builder.to(mailbox);
        }
        let message = builder
            .body(email.html_body.clone())
            .map_err(|e| PortError::Unexpected(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("SMTP delivery failed: {e}")))?;

        info!(recipients = ?email.recipients, "Email sent: {}", email.subject);
        Ok(())
    }
}

//=========================================================================================
// Logging fallback
//=========================================================================================

/// Writes messages to the log instead of delivering them. Local development only.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl NotificationService for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()> {
        info!(
            recipients = ?email.recipients,
            "MAIL_SERVER not configured; not delivering '{}'",
            email.subject
        );
        debug!("{}", email.html_body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = OutgoingEmail {
            recipients: vec!["ada@example.com".into()],
            subject: "Hello".into(),
            html_body: "<p>hi</p>".into(),
        };
        assert!(LogMailer.send(&email).await.is_ok());
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_a_bad_sender() {
        let config = MailConfig {
            server: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
