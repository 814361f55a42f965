//! Outreach email dispatch over authenticated STARTTLS SMTP.

pub mod message;

pub use message::{compose, html_body, subject_for};

use std::path::PathBuf;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{error, info, instrument};

use pagepitch_shared::{LeadRecord, PagePitchError, PerformanceReport, Result, SmtpConfig};

/// Why a message was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchFailure {
    #[error("invalid recipient address {0}")]
    Address(String),

    #[error("could not read attachment {0}")]
    Attachment(String),

    #[error("could not build message: {0}")]
    Compose(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Sends composed reports through one SMTP submission server.
pub struct SmtpDispatcher {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpDispatcher")
            .field("sender", &self.sender.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpDispatcher {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let sender: Mailbox = config.address.parse().map_err(|e| {
            PagePitchError::config(format!("invalid sender address '{}': {e}", config.address))
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| PagePitchError::config(format!("invalid SMTP host '{}': {e}", config.host)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.address.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self { sender, transport })
    }

    /// Compose and submit one message. Failures are logged with the recipient.
    #[instrument(skip_all, fields(recipient = %lead.email))]
    pub async fn send(
        &self,
        lead: &LeadRecord,
        report: &PerformanceReport,
        attachments: &[PathBuf],
    ) -> std::result::Result<(), DispatchFailure> {
        let result = self.submit(lead, report, attachments).await;
        match &result {
            Ok(()) => info!(website = %lead.website, "report email submitted"),
            Err(e) => error!(recipient = %lead.email, error = %e, "SMTP error"),
        }
        result
    }

    async fn submit(
        &self,
        lead: &LeadRecord,
        report: &PerformanceReport,
        attachments: &[PathBuf],
    ) -> std::result::Result<(), DispatchFailure> {
        let message = compose(&self.sender, lead, report, attachments).await?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DispatchFailure::Transport(e.to_string()))?;
        Ok(())
    }
}
