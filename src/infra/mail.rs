//! Mail transports behind the [`Mailer`] port.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use crate::application::mail::{MailError, Mailer, OutgoingEmail};
use crate::config::{MailBackend, MailSettings};

/// Build the mailer selected by configuration.
pub fn build_mailer(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    match settings.backend {
        MailBackend::Smtp => Ok(Arc::new(SmtpMailer::new(settings)?)),
        MailBackend::Log => Ok(Arc::new(LogMailer)),
    }
}

/// Sends through an SMTP relay using lettre's pooled async transport.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let smtp = &settings.smtp;
        let mut builder = if smtp.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                .map_err(|err| MailError::Transport(err.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        };

        builder = builder.port(smtp.port).timeout(Some(settings.timeout));

        if let Some(username) = smtp.username.as_ref() {
            let password = smtp.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(email)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|err| MailError::Transport(err.to_string()))
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        build_message(email)?;
        info!(
            target = "quire::infra::mail",
            from = %email.from,
            to = ?email.to,
            subject = %email.subject,
            body = %email.body,
            "outgoing email (log backend)"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| MailError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

/// Plain-text message for the given envelope.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN);

    for recipient in &email.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    builder
        .body(email.body.clone())
        .map_err(|err| MailError::Build(err.to_string()))
}
