//! E-mail delivery of the figure archive.
//!
//! The transport is a trait seam so the pipeline can be exercised in tests
//! with a recording transport instead of a live SMTP session.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::DeliveryError;

/// A fully assembled outgoing message, transport-agnostic.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

/// Something that can deliver an [`OutgoingMail`].
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}

/// Authenticated implicit-TLS SMTP delivery via lettre.
pub struct SmtpMailer {
    server: String,
    port: u16,
    password: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SmtpMailer {
    /// Credentials come from the explicit password or the `EMAIL_PASSWORD`
    /// environment variable, in that order.
    pub fn new(
        server: String,
        port: u16,
        password: Option<String>,
    ) -> Result<Self, DeliveryError> {
        let password = password
            .or_else(|| std::env::var("EMAIL_PASSWORD").ok())
            .ok_or(DeliveryError::MissingCredentials)?;
        Ok(Self {
            server,
            port,
            password,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|source| DeliveryError::Address {
        address: address.to_string(),
        source,
    })
}

/// Build the MIME message: plain text body plus one zip attachment.
fn build_message(mail: &OutgoingMail) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&mail.sender)?)
        .subject(mail.subject.clone());
    for recipient in &mail.recipients {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    let zip_type = ContentType::parse("application/zip").expect("static MIME type is valid");
    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(mail.body.clone()))
            .singlepart(Attachment::new(mail.attachment_name.clone()).body(
                mail.attachment.clone(),
                zip_type,
            )),
    )?;
    Ok(message)
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let message = build_message(mail)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)?
            .port(self.port)
            .credentials(Credentials::new(
                mail.sender.clone(),
                self.password.clone(),
            ))
            .build();

        transport.send(message).await?;
        info!(
            recipients = mail.recipients.len(),
            attachment = %mail.attachment_name,
            "E-mail sent"
        );
        Ok(())
    }
}
