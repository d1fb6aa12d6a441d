//! Mail providers.
//!
//! [`MailProvider`] is the seam between the email side-channel and the
//! outside world. [`SmtpMailer`] speaks SMTP through `lettre`;
//! [`HttpMailer`] posts to a Resend-compatible HTTP API.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered but refused the message.
    #[error("Provider rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// A fully rendered message ready to hand to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub reply_to: Option<String>,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Submit the message; returns the provider's message id.
    async fn send(&self, email: &OutboundEmail) -> Result<String, MailError>;

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Sends through an SMTP relay with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.user, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl MailProvider for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String, MailError> {
        let mut builder = Message::builder()
            .from(email.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML);
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }
        let message = builder
            .body(email.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        let response = self.transport.send(message).await?;
        Ok(response.message().collect::<Vec<_>>().join(" "))
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

// ---------------------------------------------------------------------------
// HTTP (Resend-compatible)
// ---------------------------------------------------------------------------

pub const DEFAULT_RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Request timeout for the HTTP client itself; the side-channel applies its
/// own bound on top.
const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct SendAccepted {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendRefused {
    #[serde(default)]
    message: Option<String>,
}

/// Posts `{from, to, subject, html}` JSON with a bearer API key.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl MailProvider for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String, MailError> {
        let mut body = serde_json::json!({
            "from": email.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
        });
        if let Some(reply_to) = &email.reply_to {
            body["reply_to"] = serde_json::Value::String(reply_to.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let accepted: SendAccepted = response.json().await?;
            Ok(accepted.id)
        } else {
            let message = response
                .json::<SendRefused>()
                .await
                .ok()
                .and_then(|r| r.message)
                .unwrap_or_else(|| "Failed to send email".to_string());
            Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
