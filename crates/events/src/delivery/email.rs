//! Best-effort transactional email.
//!
//! [`EmailSideChannel::enqueue`] spawns the send and returns immediately;
//! nothing it does can change the outcome of the dispatch that triggered
//! it. Every attempt for a known kind is written to the email ledger:
//! sent, rejected, timed out, or dropped for want of a contact. There are
//! no retries.

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_core::catalog::EventKind;
use fleetwatch_core::types::DbId;
use fleetwatch_db::models::alert::Alert;
use fleetwatch_db::models::email_log::{NewEmailLog, EMAIL_STATUS_FAILED, EMAIL_STATUS_SENT};
use tokio::task::JoinHandle;

use crate::delivery::provider::{
    HttpMailer, MailError, MailProvider, OutboundEmail, SmtpMailer, SmtpSettings,
    DEFAULT_RESEND_ENDPOINT, DEFAULT_SMTP_PORT,
};
use crate::delivery::templates::render_email;
use crate::error::StoreError;
use crate::store::{Directory, EmailLedger};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("No active contact for recipient {0}")]
    MissingContact(DbId),

    #[error("Alert kind `{0}` is not in the catalog")]
    UnknownKind(String),

    #[error("Contact lookup failed: {0}")]
    Directory(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] MailError),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

const DEFAULT_FROM_ADDRESS: &str = "Fleetwatch Portal <noreply@fleetwatch.local>";
const DEFAULT_PORTAL_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

/// Which provider carries outbound mail.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Smtp(SmtpSettings),
    Resend { endpoint: String, api_key: String },
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: ProviderConfig,
    pub from_address: String,
    pub reply_to: Option<String>,
    /// Base for absolute links in message bodies.
    pub portal_base_url: String,
    pub send_timeout: Duration,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` when `MAIL_PROVIDER` is unset or `none`, or when the
    /// chosen provider is missing its required variable.
    ///
    /// | Variable                  | Default                              |
    /// |---------------------------|--------------------------------------|
    /// | `MAIL_PROVIDER`           | `none` (`smtp`, `resend`)            |
    /// | `SMTP_HOST`               | required for `smtp`                  |
    /// | `SMTP_PORT`               | `587`                                |
    /// | `SMTP_USER`               | -                                    |
    /// | `SMTP_PASSWORD`           | -                                    |
    /// | `RESEND_API_KEY`          | required for `resend`                |
    /// | `RESEND_ENDPOINT`         | `https://api.resend.com/emails`      |
    /// | `EMAIL_FROM`              | `Fleetwatch Portal <noreply@...>`    |
    /// | `EMAIL_REPLY_TO`          | -                                    |
    /// | `PORTAL_BASE_URL`         | `http://localhost:3000`              |
    /// | `EMAIL_SEND_TIMEOUT_SECS` | `10`                                 |
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `var`.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let provider = match var("MAIL_PROVIDER")?.to_lowercase().as_str() {
            "smtp" => ProviderConfig::Smtp(SmtpSettings {
                host: var("SMTP_HOST")?,
                port: var("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_SMTP_PORT),
                user: var("SMTP_USER"),
                password: var("SMTP_PASSWORD"),
            }),
            "resend" => ProviderConfig::Resend {
                endpoint: var("RESEND_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_RESEND_ENDPOINT.to_string()),
                api_key: var("RESEND_API_KEY")?,
            },
            _ => return None,
        };

        Some(Self {
            provider,
            from_address: var("EMAIL_FROM").unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            reply_to: var("EMAIL_REPLY_TO"),
            portal_base_url: var("PORTAL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PORTAL_BASE_URL.to_string()),
            send_timeout: Duration::from_secs(
                var("EMAIL_SEND_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            ),
        })
    }

    /// Build the configured provider.
    pub fn build_provider(&self) -> Result<Arc<dyn MailProvider>, MailError> {
        Ok(match &self.provider {
            ProviderConfig::Smtp(settings) => Arc::new(SmtpMailer::new(settings)?),
            ProviderConfig::Resend { endpoint, api_key } => {
                Arc::new(HttpMailer::new(endpoint.clone(), api_key.clone())?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// EmailSideChannel
// ---------------------------------------------------------------------------

pub struct EmailSideChannel {
    provider: Arc<dyn MailProvider>,
    directory: Arc<dyn Directory>,
    ledger: Arc<dyn EmailLedger>,
    config: EmailConfig,
}

impl EmailSideChannel {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        directory: Arc<dyn Directory>,
        ledger: Arc<dyn EmailLedger>,
        config: EmailConfig,
    ) -> Self {
        Self {
            provider,
            directory,
            ledger,
            config,
        }
    }

    /// Send the email for `alert` on a background task.
    ///
    /// Failures are logged with the alert id, recipient and kind.
    pub fn enqueue(self: &Arc<Self>, alert: Alert) -> JoinHandle<()> {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = channel.deliver(&alert).await {
                tracing::warn!(
                    alert_id = alert.id,
                    recipient_id = alert.recipient_id,
                    kind = %alert.kind,
                    error = %e,
                    "Alert email not delivered",
                );
            }
        })
    }

    /// Render and send the email for `alert`, returning the provider id.
    pub async fn deliver(&self, alert: &Alert) -> Result<String, EmailError> {
        let kind: EventKind = alert
            .event_kind()
            .ok_or_else(|| EmailError::UnknownKind(alert.kind.clone()))?;
        let Some(contact) = self.directory.contact(alert.recipient_id).await? else {
            let err = EmailError::MissingContact(alert.recipient_id);
            self.record(
                alert,
                NewEmailLog {
                    to_email: String::new(),
                    template: kind.email_layout().as_str().to_string(),
                    subject: String::new(),
                    status: EMAIL_STATUS_FAILED.to_string(),
                    provider_id: None,
                    error: Some(err.to_string()),
                    metadata: serde_json::Value::Null,
                },
            )
            .await;
            return Err(err);
        };

        let rendered = render_email(
            kind.email_layout(),
            alert,
            &contact,
            &self.config.portal_base_url,
        );
        let outbound = OutboundEmail {
            from: self.config.from_address.clone(),
            reply_to: self.config.reply_to.clone(),
            to: contact.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
        };

        let result = match tokio::time::timeout(
            self.config.send_timeout,
            self.provider.send(&outbound),
        )
        .await
        {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(e)) => Err(EmailError::Provider(e)),
            Err(_) => Err(EmailError::Timeout(self.config.send_timeout)),
        };

        let entry = NewEmailLog {
            to_email: outbound.to.clone(),
            template: rendered.layout.as_str().to_string(),
            subject: outbound.subject.clone(),
            status: if result.is_ok() {
                EMAIL_STATUS_SENT
            } else {
                EMAIL_STATUS_FAILED
            }
            .to_string(),
            provider_id: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
            metadata: serde_json::Value::Null,
        };
        self.record(alert, entry).await;

        if let Ok(id) = &result {
            tracing::info!(
                alert_id = alert.id,
                recipient_id = alert.recipient_id,
                provider_id = %id,
                "Alert email sent",
            );
        }
        result
    }

    async fn record(&self, alert: &Alert, mut entry: NewEmailLog) {
        entry.metadata = serde_json::json!({
            "alert_id": alert.id,
            "kind": alert.kind,
            "provider": self.provider.name(),
        });
        if let Err(e) = self.ledger.record(entry).await {
            tracing::error!(alert_id = alert.id, error = %e, "Failed to record email attempt");
        }
    }
}
