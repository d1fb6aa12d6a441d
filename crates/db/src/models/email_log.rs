//! Email ledger models.

pub const EMAIL_STATUS_SENT: &str = "sent";
pub const EMAIL_STATUS_FAILED: &str = "failed";

/// DTO for recording one send attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmailLog {
    pub to_email: String,
    pub template: String,
    pub subject: String,
    pub status: String,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
}
