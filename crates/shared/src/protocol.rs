use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CallDirection, CallId, CallRecord, CallStatus, ContactId, TrustedContact},
    phone,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateCallRequest {
    pub to_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiateCallResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub target_number: Option<String>,
    #[serde(default)]
    pub twilio_caller_id: Option<String>,
    #[serde(default)]
    pub call_log_id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteCallRequest {
    pub status: CallStatus,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub call_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatusResponse {
    #[serde(default)]
    pub call_id: Option<i64>,
    pub status: String,
}

/// One row of `GET /multi/user/{id}/calls`. Field names vary between backend revisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub id: i64,
    #[serde(alias = "phone_number", alias = "phoneNumber", alias = "to_number")]
    pub target_number: String,
    #[serde(default, alias = "callerIdShown", alias = "from_number")]
    pub caller_id_shown: Option<String>,
    #[serde(default)]
    pub direction: CallDirection,
    pub status: String,
    #[serde(default, alias = "start_time", alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "duration_seconds")]
    pub duration: u64,
}

impl CallLogEntry {
    /// Converts a backend row into a history record; rows without a terminal status are skipped.
    pub fn into_history_record(self) -> Option<CallRecord> {
        let status = CallStatus::from_remote(&self.status)?;
        if !status.is_terminal() {
            return None;
        }
        Some(CallRecord {
            id: CallId::from_call_log(self.id),
            call_log_id: Some(self.id),
            target_number: phone::to_e164_lossy(&self.target_number),
            caller_id_shown: self.caller_id_shown,
            direction: self.direction,
            status,
            start_time: self.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            duration_seconds: self.duration,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPayload {
    pub id: i64,
    pub phone_number: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub custom_pin: Option<String>,
    #[serde(default)]
    pub auto_whitelisted: bool,
}

impl From<ContactPayload> for TrustedContact {
    fn from(value: ContactPayload) -> Self {
        let phone_number = phone::to_e164_lossy(&value.phone_number);
        let name = value
            .name
            .filter(|name| !name.trim().is_empty())
            .or(value.display_name)
            .unwrap_or_else(|| phone::format_display(&phone_number));
        Self {
            id: ContactId(value.id),
            name,
            phone_number,
            custom_pin: value.custom_pin.filter(|pin| !pin.trim().is_empty()),
            auto_whitelisted: value.auto_whitelisted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContactListResponse {
    Bare(Vec<ContactPayload>),
    Wrapped { contacts: Vec<ContactPayload> },
}

impl ContactListResponse {
    pub fn into_contacts(self) -> Vec<TrustedContact> {
        let payloads = match self {
            Self::Bare(contacts) | Self::Wrapped { contacts } => contacts,
        };
        payloads.into_iter().map(TrustedContact::from).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContactRequest {
    pub phone_number: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_pin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub to_number: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "sid")]
    pub message_sid: Option<String>,
}

/// The subset of `GET /multi/user/{id}/settings` the client reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettingsResponse {
    #[serde(default)]
    pub twilio_number_configured: bool,
}

/// Structured signup body, accepted when the backend sends one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user_id: i64,
    #[serde(default, alias = "defense_number", alias = "twilio_number")]
    pub assigned_number: Option<String>,
}

/// `POST /multi/lookup-user`; the server matches the address case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupUserRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupUserResponse {
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
}
