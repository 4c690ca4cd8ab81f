use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ContactId);

/// Client-side identity of a call. Exists before the backend assigns a call log id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Stable id for a record that only exists on the backend.
    pub fn from_call_log(call_log_id: i64) -> Self {
        Self(Uuid::from_u64_pair(0, call_log_id as u64))
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    #[default]
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiating,
    Connected,
    Completed,
    Failed,
    Cancelled,
    AutoCompleted,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::AutoCompleted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiating => "initiating",
            Self::Connected => "connected",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::AutoCompleted => "auto_completed",
        }
    }

    /// Maps the status vocabulary the backend and carrier use onto the local lifecycle.
    pub fn from_remote(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let status = match normalized.as_str() {
            "initiating" | "queued" | "ringing" | "initiated" | "simulated" => Self::Initiating,
            "connected" | "in_progress" | "answered" => Self::Connected,
            "completed" => Self::Completed,
            "failed" | "busy" | "no_answer" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            "auto_completed" => Self::AutoCompleted,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_log_id: Option<i64>,
    pub target_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_shown: Option<String>,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
}

impl CallRecord {
    pub fn outbound_initiating(target_number: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: CallId::new(),
            call_log_id: None,
            target_number: target_number.into(),
            caller_id_shown: None,
            direction: CallDirection::Outbound,
            status: CallStatus::Initiating,
            start_time,
            duration_seconds: 0,
        }
    }

    /// Copy of this record moved into a terminal status.
    pub fn finished(&self, status: CallStatus, duration_seconds: u64) -> Self {
        Self {
            status,
            duration_seconds,
            ..self.clone()
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_seconds().max(0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedContact {
    pub id: ContactId,
    pub name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_pin: Option<String>,
    #[serde(default)]
    pub auto_whitelisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub name: String,
    pub phone_number: String,
    pub custom_pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_number: Option<String>,
}

/// The durable authentication record; persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub authenticated: bool,
    pub user_id: Option<UserId>,
    pub display_name: String,
    pub email: String,
    pub assigned_number: Option<String>,
}

impl Session {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            authenticated: true,
            user_id: Some(profile.user_id),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            assigned_number: profile.assigned_number.clone(),
        }
    }

    pub fn profile(&self) -> Option<UserProfile> {
        Some(UserProfile {
            user_id: self.user_id?,
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            assigned_number: self.assigned_number.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: bool,
    pub sound: bool,
    pub vibration: bool,
    pub theme: Theme,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: true,
            sound: true,
            vibration: true,
            theme: Theme::Light,
            language: "en".into(),
        }
    }
}

impl Settings {
    /// Shallow merge: every field present in `patch` wins.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            notifications: patch.notifications.unwrap_or(self.notifications),
            sound: patch.sound.unwrap_or(self.sound),
            vibration: patch.vibration.unwrap_or(self.vibration),
            theme: patch.theme.unwrap_or(self.theme),
            language: patch
                .language
                .clone()
                .unwrap_or_else(|| self.language.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl From<Settings> for SettingsPatch {
    fn from(value: Settings) -> Self {
        Self {
            notifications: Some(value.notifications),
            sound: Some(value.sound),
            vibration: Some(value.vibration),
            theme: Some(value.theme),
            language: Some(value.language),
        }
    }
}
