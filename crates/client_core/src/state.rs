use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::domain::{
    CallId, CallRecord, CallStatus, ContactId, Session, Settings, SettingsPatch, TrustedContact,
    UserId, UserProfile,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub session: Session,
    pub loading: bool,
    pub error: Option<String>,
    pub active_calls: HashMap<CallId, CallRecord>,
    /// Most recent first.
    pub call_history: Vec<CallRecord>,
    pub contacts: Vec<TrustedContact>,
    pub settings: Settings,
    pub voice_ready: bool,
}

impl SessionState {
    /// The signed-in user, if any. A stored id without authentication does not count.
    pub fn user_id(&self) -> Option<UserId> {
        self.session
            .authenticated
            .then_some(self.session.user_id)
            .flatten()
    }

    pub fn active_call(&self, id: CallId) -> Option<&CallRecord> {
        self.active_calls.get(&id)
    }

    pub fn history_call(&self, id: CallId) -> Option<&CallRecord> {
        self.call_history.iter().find(|call| call.id == id)
    }

    pub fn find_call(&self, id: CallId) -> Option<&CallRecord> {
        self.active_call(id).or_else(|| self.history_call(id))
    }
}

/// Fields an `update_call` may change on an active record. Terminal statuses are refused.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallUpdate {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_log_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_shown: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    SetAuthenticated(bool),
    SetUser(Option<UserProfile>),
    SetLoading(bool),
    SetError(Option<String>),
    AddCall(CallRecord),
    UpdateCall(CallUpdate),
    /// Carries the record already moved into its terminal status.
    CompleteCall(CallRecord),
    SetCallHistory(Vec<CallRecord>),
    AddContact(TrustedContact),
    RemoveContact(ContactId),
    SetContacts(Vec<TrustedContact>),
    UpdateSettings(SettingsPatch),
    SetVoiceReady(bool),
    Logout,
    #[serde(other)]
    Unknown,
}
