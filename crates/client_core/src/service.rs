use async_trait::async_trait;
use shared::{
    domain::{CallRecord, CallStatus, ContactId, NewContact, TrustedContact, UserId},
    protocol::{CompletionAck, MessageReceipt},
};

use crate::{error::ServiceResult, signup::SignupForm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedCall {
    pub call_log_id: i64,
    pub target_number: String,
    pub caller_id_shown: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub user_id: UserId,
    pub assigned_number: Option<String>,
}

/// An existing account found by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLookup {
    pub user_id: UserId,
    pub name: String,
}

/// Status the backend reports for a call log; `status` is `None` for vocabulary we do not map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCallStatus {
    pub call_log_id: i64,
    pub status: Option<CallStatus>,
    pub raw: String,
}

/// Backend operations the session store depends on. Implementations hold no per-user state
/// and never retry.
#[async_trait]
pub trait CallService: Send + Sync {
    async fn initiate_call(
        &self,
        user_id: Option<UserId>,
        target_number: &str,
    ) -> ServiceResult<InitiatedCall>;

    async fn complete_call(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
        duration_seconds: u64,
        status: CallStatus,
    ) -> ServiceResult<CompletionAck>;

    async fn call_status(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
    ) -> ServiceResult<RemoteCallStatus>;

    /// Never fails: an unavailable history yields the configured fallback.
    async fn call_history(&self, user_id: Option<UserId>, limit: u32, offset: u32)
        -> Vec<CallRecord>;

    async fn list_contacts(&self, user_id: Option<UserId>) -> ServiceResult<Vec<TrustedContact>>;

    async fn add_contact(
        &self,
        user_id: Option<UserId>,
        contact: &NewContact,
    ) -> ServiceResult<TrustedContact>;

    async fn remove_contact(&self, user_id: Option<UserId>, contact_id: ContactId)
        -> ServiceResult<()>;

    async fn send_message(
        &self,
        user_id: Option<UserId>,
        to_number: &str,
        body: &str,
    ) -> ServiceResult<MessageReceipt>;

    /// `false` without a user or on any failure.
    async fn check_voice_ready(&self, user_id: Option<UserId>) -> bool;

    async fn signup(&self, form: &SignupForm) -> ServiceResult<SignupOutcome>;

    /// Resolves an existing account; an unregistered address is `UnknownAccount`.
    async fn lookup_user(&self, email: &str) -> ServiceResult<AccountLookup>;
}

pub(crate) fn require_user(user_id: Option<UserId>) -> ServiceResult<UserId> {
    user_id.ok_or(crate::error::ServiceError::AuthRequired)
}
