use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex as StdMutex,
};

use async_trait::async_trait;
use shared::{
    domain::{CallRecord, CallStatus, ContactId, NewContact, TrustedContact, UserId},
    protocol::{CompletionAck, MessageReceipt},
};
use tokio::sync::Notify;

use crate::{
    error::{ServiceError, ServiceResult},
    service::{
        require_user, AccountLookup, CallService, InitiatedCall, RemoteCallStatus, SignupOutcome,
    },
    signup::SignupForm,
};

pub(crate) const CALLER_ID: &str = "+15550000001";
pub(crate) const ASSIGNED_NUMBER: &str = "+15550001111";
pub(crate) const JANE_EMAIL: &str = "jane@example.com";

pub(crate) type Gate = StdMutex<Option<Arc<Notify>>>;

/// Holds a request until the test releases the gate with `notify_one`.
async fn pass(gate: &Gate) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

/// Scripted backend that records every request it receives.
pub(crate) struct FakeCallService {
    requests: StdMutex<Vec<&'static str>>,
    next_call_log_id: AtomicI64,
    pub initiate_error: StdMutex<Option<String>>,
    pub initiate_gate: Gate,
    pub complete_gate: Gate,
    pub history_gate: Gate,
    pub contacts_gate: Gate,
    pub voice_gate: Gate,
    pub completions: StdMutex<Vec<(i64, u64, CallStatus)>>,
    pub remote_status: StdMutex<String>,
    pub history: StdMutex<Vec<CallRecord>>,
    pub contacts: StdMutex<Vec<TrustedContact>>,
    pub contacts_fail: AtomicBool,
    pub voice_ready: AtomicBool,
}

impl Default for FakeCallService {
    fn default() -> Self {
        Self {
            requests: StdMutex::new(Vec::new()),
            next_call_log_id: AtomicI64::new(100),
            initiate_error: StdMutex::new(None),
            initiate_gate: StdMutex::new(None),
            complete_gate: StdMutex::new(None),
            history_gate: StdMutex::new(None),
            contacts_gate: StdMutex::new(None),
            voice_gate: StdMutex::new(None),
            completions: StdMutex::new(Vec::new()),
            remote_status: StdMutex::new("in_progress".into()),
            history: StdMutex::new(Vec::new()),
            contacts: StdMutex::new(Vec::new()),
            contacts_fail: AtomicBool::new(false),
            voice_ready: AtomicBool::new(true),
        }
    }
}

impl FakeCallService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn count(&self, operation: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|name| **name == operation)
            .count()
    }

    /// Resolves once `operation` has been received `times` times, gated or not.
    pub(crate) async fn wait_for(&self, operation: &str, times: usize) {
        for _ in 0..500 {
            if self.count(operation) >= times {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        panic!("{operation} was not requested {times} time(s)");
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record(&self, operation: &'static str) {
        self.requests.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl CallService for FakeCallService {
    async fn initiate_call(
        &self,
        user_id: Option<UserId>,
        target_number: &str,
    ) -> ServiceResult<InitiatedCall> {
        self.record("initiate_call");
        require_user(user_id)?;
        pass(&self.initiate_gate).await;
        if let Some(err) = self.initiate_error.lock().unwrap().clone() {
            return Err(ServiceError::CallFailed(err));
        }
        Ok(InitiatedCall {
            call_log_id: self.next_call_log_id.fetch_add(1, Ordering::SeqCst),
            target_number: target_number.to_string(),
            caller_id_shown: CALLER_ID.into(),
        })
    }

    async fn complete_call(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
        duration_seconds: u64,
        status: CallStatus,
    ) -> ServiceResult<CompletionAck> {
        self.record("complete_call");
        require_user(user_id)?;
        pass(&self.complete_gate).await;
        self.completions
            .lock()
            .unwrap()
            .push((call_log_id, duration_seconds, status));
        Ok(CompletionAck {
            success: true,
            call_id: Some(call_log_id),
        })
    }

    async fn call_status(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
    ) -> ServiceResult<RemoteCallStatus> {
        self.record("call_status");
        require_user(user_id)?;
        let raw = self.remote_status.lock().unwrap().clone();
        Ok(RemoteCallStatus {
            call_log_id,
            status: CallStatus::from_remote(&raw),
            raw,
        })
    }

    async fn call_history(
        &self,
        _user_id: Option<UserId>,
        _limit: u32,
        _offset: u32,
    ) -> Vec<CallRecord> {
        self.record("call_history");
        pass(&self.history_gate).await;
        self.history.lock().unwrap().clone()
    }

    async fn list_contacts(&self, user_id: Option<UserId>) -> ServiceResult<Vec<TrustedContact>> {
        self.record("list_contacts");
        require_user(user_id)?;
        pass(&self.contacts_gate).await;
        if self.contacts_fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("contacts unavailable".into()));
        }
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn add_contact(
        &self,
        user_id: Option<UserId>,
        contact: &NewContact,
    ) -> ServiceResult<TrustedContact> {
        self.record("add_contact");
        require_user(user_id)?;
        let mut contacts = self.contacts.lock().unwrap();
        let added = TrustedContact {
            id: ContactId(contacts.len() as i64 + 1),
            name: contact.name.clone(),
            phone_number: contact.phone_number.clone(),
            custom_pin: contact.custom_pin.clone(),
            auto_whitelisted: false,
        };
        contacts.push(added.clone());
        Ok(added)
    }

    async fn remove_contact(
        &self,
        user_id: Option<UserId>,
        contact_id: ContactId,
    ) -> ServiceResult<()> {
        self.record("remove_contact");
        require_user(user_id)?;
        self.contacts
            .lock()
            .unwrap()
            .retain(|contact| contact.id != contact_id);
        Ok(())
    }

    async fn send_message(
        &self,
        user_id: Option<UserId>,
        _to_number: &str,
        _body: &str,
    ) -> ServiceResult<MessageReceipt> {
        self.record("send_message");
        require_user(user_id)?;
        Ok(MessageReceipt {
            success: true,
            message_sid: Some("SM-test".into()),
        })
    }

    async fn check_voice_ready(&self, user_id: Option<UserId>) -> bool {
        self.record("check_voice_ready");
        pass(&self.voice_gate).await;
        user_id.is_some() && self.voice_ready.load(Ordering::SeqCst)
    }

    async fn signup(&self, form: &SignupForm) -> ServiceResult<SignupOutcome> {
        self.record("signup");
        form.validate().map_err(ServiceError::Validation)?;
        Ok(SignupOutcome {
            user_id: UserId(7),
            assigned_number: Some(ASSIGNED_NUMBER.into()),
        })
    }

    async fn lookup_user(&self, email: &str) -> ServiceResult<AccountLookup> {
        self.record("lookup_user");
        let email = email.trim().to_lowercase();
        if email != JANE_EMAIL {
            return Err(ServiceError::UnknownAccount(email));
        }
        Ok(AccountLookup {
            user_id: UserId(7),
            name: "Jane".into(),
        })
    }
}

pub(crate) fn jane_form() -> SignupForm {
    SignupForm {
        name: "Jane".into(),
        email: JANE_EMAIL.into(),
        real_phone_number: "(555) 123-4567".into(),
        pin: "1234".into(),
        verbal_code: "blue".into(),
    }
}
