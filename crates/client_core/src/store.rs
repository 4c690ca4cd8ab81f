use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join;
use shared::{
    domain::{
        CallId, CallRecord, CallStatus, ContactId, NewContact, Session, Settings, SettingsPatch,
        TrustedContact, UserId, UserProfile,
    },
    error::ValidationError,
    phone,
    protocol::MessageReceipt,
    validation::validate_email,
};
use storage::{load_json, save_json, KeyValueStore};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::{ServiceError, ServiceResult},
    reducer::reduce,
    service::{AccountLookup, CallService},
    signup::SignupForm,
    state::{Action, CallUpdate, SessionState},
};

pub const SESSION_KEY: &str = "session";
pub const SETTINGS_KEY: &str = "settings";
pub const CONTACTS_KEY: &str = "contacts";

const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub history_page_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

/// Owns the session state and funnels every write through the reducer.
///
/// Network calls never run while the state lock is held; each dispatch is a single atomic
/// reducer step, so concurrent operations cannot observe a half-applied transition. Decisions
/// that depend on current state (is this call still active, is this user still signed in) are
/// made inside the same locked step that applies them.
pub struct SessionStore {
    service: Arc<dyn CallService>,
    persistence: Arc<dyn KeyValueStore>,
    options: StoreOptions,
    state: Mutex<Arc<SessionState>>,
    events: broadcast::Sender<Arc<SessionState>>,
    // Orders contact-cache writes against logout's removal of the cache.
    cache_lock: Mutex<()>,
    // Held across merge, save and dispatch so disk and state see patches in the same order.
    settings_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(service: Arc<dyn CallService>, persistence: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Self::with_options(service, persistence, StoreOptions::default())
    }

    pub fn with_options(
        service: Arc<dyn CallService>,
        persistence: Arc<dyn KeyValueStore>,
        options: StoreOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            service,
            persistence,
            options,
            state: Mutex::new(Arc::new(SessionState::default())),
            events,
            cache_lock: Mutex::new(()),
            settings_lock: Mutex::new(()),
        })
    }

    pub async fn state(&self) -> Arc<SessionState> {
        Arc::clone(&*self.state.lock().await)
    }

    /// Receives every state snapshot that differs from the previous one.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionState>> {
        self.events.subscribe()
    }

    pub(crate) async fn dispatch(&self, action: Action) -> Arc<SessionState> {
        let mut guard = self.state.lock().await;
        self.apply(&mut *guard, &action)
    }

    /// Builds an action from the current state and applies it under one lock. `build` returning
    /// `None` leaves the state untouched.
    pub(crate) async fn dispatch_with<T>(
        &self,
        build: impl FnOnce(&SessionState) -> Option<(Action, T)>,
    ) -> Option<(T, Arc<SessionState>)> {
        let mut guard = self.state.lock().await;
        let (action, extra) = build(&**guard)?;
        let next = self.apply(&mut *guard, &action);
        Some((extra, next))
    }

    /// Applies a backend read only if `user_id` is still the signed-in user.
    async fn dispatch_for_user(&self, user_id: UserId, action: Action) -> bool {
        let applied = self
            .dispatch_with(|state| (state.user_id() == Some(user_id)).then_some((action, ())))
            .await
            .is_some();
        if !applied {
            debug!("session: dropping response for signed-out user={}", user_id.0);
        }
        applied
    }

    fn apply(&self, current: &mut Arc<SessionState>, action: &Action) -> Arc<SessionState> {
        let next = reduce(current, action);
        if !Arc::ptr_eq(current, &next) {
            *current = Arc::clone(&next);
            let _ = self.events.send(Arc::clone(&next));
        }
        next
    }

    async fn user_id(&self) -> Option<UserId> {
        self.state.lock().await.user_id()
    }

    async fn begin(&self) {
        self.dispatch(Action::SetLoading(true)).await;
        self.dispatch(Action::SetError(None)).await;
    }

    async fn fail<T>(&self, err: ServiceError) -> ServiceResult<T> {
        self.dispatch(Action::SetError(Some(err.to_string()))).await;
        self.dispatch(Action::SetLoading(false)).await;
        Err(err)
    }

    async fn require_user(&self) -> ServiceResult<UserId> {
        match self.user_id().await {
            Some(user_id) => Ok(user_id),
            None => self.fail(ServiceError::AuthRequired).await,
        }
    }

    /// Restores persisted session, settings and cached contacts, then, only for a signed-in
    /// user, refreshes contacts and call history from the backend. Returns whether a session
    /// was restored.
    pub async fn initialize(&self) -> bool {
        let session: Option<Session> = self.read_record(SESSION_KEY).await;
        if let Some(settings) = self.read_record::<Settings>(SETTINGS_KEY).await {
            self.dispatch(Action::UpdateSettings(SettingsPatch::from(settings)))
                .await;
        }
        if let Some(contacts) = self.read_record::<Vec<TrustedContact>>(CONTACTS_KEY).await {
            self.dispatch(Action::SetContacts(contacts)).await;
        }

        let Some(profile) = session
            .filter(|session| session.authenticated)
            .and_then(|session| session.profile())
        else {
            debug!("session: no persisted session; skipping backend refresh");
            return false;
        };

        info!("session: restored user={}", profile.user_id.0);
        self.dispatch(Action::SetUser(Some(profile))).await;
        self.dispatch(Action::SetAuthenticated(true)).await;

        join(self.load_contacts(), self.load_call_history()).await;
        true
    }

    async fn read_record<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match load_json(self.persistence.as_ref(), key).await {
            Ok(value) => value,
            Err(err) => {
                warn!("session: failed to read persisted record key={key} error={err:#}");
                None
            }
        }
    }

    pub async fn signup(&self, form: SignupForm) -> ServiceResult<UserProfile> {
        self.begin().await;
        let outcome = match self.service.signup(&form).await {
            Ok(outcome) => outcome,
            Err(err) => return self.fail(err).await,
        };

        let profile = UserProfile {
            user_id: outcome.user_id,
            display_name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            assigned_number: outcome.assigned_number,
        };
        self.sign_in(&profile).await?;
        self.dispatch(Action::SetLoading(false)).await;
        info!("session: signed up user={}", profile.user_id.0);
        Ok(profile)
    }

    /// Signs in to an existing account by email, then refreshes contacts and call history.
    pub async fn login(&self, email: &str) -> ServiceResult<UserProfile> {
        if let Err(err) = validate_email(email) {
            return self.fail(err.into()).await;
        }
        self.begin().await;
        let AccountLookup { user_id, name } = match self.service.lookup_user(email).await {
            Ok(account) => account,
            Err(err) => return self.fail(err).await,
        };

        if self.user_id().await.is_some_and(|current| current != user_id) {
            self.logout().await;
        }
        let profile = UserProfile {
            user_id,
            display_name: name,
            email: email.trim().to_lowercase(),
            assigned_number: None,
        };
        self.sign_in(&profile).await?;
        join(self.load_contacts(), self.load_call_history()).await;
        self.dispatch(Action::SetLoading(false)).await;
        info!("session: logged in user={}", user_id.0);
        Ok(profile)
    }

    /// Persists the session first; state only changes once it is on disk.
    async fn sign_in(&self, profile: &UserProfile) -> ServiceResult<()> {
        if let Err(err) = save_json(
            self.persistence.as_ref(),
            SESSION_KEY,
            &Session::from_profile(profile),
        )
        .await
        {
            return self.fail(ServiceError::storage(err)).await;
        }
        self.dispatch(Action::SetUser(Some(profile.clone()))).await;
        self.dispatch(Action::SetAuthenticated(true)).await;
        Ok(())
    }

    /// Clears the persisted session and contact cache and resets state. Settings stay on disk.
    pub async fn logout(&self) {
        let _cache = self.cache_lock.lock().await;
        for key in [SESSION_KEY, CONTACTS_KEY] {
            if let Err(err) = self.persistence.remove(key).await {
                error!("session: failed to clear persisted record key={key} error={err:#}");
            }
        }
        self.dispatch(Action::Logout).await;
        info!("session: logged out");
    }

    /// Places an outbound call. The record exists as `initiating` before the request is sent
    /// and becomes `connected` when the backend confirms it; a rejected call is kept in history
    /// as `failed`.
    pub async fn initiate_call(&self, target_number: &str) -> ServiceResult<CallRecord> {
        let user_id = self.require_user().await?;
        let target = match phone::normalize_e164(target_number) {
            Ok(target) => target,
            Err(err) => return self.fail(err.into()).await,
        };

        self.begin().await;
        let record = CallRecord::outbound_initiating(target.clone(), Utc::now());
        let call_id = record.id;
        self.dispatch(Action::AddCall(record)).await;
        info!("calls: initiating id={call_id} target={target}");

        match self.service.initiate_call(Some(user_id), &target).await {
            Ok(initiated) => {
                let call_log_id = initiated.call_log_id;
                let connected = self
                    .dispatch_with(|state| {
                        let call = state.active_call(call_id)?;
                        (call.status == CallStatus::Initiating).then(|| {
                            let update = CallUpdate {
                                id: call_id,
                                status: Some(CallStatus::Connected),
                                call_log_id: Some(call_log_id),
                                target_number: Some(initiated.target_number),
                                caller_id_shown: Some(initiated.caller_id_shown),
                            };
                            (Action::UpdateCall(update), ())
                        })
                    })
                    .await;
                if connected.is_none() {
                    warn!("calls: discarding late connect id={call_id} call_log_id={call_log_id}");
                    self.report_late_terminal(user_id, call_id, call_log_id).await;
                }
                self.dispatch(Action::SetLoading(false)).await;
                let state = self.state().await;
                state.find_call(call_id).cloned().ok_or_else(|| {
                    ServiceError::InvalidResponse(format!("call {call_id} vanished from state"))
                })
            }
            Err(err) => {
                warn!("calls: initiation failed id={call_id} error={err}");
                self.dispatch_with(|state| {
                    let call = state.active_call(call_id)?;
                    Some((Action::CompleteCall(call.finished(CallStatus::Failed, 0)), ()))
                })
                .await;
                self.fail(err).await
            }
        }
    }

    /// A call that went terminal locally before its log id arrived: tell the backend how it ended.
    async fn report_late_terminal(&self, user_id: UserId, call_id: CallId, call_log_id: i64) {
        let Some(call) = self.state().await.history_call(call_id).cloned() else {
            return;
        };
        if let Err(err) = self
            .service
            .complete_call(Some(user_id), call_log_id, call.duration_seconds, call.status)
            .await
        {
            warn!("calls: failed to report late completion call_log_id={call_log_id} error={err}");
        }
    }

    /// Ends a call as `completed`, `failed` or `cancelled`. Completing a call that is already
    /// terminal is ignored. Backend reporting is best-effort and never blocks the local move.
    pub async fn complete_call(
        &self,
        call_id: CallId,
        duration_seconds: u64,
        status: CallStatus,
    ) -> ServiceResult<Option<CallRecord>> {
        if !matches!(
            status,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Cancelled
        ) {
            return self
                .fail(ValidationError::InvalidCallStatus(status.to_string()).into())
                .await;
        }
        Ok(self.finish_call(call_id, duration_seconds, status).await)
    }

    pub async fn cancel_call(&self, call_id: CallId) -> ServiceResult<Option<CallRecord>> {
        let elapsed = self
            .state()
            .await
            .active_call(call_id)
            .map(|call| call.elapsed_seconds(Utc::now()))
            .unwrap_or_default();
        self.complete_call(call_id, elapsed, CallStatus::Cancelled)
            .await
    }

    /// Shared terminal transition for user completions and the stale-call reaper.
    ///
    /// The local move happens first and atomically; only the caller whose move took the call
    /// out of the active set reports it to the backend, so concurrent finishers produce exactly
    /// one backend completion, and it matches the recorded status.
    pub(crate) async fn finish_call(
        &self,
        call_id: CallId,
        duration_seconds: u64,
        status: CallStatus,
    ) -> Option<CallRecord> {
        let moved = self
            .dispatch_with(|state| {
                let call = state.active_call(call_id)?;
                let finished = call.finished(status, duration_seconds);
                Some((Action::CompleteCall(finished), state.user_id()))
            })
            .await;

        let Some((user_id, next)) = moved else {
            match self.state().await.history_call(call_id) {
                Some(done) => warn!(
                    "calls: ignoring {status} for call already {} id={call_id}",
                    done.status
                ),
                None => warn!("calls: ignoring {status} for unknown call id={call_id}"),
            }
            return None;
        };

        let recorded = next.history_call(call_id).cloned()?;
        info!("calls: {status} id={call_id} duration={duration_seconds}s");
        if let (Some(call_log_id), Some(user_id)) = (recorded.call_log_id, user_id) {
            if let Err(err) = self
                .service
                .complete_call(Some(user_id), call_log_id, duration_seconds, status)
                .await
            {
                warn!("calls: backend completion failed id={call_id} call_log_id={call_log_id} error={err}");
            }
        }
        Some(recorded)
    }

    /// Pulls the backend's view of an active call and applies it when it is still newer than
    /// local state. Returns the local status afterwards; failures leave the call untouched.
    pub async fn refresh_call_status(&self, call_id: CallId) -> Option<CallStatus> {
        let state = self.state().await;
        let Some(call) = state.active_call(call_id).cloned() else {
            return state.find_call(call_id).map(|call| call.status);
        };
        let Some(call_log_id) = call.call_log_id else {
            return Some(call.status);
        };

        let remote = match self.service.call_status(state.user_id(), call_log_id).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!("calls: status check failed id={call_id} error={err}");
                return Some(call.status);
            }
        };

        if remote.status.is_none() {
            debug!("calls: unmapped remote status '{}' id={call_id}", remote.raw);
        }
        self.dispatch_with(|state| {
            let current = state.active_call(call_id)?;
            let action = match remote.status? {
                status if status.is_terminal() => {
                    let duration = current.elapsed_seconds(Utc::now());
                    Action::CompleteCall(current.finished(status, duration))
                }
                CallStatus::Connected if current.status == CallStatus::Initiating => {
                    Action::UpdateCall(CallUpdate {
                        id: call_id,
                        status: Some(CallStatus::Connected),
                        ..CallUpdate::default()
                    })
                }
                _ => return None,
            };
            Some((action, ()))
        })
        .await;
        self.state().await.find_call(call_id).map(|call| call.status)
    }

    /// Force-completes one stale call as `auto_completed`.
    pub(crate) async fn auto_complete(
        &self,
        call_id: CallId,
        now: DateTime<Utc>,
    ) -> Option<CallRecord> {
        let elapsed = self
            .state()
            .await
            .active_call(call_id)?
            .elapsed_seconds(now);
        self.finish_call(call_id, elapsed, CallStatus::AutoCompleted)
            .await
    }

    /// Merges the first history page into local history. Skipped without a session.
    pub async fn load_call_history(&self) {
        let Some(user_id) = self.user_id().await else {
            return;
        };
        let history = self
            .service
            .call_history(Some(user_id), self.options.history_page_size, 0)
            .await;
        self.dispatch_for_user(user_id, Action::SetCallHistory(history))
            .await;
    }

    /// Refreshes the trusted-contact list and its local cache. On failure the last known list
    /// is kept.
    pub async fn load_contacts(&self) -> Vec<TrustedContact> {
        let Some(user_id) = self.user_id().await else {
            return Vec::new();
        };
        match self.service.list_contacts(Some(user_id)).await {
            Ok(contacts) => self.apply_contacts(user_id, contacts).await,
            Err(err) => {
                warn!("contacts: refresh failed user={} error={err}", user_id.0);
            }
        }
        self.state().await.contacts.clone()
    }

    /// Caches and applies a fetched list, unless `user_id` signed out while it was in flight.
    async fn apply_contacts(&self, user_id: UserId, contacts: Vec<TrustedContact>) {
        let _cache = self.cache_lock.lock().await;
        if self.user_id().await != Some(user_id) {
            debug!("contacts: dropping list for signed-out user={}", user_id.0);
            return;
        }
        if let Err(err) = save_json(self.persistence.as_ref(), CONTACTS_KEY, &contacts).await {
            warn!("contacts: failed to cache contact list error={err:#}");
        }
        self.dispatch_for_user(user_id, Action::SetContacts(contacts))
            .await;
    }

    /// Adds a trusted contact, then re-reads the whole list from the backend.
    pub async fn add_contact(&self, contact: NewContact) -> ServiceResult<TrustedContact> {
        let user_id = self.require_user().await?;
        self.begin().await;
        let added = match self.service.add_contact(Some(user_id), &contact).await {
            Ok(added) => added,
            Err(err) => return self.fail(err).await,
        };

        match self.service.list_contacts(Some(user_id)).await {
            Ok(contacts) => self.apply_contacts(user_id, contacts).await,
            Err(err) => {
                warn!("contacts: re-fetch after add failed error={err}");
                self.dispatch_for_user(user_id, Action::AddContact(added.clone()))
                    .await;
            }
        }
        self.dispatch(Action::SetLoading(false)).await;
        info!("contacts: added id={} number={}", added.id, added.phone_number);
        Ok(added)
    }

    pub async fn remove_contact(&self, contact_id: ContactId) -> ServiceResult<()> {
        let user_id = self.require_user().await?;
        self.begin().await;
        if let Err(err) = self.service.remove_contact(Some(user_id), contact_id).await {
            return self.fail(err).await;
        }

        match self.service.list_contacts(Some(user_id)).await {
            Ok(contacts) => self.apply_contacts(user_id, contacts).await,
            Err(err) => {
                warn!("contacts: re-fetch after remove failed error={err}");
                self.dispatch_for_user(user_id, Action::RemoveContact(contact_id))
                    .await;
            }
        }
        self.dispatch(Action::SetLoading(false)).await;
        info!("contacts: removed id={contact_id}");
        Ok(())
    }

    pub async fn send_message(&self, to_number: &str, body: &str) -> ServiceResult<MessageReceipt> {
        let user_id = self.require_user().await?;
        self.begin().await;
        match self
            .service
            .send_message(Some(user_id), to_number, body)
            .await
        {
            Ok(receipt) => {
                self.dispatch(Action::SetLoading(false)).await;
                Ok(receipt)
            }
            Err(err) => self.fail(err).await,
        }
    }

    /// Persists the merged settings before applying them, so state never runs ahead of disk.
    /// Concurrent updates are applied one at a time.
    pub async fn update_settings(&self, patch: SettingsPatch) -> ServiceResult<Settings> {
        let _settings = self.settings_lock.lock().await;
        let merged = self.state().await.settings.merged(&patch);
        if let Err(err) = save_json(self.persistence.as_ref(), SETTINGS_KEY, &merged).await {
            return self.fail(ServiceError::storage(err)).await;
        }
        let next = self.dispatch(Action::UpdateSettings(patch)).await;
        Ok(next.settings.clone())
    }

    /// `false` when nobody is signed in, including a sign-out while the check was in flight.
    pub async fn check_voice_ready(&self) -> bool {
        let Some(user_id) = self.user_id().await else {
            warn!("voice: readiness check skipped; no signed-in user");
            return false;
        };
        let ready = self.service.check_voice_ready(Some(user_id)).await;
        self.dispatch_for_user(user_id, Action::SetVoiceReady(ready))
            .await
            && ready
    }

    pub async fn clear_error(&self) {
        self.dispatch(Action::SetError(None)).await;
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
