use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{
        CallDirection, CallId, CallRecord, CallStatus, ContactId, NewContact, TrustedContact,
        UserId,
    },
    error::{BackendError, ValidationError},
    phone,
    protocol::{
        CallLogEntry, CallStatusResponse, CompleteCallRequest, CompletionAck, ContactListResponse,
        ContactPayload, InitiateCallRequest, InitiateCallResponse, LookupUserRequest,
        LookupUserResponse, MessageReceipt, NewContactRequest, SendMessageRequest,
        UserSettingsResponse,
    },
    validation::{validate_email, validate_message_body, validate_pin, validate_recipient},
};
use tracing::{debug, info, warn};

use crate::{
    error::{ServiceError, ServiceResult},
    service::{
        require_user, AccountLookup, CallService, InitiatedCall, RemoteCallStatus, SignupOutcome,
    },
    signup::{parse_signup_response, SignupForm},
};

/// What `call_history` yields when the backend cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFallback {
    #[default]
    Empty,
    /// Canned records for demos and offline development. Masks outages; keep out of production.
    Sample,
}

impl HistoryFallback {
    pub fn records(self) -> Vec<CallRecord> {
        match self {
            Self::Empty => Vec::new(),
            Self::Sample => sample_call_history(),
        }
    }
}

impl FromStr for HistoryFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "sample" => Ok(Self::Sample),
            other => Err(format!("unknown history fallback '{other}'")),
        }
    }
}

fn sample_call_history() -> Vec<CallRecord> {
    let now = Utc::now();
    [
        (1, "+15551234567", CallStatus::Completed, 1, 245),
        (2, "+15559876543", CallStatus::Completed, 2, 89),
        (3, "+15555551234", CallStatus::Failed, 3, 0),
    ]
    .into_iter()
    .map(|(id, number, status, hours_ago, duration)| CallRecord {
        id: CallId::from_call_log(id),
        call_log_id: Some(id),
        target_number: number.to_string(),
        caller_id_shown: None,
        direction: CallDirection::Outbound,
        status,
        start_time: now - ChronoDuration::hours(hours_ago),
        duration_seconds: duration,
    })
    .collect()
}

#[derive(Serialize)]
struct HistoryQuery {
    limit: u32,
    offset: u32,
}

pub struct HttpCallService {
    http: Client,
    base_url: String,
    history_fallback: HistoryFallback,
}

impl HttpCallService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            history_fallback: HistoryFallback::default(),
        }
    }

    pub fn with_history_fallback(mut self, history_fallback: HistoryFallback) -> Self {
        self.history_fallback = history_fallback;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn user_url(&self, user_id: UserId, path: &str) -> String {
        format!("{}/multi/user/{}/{}", self.base_url, user_id.0, path)
    }

    async fn fetch_call_history(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<CallRecord>> {
        let response = self
            .http
            .get(self.user_url(user_id, "calls"))
            .query(&HistoryQuery { limit, offset })
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let rows: Vec<CallLogEntry> =
            read_json(check_status(response, ServiceError::Transport).await?).await?;
        Ok(rows
            .into_iter()
            .filter_map(CallLogEntry::into_history_record)
            .collect())
    }

    async fn fetch_voice_ready(&self, user_id: UserId) -> ServiceResult<bool> {
        let response = self
            .http
            .get(self.user_url(user_id, "settings"))
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let settings: UserSettingsResponse =
            read_json(check_status(response, ServiceError::Transport).await?).await?;
        Ok(settings.twilio_number_configured)
    }
}

#[async_trait]
impl CallService for HttpCallService {
    async fn initiate_call(
        &self,
        user_id: Option<UserId>,
        target_number: &str,
    ) -> ServiceResult<InitiatedCall> {
        let user_id = require_user(user_id)?;
        let to_number = phone::normalize_e164(target_number)?;

        info!("calls: initiating user={} target={to_number}", user_id.0);
        let response = self
            .http
            .post(self.user_url(user_id, "call_direct"))
            .json(&InitiateCallRequest {
                to_number: to_number.clone(),
            })
            .send()
            .await
            .map_err(|err| ServiceError::CallFailed(err.to_string()))?;
        let body: InitiateCallResponse =
            read_json(check_status(response, ServiceError::CallFailed).await?).await?;

        if !body.success {
            return Err(ServiceError::CallFailed(
                body.error
                    .unwrap_or_else(|| "backend declined to place the call".into()),
            ));
        }

        match (body.call_log_id, body.target_number, body.twilio_caller_id) {
            (Some(call_log_id), Some(target_number), Some(caller_id_shown)) => Ok(InitiatedCall {
                call_log_id,
                target_number,
                caller_id_shown,
            }),
            _ => Err(ServiceError::InvalidResponse(
                "call_direct response is missing call_log_id, target_number or twilio_caller_id"
                    .into(),
            )),
        }
    }

    async fn complete_call(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
        duration_seconds: u64,
        status: CallStatus,
    ) -> ServiceResult<CompletionAck> {
        let user_id = require_user(user_id)?;
        if !status.is_terminal() {
            return Err(ValidationError::InvalidCallStatus(status.to_string()).into());
        }

        let response = self
            .http
            .post(self.user_url(user_id, &format!("calls/{call_log_id}/complete")))
            .json(&CompleteCallRequest {
                status,
                duration_seconds,
            })
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let ack = read_json(check_status(response, ServiceError::Transport).await?).await?;
        debug!("calls: completion acknowledged call_log_id={call_log_id} status={status}");
        Ok(ack)
    }

    async fn call_status(
        &self,
        user_id: Option<UserId>,
        call_log_id: i64,
    ) -> ServiceResult<RemoteCallStatus> {
        let user_id = require_user(user_id)?;
        let response = self
            .http
            .get(self.user_url(user_id, &format!("calls/{call_log_id}/status")))
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let body: CallStatusResponse =
            read_json(check_status(response, ServiceError::Transport).await?).await?;
        Ok(RemoteCallStatus {
            call_log_id: body.call_id.unwrap_or(call_log_id),
            status: CallStatus::from_remote(&body.status),
            raw: body.status,
        })
    }

    async fn call_history(
        &self,
        user_id: Option<UserId>,
        limit: u32,
        offset: u32,
    ) -> Vec<CallRecord> {
        let Some(user_id) = user_id else {
            return Vec::new();
        };
        match self.fetch_call_history(user_id, limit, offset).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    "calls: history unavailable user={} fallback={:?} error={err}",
                    user_id.0, self.history_fallback
                );
                self.history_fallback.records()
            }
        }
    }

    async fn list_contacts(&self, user_id: Option<UserId>) -> ServiceResult<Vec<TrustedContact>> {
        let user_id = require_user(user_id)?;
        let response = self
            .http
            .get(self.user_url(user_id, "contacts"))
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let body: ContactListResponse =
            read_json(check_status(response, ServiceError::Transport).await?).await?;
        Ok(body.into_contacts())
    }

    async fn add_contact(
        &self,
        user_id: Option<UserId>,
        contact: &NewContact,
    ) -> ServiceResult<TrustedContact> {
        let phone_number = phone::normalize_e164(&contact.phone_number)?;
        if let Some(pin) = &contact.custom_pin {
            validate_pin(pin)?;
        }
        let user_id = require_user(user_id)?;

        let response = self
            .http
            .post(self.user_url(user_id, "contacts"))
            .json(&NewContactRequest {
                phone_number,
                name: contact.name.trim().to_string(),
                custom_pin: contact.custom_pin.clone(),
            })
            .send()
            .await
            .map_err(|err| ServiceError::ContactOperationFailed(err.to_string()))?;
        let payload: ContactPayload =
            read_json(check_status(response, ServiceError::ContactOperationFailed).await?).await?;
        Ok(payload.into())
    }

    async fn remove_contact(
        &self,
        user_id: Option<UserId>,
        contact_id: ContactId,
    ) -> ServiceResult<()> {
        let user_id = require_user(user_id)?;
        let response = self
            .http
            .delete(self.user_url(user_id, &format!("contacts/{}", contact_id.0)))
            .send()
            .await
            .map_err(|err| ServiceError::ContactOperationFailed(err.to_string()))?;
        check_status(response, ServiceError::ContactOperationFailed).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        user_id: Option<UserId>,
        to_number: &str,
        body: &str,
    ) -> ServiceResult<MessageReceipt> {
        validate_message_body(body)?;
        validate_recipient(to_number)?;
        let to_number = phone::normalize_e164(to_number)?;
        let user_id = require_user(user_id)?;

        let response = self
            .http
            .post(self.user_url(user_id, "send_message"))
            .json(&SendMessageRequest {
                to_number,
                message: body.to_string(),
            })
            .send()
            .await
            .map_err(|err| ServiceError::MessageFailed(err.to_string()))?;
        read_json(check_status(response, ServiceError::MessageFailed).await?).await
    }

    async fn check_voice_ready(&self, user_id: Option<UserId>) -> bool {
        let Some(user_id) = user_id else {
            return false;
        };
        match self.fetch_voice_ready(user_id).await {
            Ok(ready) => ready,
            Err(err) => {
                warn!("voice: readiness check failed user={} error={err}", user_id.0);
                false
            }
        }
    }

    async fn signup(&self, form: &SignupForm) -> ServiceResult<SignupOutcome> {
        form.validate().map_err(ServiceError::Validation)?;

        let response = self
            .http
            .post(format!("{}/multi/signup", self.base_url))
            .form(&form.form_fields())
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(ServiceError::Transport(format!(
                "signup rejected with {status}: {}",
                body.trim()
            )));
        }

        let outcome = parse_signup_response(&body)?;
        info!(
            "signup: account created user={} assigned_number={}",
            outcome.user_id.0,
            outcome.assigned_number.as_deref().unwrap_or("unknown")
        );
        Ok(outcome)
    }

    async fn lookup_user(&self, email: &str) -> ServiceResult<AccountLookup> {
        validate_email(email)?;
        let email = email.trim().to_lowercase();

        let response = self
            .http
            .post(format!("{}/multi/lookup-user", self.base_url))
            .json(&LookupUserRequest {
                email: email.clone(),
            })
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ServiceError::UnknownAccount(email));
        }
        let body: LookupUserResponse =
            read_json(check_status(response, ServiceError::Transport).await?).await?;
        debug!("login: resolved email={email} user={}", body.user_id);
        Ok(AccountLookup {
            user_id: UserId(body.user_id),
            name: body.name,
        })
    }
}

/// Passes 2xx responses through; otherwise builds `make_err` from the backend error text.
async fn check_status(
    response: Response,
    make_err: fn(String) -> ServiceError,
) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<BackendError>(&text)
        .ok()
        .and_then(BackendError::into_message)
        .unwrap_or(text);
    Err(make_err(format!("backend returned {status}: {}", detail.trim())))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| ServiceError::InvalidResponse(err.to_string()))
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
