use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure classes every client-side error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthRequired,
    InvalidResponse,
    TransportFailure,
    ValidationFailure,
}

/// Input rejected on the client before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
    #[error("PIN must be exactly 4 digits")]
    InvalidPin,
    #[error("verbal code must be at least {min} characters")]
    VerbalCodeTooShort { min: usize },
    #[error("phone number has {digits} digits; at least 10 are required")]
    TooFewDigits { digits: usize },
    #[error("phone number '{0}' cannot be normalized")]
    InvalidPhoneNumber(String),
    #[error("message is {len} characters; the limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("message body is empty")]
    EmptyMessage,
    #[error("status '{0}' cannot be requested for a call")]
    InvalidCallStatus(String),
}

/// Error body the backend attaches to non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendError {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendError {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}
