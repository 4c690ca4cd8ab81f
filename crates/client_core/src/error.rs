use shared::error::{ErrorKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no signed-in user; sign up or log in first")]
    AuthRequired,
    #[error("no account is registered for '{0}'")]
    UnknownAccount(String),
    #[error("backend response violated the contract: {0}")]
    InvalidResponse(String),
    #[error("call failed: {0}")]
    CallFailed(String),
    #[error("contact operation failed: {0}")]
    ContactOperationFailed(String),
    #[error("message failed: {0}")]
    MessageFailed(String),
    #[error("message is {len} characters; the limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("recipient has {digits} digits; at least 10 are required")]
    InvalidRecipient { digits: usize },
    #[error("{0}")]
    Validation(ValidationError),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("local storage failed: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthRequired | Self::UnknownAccount(_) => ErrorKind::AuthRequired,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::CallFailed(_)
            | Self::ContactOperationFailed(_)
            | Self::MessageFailed(_)
            | Self::Transport(_)
            | Self::Storage(_) => ErrorKind::TransportFailure,
            Self::MessageTooLong { .. } | Self::InvalidRecipient { .. } | Self::Validation(_) => {
                ErrorKind::ValidationFailure
            }
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::TooFewDigits { digits } => Self::InvalidRecipient { digits },
            ValidationError::MessageTooLong { len, max } => Self::MessageTooLong { len, max },
            other => Self::Validation(other),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
