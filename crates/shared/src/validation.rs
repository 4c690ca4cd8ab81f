use crate::{error::ValidationError, phone};

pub const MAX_MESSAGE_CHARS: usize = 1600;
pub const PIN_LENGTH: usize = 4;
pub const MIN_VERBAL_CODE_CHARS: usize = 3;

pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPin)
    }
}

pub fn validate_verbal_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().chars().count() < MIN_VERBAL_CODE_CHARS {
        return Err(ValidationError::VerbalCodeTooShort {
            min: MIN_VERBAL_CODE_CHARS,
        });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidEmail(email.to_string())),
    }
}

pub fn validate_recipient(to_number: &str) -> Result<(), ValidationError> {
    let digits = phone::digit_count(to_number);
    if digits < phone::MIN_PHONE_DIGITS {
        return Err(ValidationError::TooFewDigits { digits });
    }
    Ok(())
}

/// Length is counted in characters, the unit the messaging backend limits on.
pub fn validate_message_body(body: &str) -> Result<(), ValidationError> {
    let len = body.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_CHARS,
        });
    }
    if body.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(())
}
