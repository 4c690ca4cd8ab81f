use std::sync::LazyLock;

use regex::Regex;
use shared::{
    domain::UserId,
    error::ValidationError,
    phone,
    protocol::SignupResponse,
    validation::{validate_email, validate_pin, validate_verbal_code},
};

use crate::{
    error::{ServiceError, ServiceResult},
    service::SignupOutcome,
};

const SUCCESS_MARKERS: [&str; 2] = ["Account created", "Defense Number"];

static USER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)user_id\W*(\d+)").expect("invalid user id pattern"));

// Optional country code, then 3-3-4 digit groups with optional separators. The surrounding
// non-digit guards keep dates and longer digit runs from matching.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\+?(?:\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4})(?:\D|$)")
        .expect("invalid phone pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub real_phone_number: String,
    pub pin: String,
    pub verbal_code: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        validate_email(&self.email)?;
        let digits = phone::digit_count(&self.real_phone_number);
        if digits < phone::MIN_PHONE_DIGITS {
            return Err(ValidationError::TooFewDigits { digits });
        }
        validate_pin(&self.pin)?;
        validate_verbal_code(&self.verbal_code)
    }

    /// Field pairs for the form-encoded POST; the phone number is sent as bare digits.
    pub fn form_fields(&self) -> [(&'static str, String); 5] {
        [
            ("name", self.name.trim().to_string()),
            ("email", self.email.trim().to_string()),
            ("real_phone_number", phone::digits_only(&self.real_phone_number)),
            ("pin", self.pin.clone()),
            ("verbal_code", self.verbal_code.trim().to_string()),
        ]
    }
}

/// Interprets the signup response body.
///
/// A JSON body `{user_id, assigned_number}` is used as-is. Otherwise the body is treated as
/// prose: it must carry one of the confirmation markers and a `user_id` token followed by
/// digits (`user_id: 7`, `user_id=7`, `"user_id": 7`), and the first phone-shaped match is
/// taken as the assigned number. A body that confirms the account but names no user id is
/// rejected.
pub fn parse_signup_response(body: &str) -> ServiceResult<SignupOutcome> {
    if let Ok(structured) = serde_json::from_str::<SignupResponse>(body) {
        return Ok(SignupOutcome {
            user_id: UserId(structured.user_id),
            assigned_number: structured.assigned_number.map(|n| phone::to_e164_lossy(&n)),
        });
    }

    if !SUCCESS_MARKERS.iter().any(|marker| body.contains(marker)) {
        return Err(ServiceError::InvalidResponse(
            "signup response carries no account confirmation".into(),
        ));
    }

    let user_id = find_user_id(body).ok_or_else(|| {
        ServiceError::InvalidResponse("signup response carries no user id".into())
    })?;

    Ok(SignupOutcome {
        user_id: UserId(user_id),
        assigned_number: find_phone_number(body),
    })
}

fn find_user_id(body: &str) -> Option<i64> {
    USER_ID_PATTERN
        .captures_iter(body)
        .find_map(|caps| caps[1].parse().ok())
}

/// First phone-shaped match that normalizes to E.164.
pub fn find_phone_number(text: &str) -> Option<String> {
    PHONE_PATTERN
        .captures_iter(text)
        .find_map(|caps| phone::normalize_e164(&caps[1]).ok())
}

#[cfg(test)]
#[path = "tests/signup_tests.rs"]
mod tests;
