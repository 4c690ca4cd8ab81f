use crate::error::ValidationError;

pub const MIN_PHONE_DIGITS: usize = 10;
const MAX_E164_DIGITS: usize = 15;

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn digit_count(raw: &str) -> usize {
    raw.chars().filter(char::is_ascii_digit).count()
}

/// Normalizes North American and explicit international numbers to E.164.
pub fn normalize_e164(raw: &str) -> Result<String, ValidationError> {
    let digits = digits_only(raw);
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(ValidationError::TooFewDigits {
            digits: digits.len(),
        });
    }

    match digits.len() {
        10 => Ok(format!("+1{digits}")),
        11 if digits.starts_with('1') => Ok(format!("+{digits}")),
        len if raw.trim_start().starts_with('+') && len <= MAX_E164_DIGITS => {
            Ok(format!("+{digits}"))
        }
        _ => Err(ValidationError::InvalidPhoneNumber(raw.to_string())),
    }
}

/// Best-effort E.164 for numbers received from the backend; never fails.
pub fn to_e164_lossy(raw: &str) -> String {
    normalize_e164(raw).unwrap_or_else(|_| raw.trim().to_string())
}

/// `(555) 123-4567` for US numbers, the input unchanged otherwise.
pub fn format_display(raw: &str) -> String {
    let digits = digits_only(raw);
    let local = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return raw.to_string(),
    };
    format!("({}) {}-{}", &local[0..3], &local[3..6], &local[6..10])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ten_digit_numbers_with_country_code() {
        assert_eq!(normalize_e164("555-987-6543").unwrap(), "+15559876543");
        assert_eq!(normalize_e164("1 (555) 987-6543").unwrap(), "+15559876543");
        assert_eq!(normalize_e164("+44 20 7946 0958").unwrap(), "+442079460958");
    }

    #[test]
    fn rejects_short_numbers_with_digit_count() {
        assert_eq!(
            normalize_e164("555-1234"),
            Err(ValidationError::TooFewDigits { digits: 7 })
        );
    }

    #[test]
    fn rejects_long_numbers_without_explicit_plus() {
        assert!(matches!(
            normalize_e164("22079460958"),
            Err(ValidationError::InvalidPhoneNumber(_))
        ));
    }

    #[test]
    fn formats_display_numbers() {
        assert_eq!(format_display("+15551234567"), "(555) 123-4567");
        assert_eq!(format_display("5551234567"), "(555) 123-4567");
        assert_eq!(format_display("+442079460958"), "+442079460958");
    }
}
