use super::*;
use shared::error::ErrorKind;

fn form() -> SignupForm {
    SignupForm {
        name: "Jane".into(),
        email: "jane@example.com".into(),
        real_phone_number: "+1 (555) 123-4567".into(),
        pin: "1234".into(),
        verbal_code: "blue".into(),
    }
}

#[test]
fn valid_form_sends_phone_as_digits() {
    let form = form();
    assert_eq!(form.validate(), Ok(()));
    let fields = form.form_fields();
    assert_eq!(fields[2], ("real_phone_number", "15551234567".to_string()));
}

#[test]
fn form_validation_reports_first_problem() {
    let mut bad = form();
    bad.name = "  ".into();
    assert_eq!(bad.validate(), Err(ValidationError::MissingField("name")));

    let mut bad = form();
    bad.real_phone_number = "555-1234".into();
    assert_eq!(
        bad.validate(),
        Err(ValidationError::TooFewDigits { digits: 7 })
    );

    let mut bad = form();
    bad.pin = "12345".into();
    assert_eq!(bad.validate(), Err(ValidationError::InvalidPin));

    let mut bad = form();
    bad.verbal_code = " ab ".into();
    assert_eq!(
        bad.validate(),
        Err(ValidationError::VerbalCodeTooShort { min: 3 })
    );
}

#[test]
fn json_signup_response_is_used_directly() {
    let outcome =
        parse_signup_response(r#"{"user_id": 12, "assigned_number": "555-000-1111"}"#).unwrap();
    assert_eq!(outcome.user_id, UserId(12));
    assert_eq!(outcome.assigned_number.as_deref(), Some("+15550001111"));
}

#[test]
fn text_confirmation_yields_user_and_number() {
    let body = "<h1>Account created</h1><p>Your Defense Number: +1 555-000-1111</p>\
                <p>Keep your user_id 31 handy.</p>";
    let outcome = parse_signup_response(body).unwrap();
    assert_eq!(outcome.user_id, UserId(31));
    assert_eq!(outcome.assigned_number.as_deref(), Some("+15550001111"));
}

#[test]
fn confirmation_without_user_id_is_rejected() {
    let err = parse_signup_response("Account created. Defense Number (555) 000-1111").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}

#[test]
fn response_without_confirmation_is_rejected() {
    let err = parse_signup_response("<html>Something went wrong, user_id: 4</html>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}

#[test]
fn user_id_accepts_common_separators() {
    assert_eq!(find_user_id("USER_ID:: 42"), Some(42));
    assert_eq!(find_user_id("user_id=13"), Some(13));
    assert_eq!(find_user_id(r#"{"name": "Jane", "user_id": 13}"#), Some(13));
    assert_eq!(find_user_id("user_id: none, user_id: 5"), Some(5));
    assert_eq!(find_user_id("userid 5"), None);
}

#[test]
fn text_confirmation_with_equals_sign_is_accepted() {
    let outcome = parse_signup_response("Account created! user_id=13").unwrap();
    assert_eq!(outcome.user_id, UserId(13));
    assert_eq!(outcome.assigned_number, None);
}

#[test]
fn dates_and_times_are_not_taken_for_a_phone_number() {
    let body = "Account created 2026-10-18 12:30 for Jane, user_id: 7";
    let outcome = parse_signup_response(body).unwrap();
    assert_eq!(outcome.user_id, UserId(7));
    assert_eq!(outcome.assigned_number, None);
}

#[test]
fn phone_scanner_skips_short_runs() {
    assert_eq!(
        find_phone_number("code 1234, call 555.987.6543 now"),
        Some("+15559876543".into())
    );
    assert_eq!(find_phone_number("ticket 12-34 only"), None);
    assert_eq!(find_phone_number("dial +15559876543."), Some("+15559876543".into()));
    assert_eq!(find_phone_number("ref 55598765430123"), None);
}
