//! API handlers and shared input helpers.
//!
//! Every handler runs one authorization check, validates its input and then
//! makes a single store call.

pub mod admin;
pub mod final_submit;
pub mod form;
pub mod health;
pub mod principal;
pub mod progress;
pub mod session;

use regex::Regex;
use serde_json::Value;

use crate::api::error::ApiError;

/// Normalize an email for lookups and comparisons.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lightweight email sanity check on already-normalized input.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Extract the `email` field from a raw JSON body.
///
/// The body is taken as untyped JSON so that a missing payload, a missing
/// field and a non-string value all map to 400 instead of an extractor error.
pub(crate) fn email_from_body(payload: Option<&Value>) -> Result<String, ApiError> {
    let Some(body) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };

    let Some(email) = body.get("email").and_then(Value::as_str) else {
        return Err(ApiError::BadRequest(
            "Email is required and must be a string".to_string(),
        ));
    };

    let email = normalize_email(email);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(ApiError::BadRequest("Invalid email".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Faculty@NITP.ac.in "), "faculty@nitp.ac.in");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@nitp.ac.in"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@nitp.ac.in"));
    }

    #[test]
    fn email_from_body_rejects_bad_input() {
        assert!(matches!(
            email_from_body(None),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            email_from_body(Some(&json!({}))),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            email_from_body(Some(&json!({"email": 123}))),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            email_from_body(Some(&json!({"email": "nope"}))),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            email_from_body(Some(&json!({"email": " A@nitp.ac.in "}))),
            Ok(email) if email == "a@nitp.ac.in"
        ));
    }
}
