//! Inbound callback verification.
//!
//! The gateway reports payment outcomes by posting a form to the shop's
//! callback URL. [`CallbackForm`] holds those fields exactly as received;
//! [`CallbackForm::validate`] runs every check independently, recomputes
//! the expected signature and returns either a typed [`CallbackPayload`]
//! or the complete list of failures. Pair it with
//! [`SenderFilter`](crate::filter::SenderFilter) on the route so that
//! only the gateway's addresses reach validation at all.
//!
//! Unlike request signing, the callback digest uses a fixed field order,
//! not a key sort; reordering any two fields changes the preimage.

use crate::models::Currency;
use crate::sign::sign_values;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static SIGNATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{32}$").expect("valid signature regex"));

/// Final state of the payment a callback reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Fail,
}

impl CallbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackStatus::Success => "success",
            CallbackStatus::Fail => "fail",
        }
    }

    /// Exact-case lookup; `"Success"` is not a status.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(CallbackStatus::Success),
            "fail" => Some(CallbackStatus::Fail),
            _ => None,
        }
    }
}

/// What went wrong with a single callback field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldErrorKind {
    #[error("cannot be blank")]
    Missing,
    #[error("must be an integer")]
    NotAnInteger,
    #[error("must be a number")]
    NotANumber,
    #[error("is not a valid email address")]
    InvalidEmail,
    #[error("wrong signature format")]
    WrongSignatureFormat,
    #[error("signatures do not match")]
    SignatureMismatch,
    #[error("wrong payment status")]
    UnknownStatus,
    #[error("wrong currency value")]
    UnknownCurrency,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.kind)
    }
}

/// Every failure found in a callback, accumulated across all checks.
///
/// Validation never stops at the first problem: a rejected callback
/// should be diagnosable from one log line, with everything wrong with
/// it visible at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, kind: FieldErrorKind) {
        self.0.push(FieldError { field, kind });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str, kind: FieldErrorKind) -> bool {
        self.0.iter().any(|e| e.field == field && e.kind == kind)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Raw callback fields, exactly as the gateway sent them.
///
/// Everything is optional text at this stage: the struct deserializes
/// from an `application/x-www-form-urlencoded` body (or a query string)
/// without judging it. [`validate`](Self::validate) is where typing
/// happens.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallbackForm {
    pub uid: Option<String>,
    pub amount: Option<String>,
    pub amount_shop: Option<String>,
    pub amount_client: Option<String>,
    pub currency: Option<String>,
    pub order_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub payment_method_title: Option<String>,
    pub client_email: Option<String>,
    pub creation_time: Option<String>,
    pub payment_time: Option<String>,
    pub status: Option<String>,
    pub debug: Option<String>,
    pub signature: Option<String>,
}

/// A callback that passed every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackPayload {
    pub uid: i64,
    pub amount: f64,
    pub amount_shop: f64,
    pub amount_client: f64,
    pub currency: Currency,
    pub order_id: String,
    pub payment_method_id: i64,
    pub payment_method_title: String,
    pub client_email: String,
    pub creation_time: String,
    pub payment_time: String,
    /// The gateway omits the status on some notification kinds.
    pub status: Option<CallbackStatus>,
    pub debug: String,
    pub signature: String,
}

impl CallbackPayload {
    /// True when the gateway reported the payment as completed.
    pub fn is_success(&self) -> bool {
        self.status == Some(CallbackStatus::Success)
    }

    /// True when the gateway reported the payment as failed.
    pub fn is_fail(&self) -> bool {
        self.status == Some(CallbackStatus::Fail)
    }
}

impl CallbackForm {
    /// Checks presence, types, enum membership, the email shape and the
    /// signature, all independently, and recomputes the expected digest
    /// over the fixed field order. Number renderings are canonicalized
    /// before hashing, so `100.0` and `100` yield the same preimage.
    ///
    /// # Arguments
    ///
    /// * `secret_key` - The shop secret key shared with the gateway.
    pub fn validate(&self, secret_key: &str) -> Result<CallbackPayload, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for (field, value) in [
            ("uid", &self.uid),
            ("amount", &self.amount),
            ("amount_shop", &self.amount_shop),
            ("amount_client", &self.amount_client),
            ("currency", &self.currency),
            ("order_id", &self.order_id),
            ("payment_method_id", &self.payment_method_id),
            ("payment_method_title", &self.payment_method_title),
            ("client_email", &self.client_email),
            ("signature", &self.signature),
        ] {
            if is_blank(value) {
                errors.push(field, FieldErrorKind::Missing);
            }
        }

        let (uid, uid_segment) = parse_int("uid", &self.uid, &mut errors);
        let (amount, amount_segment) = parse_number("amount", &self.amount, &mut errors);
        let (amount_shop, amount_shop_segment) =
            parse_number("amount_shop", &self.amount_shop, &mut errors);
        let (amount_client, amount_client_segment) =
            parse_number("amount_client", &self.amount_client, &mut errors);
        let (payment_method_id, payment_method_id_segment) =
            parse_int("payment_method_id", &self.payment_method_id, &mut errors);

        let currency = match self.currency.as_deref() {
            None | Some("") => None,
            Some(value) => {
                let parsed = Currency::parse(value);
                if parsed.is_none() {
                    errors.push("currency", FieldErrorKind::UnknownCurrency);
                }
                parsed
            }
        };

        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(value) => {
                let parsed = CallbackStatus::parse(value);
                if parsed.is_none() {
                    errors.push("status", FieldErrorKind::UnknownStatus);
                }
                parsed
            }
        };

        let email = text(&self.client_email);
        if !email.is_empty() && !EMAIL_RE.is_match(email) {
            errors.push("client_email", FieldErrorKind::InvalidEmail);
        }

        let provided = text(&self.signature);
        if !provided.is_empty() && !SIGNATURE_RE.is_match(provided) {
            errors.push("signature", FieldErrorKind::WrongSignatureFormat);
        }

        let expected = sign_values(
            &[
                uid_segment.as_str(),
                amount_segment.as_str(),
                amount_shop_segment.as_str(),
                amount_client_segment.as_str(),
                text(&self.currency),
                text(&self.order_id),
                payment_method_id_segment.as_str(),
                text(&self.payment_method_title),
                text(&self.creation_time),
                text(&self.payment_time),
                email,
                text(&self.status),
                text(&self.debug),
            ],
            secret_key,
        );
        if provided != expected {
            errors.push("signature", FieldErrorKind::SignatureMismatch);
        }

        match (uid, amount, amount_shop, amount_client, payment_method_id, currency) {
            (
                Some(uid),
                Some(amount),
                Some(amount_shop),
                Some(amount_client),
                Some(payment_method_id),
                Some(currency),
            ) if errors.is_empty() => Ok(CallbackPayload {
                uid,
                amount,
                amount_shop,
                amount_client,
                currency,
                order_id: text(&self.order_id).to_string(),
                payment_method_id,
                payment_method_title: text(&self.payment_method_title).to_string(),
                client_email: email.to_string(),
                creation_time: text(&self.creation_time).to_string(),
                payment_time: text(&self.payment_time).to_string(),
                status,
                debug: text(&self.debug).to_string(),
                signature: provided.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Missing fields hash as empty segments, unparseable ones as their raw
/// text; the type error is recorded separately either way.
fn parse_int(
    field: &'static str,
    raw: &Option<String>,
    errors: &mut ValidationErrors,
) -> (Option<i64>, String) {
    match raw.as_deref() {
        None | Some("") => (None, String::new()),
        Some(value) => match value.parse::<i64>() {
            Ok(parsed) => (Some(parsed), parsed.to_string()),
            Err(_) => {
                errors.push(field, FieldErrorKind::NotAnInteger);
                (None, value.to_string())
            }
        },
    }
}

fn parse_number(
    field: &'static str,
    raw: &Option<String>,
    errors: &mut ValidationErrors,
) -> (Option<f64>, String) {
    match raw.as_deref() {
        None | Some("") => (None, String::new()),
        Some(value) => match value.parse::<f64>() {
            Ok(parsed) => (Some(parsed), parsed.to_string()),
            Err(_) => {
                errors.push(field, FieldErrorKind::NotANumber);
                (None, value.to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "k";

    fn valid_form() -> CallbackForm {
        CallbackForm {
            uid: Some("1".to_string()),
            amount: Some("100.0".to_string()),
            amount_shop: Some("98".to_string()),
            amount_client: Some("100".to_string()),
            currency: Some("RUB".to_string()),
            order_id: Some("ord1".to_string()),
            payment_method_id: Some("5".to_string()),
            payment_method_title: Some("Card".to_string()),
            client_email: Some("a@b.com".to_string()),
            creation_time: None,
            payment_time: None,
            status: Some("success".to_string()),
            debug: None,
            signature: Some("0e115a445736d97881a9cca6575a39d5".to_string()),
        }
    }

    #[test]
    fn accepts_valid_callback() {
        let payload = valid_form().validate(SECRET).expect("callback is valid");
        assert_eq!(payload.uid, 1);
        assert_eq!(payload.amount, 100.0);
        assert_eq!(payload.amount_shop, 98.0);
        assert_eq!(payload.currency, Currency::Rub);
        assert_eq!(payload.order_id, "ord1");
        assert_eq!(payload.creation_time, "");
        assert!(payload.is_success());
        assert!(!payload.is_fail());
    }

    #[test]
    fn number_renderings_are_canonicalized_before_hashing() {
        // "100.0" and "100" hash identically, as do present-but-empty
        // and absent optional fields.
        let mut form = valid_form();
        form.amount = Some("100".to_string());
        form.creation_time = Some(String::new());
        form.debug = Some(String::new());
        assert!(form.validate(SECRET).is_ok());
    }

    #[test]
    fn fail_status_parses() {
        let mut form = valid_form();
        form.status = Some("fail".to_string());
        form.signature = Some("80d714e5524159c4fb03e4f74c3f2c03".to_string());
        let payload = form.validate(SECRET).expect("callback is valid");
        assert!(payload.is_fail());
        assert!(!payload.is_success());
    }

    #[test]
    fn status_is_optional() {
        let mut form = valid_form();
        form.status = None;
        form.signature = Some("316a6d088e8576905059cb5cfc3dc964".to_string());
        let payload = form.validate(SECRET).expect("callback is valid");
        assert_eq!(payload.status, None);
        assert!(!payload.is_success());
        assert!(!payload.is_fail());
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut form = valid_form();
        form.signature = Some("00000000000000000000000000000000".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("signature", FieldErrorKind::SignatureMismatch));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn malformed_signature_reports_format_and_mismatch() {
        let mut form = valid_form();
        form.signature = Some("NOT-A-DIGEST".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("signature", FieldErrorKind::WrongSignatureFormat));
        assert!(errors.contains("signature", FieldErrorKind::SignatureMismatch));
    }

    #[test]
    fn uppercase_hex_signature_is_malformed() {
        let mut form = valid_form();
        form.signature = Some("0E115A445736D97881A9CCA6575A39D5".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("signature", FieldErrorKind::WrongSignatureFormat));
    }

    #[test]
    fn empty_form_reports_every_missing_field() {
        let errors = CallbackForm::default().validate(SECRET).unwrap_err();
        for field in [
            "uid",
            "amount",
            "amount_shop",
            "amount_client",
            "currency",
            "order_id",
            "payment_method_id",
            "payment_method_title",
            "client_email",
            "signature",
        ] {
            assert!(
                errors.contains(field, FieldErrorKind::Missing),
                "{field} should be reported missing"
            );
        }
        assert!(errors.contains("signature", FieldErrorKind::SignatureMismatch));
        assert_eq!(errors.len(), 11);
    }

    #[test]
    fn type_errors_accumulate() {
        let mut form = valid_form();
        form.uid = Some("abc".to_string());
        form.amount = Some("12,5".to_string());
        form.payment_method_id = Some("x1".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("uid", FieldErrorKind::NotAnInteger));
        assert!(errors.contains("amount", FieldErrorKind::NotANumber));
        assert!(errors.contains("payment_method_id", FieldErrorKind::NotAnInteger));
        assert!(errors.contains("signature", FieldErrorKind::SignatureMismatch));
    }

    #[test]
    fn enum_fields_are_exact_case() {
        let mut form = valid_form();
        form.currency = Some("rub".to_string());
        form.status = Some("Success".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("currency", FieldErrorKind::UnknownCurrency));
        assert!(errors.contains("status", FieldErrorKind::UnknownStatus));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut form = valid_form();
        form.client_email = Some("not-an-email".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("client_email", FieldErrorKind::InvalidEmail));
    }

    #[test]
    fn field_order_is_load_bearing() {
        // Same values, two amount fields swapped: the fixed-order digest
        // no longer matches.
        let mut form = valid_form();
        form.amount_shop = Some("100".to_string());
        form.amount_client = Some("98".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        assert!(errors.contains("signature", FieldErrorKind::SignatureMismatch));
    }

    #[test]
    fn errors_render_as_one_line() {
        let mut form = valid_form();
        form.uid = Some("abc".to_string());
        let errors = form.validate(SECRET).unwrap_err();
        let rendered = errors.to_string();
        assert!(rendered.contains("uid must be an integer"));
        assert!(rendered.contains("; "));
    }
}
