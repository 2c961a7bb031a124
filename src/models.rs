use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote API operations, each mapping to one URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PaymentMethodsList,
    ShopBalance,
    WithdrawCreate,
    GetWithdraw,
    WithdrawsList,
}

impl Action {
    /// The path segment used in `{base_url}/{api_version}/{action}/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PaymentMethodsList => "payment_methods_list",
            Action::ShopBalance => "shop_balance",
            Action::WithdrawCreate => "withdraw_create",
            Action::GetWithdraw => "get_withdraw",
            Action::WithdrawsList => "withdraws_list",
        }
    }
}

/// A scalar request parameter: string, integer or float.
///
/// `Display` is the canonical rendering used both in the signature preimage
/// and in the outgoing query string: integers in base 10, floats in their
/// shortest decimal form (`100.0` renders as `100`), strings as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// Request parameters in insertion order.
///
/// The order entries were inserted in is preserved for the outgoing query
/// string; signing sorts a copy by key and never reorders the mapping
/// itself. Inserting an existing key overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key/value pairs rendered to strings, ready for query encoding.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Currencies accepted by the gateway (ISO 4217).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Exact-case lookup; `"rub"` is not `RUB`.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "RUB" => Some(Currency::Rub),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            _ => None,
        }
    }
}

/// Parameters for `withdraw_create`.
///
/// The gateway expects exactly one of `amount` (amount debited from the
/// shop balance) and `amount_due` (amount credited to the wallet). The
/// request builder sends whichever is set and leaves the one-of check to
/// the remote side, which rejects requests carrying both or neither.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateWithdraw {
    pub method_id: i64,
    pub currency_from: Currency,
    pub wallet: String,
    pub comment: String,
    pub debug: bool,
    pub amount: Option<f64>,
    pub amount_due: Option<f64>,
}

impl CreateWithdraw {
    pub fn new(method_id: i64, currency_from: Currency, wallet: impl Into<String>) -> Self {
        Self {
            method_id,
            currency_from,
            wallet: wallet.into(),
            comment: String::new(),
            debug: false,
            amount: None,
            amount_due: None,
        }
    }

    /// Amount to debit from the shop balance.
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Amount the wallet owner should receive after fees.
    pub fn amount_due(mut self, amount_due: f64) -> Self {
        self.amount_due = Some(amount_due);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Marks the withdraw as a test one; no funds move on the remote side.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
