use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// A specialized `Result` type for gateway operations.
pub type MegakassaResult<T> = std::result::Result<T, MegakassaError>;

/// Errors a gateway call can surface.
#[derive(Debug, Error)]
pub enum MegakassaError {
    /// The gateway answered, but with an error: a non-2xx status or a
    /// body carrying a non-zero `error_code`.
    #[error("gateway error: {0}")]
    Remote(#[from] RemoteError),

    /// The request never produced a usable response: connect failures,
    /// timeouts, broken transfers.
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Missing or malformed client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// An error response from the gateway, kept verbatim.
///
/// `body` is the raw response text; `code` is the `error_code` extracted
/// from it when the body was JSON with one. Nothing else is parsed, so
/// unexpected error shapes still reach the caller intact.
#[derive(Debug, Clone)]
pub struct RemoteError {
    /// HTTP status of the response.
    pub status: u16,
    /// Numeric gateway error code, when the body carried one.
    pub code: Option<u32>,
    /// Raw response body.
    pub body: String,
}

impl RemoteError {
    /// Documented description for `code`, if the code is a known one.
    pub fn message(&self) -> Option<&'static str> {
        self.code.and_then(error_message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(code) = self.code {
            write!(f, ", code {}", code)?;
            if let Some(message) = error_message(code) {
                write!(f, " ({})", message)?;
            }
        }
        write!(f, ": {}", self.body)
    }
}

impl std::error::Error for RemoteError {}

/// Error envelope the gateway returns alongside a code. Other body fields
/// stay in [`RemoteError::body`] untouched.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error_code: Option<u32>,
}

/// Descriptions of the documented gateway error codes, verbatim from the
/// API reference (the gateway documents them in Russian only).
pub fn error_message(code: u32) -> Option<&'static str> {
    Some(match code {
        1 => "Неверная цифровая подпись запроса",
        2 => "Магазин не найден",
        3 => "Магазин отключен или заблокирован",
        4 => "Отсутствует обязательный параметр запроса",
        5 => "Платежный метод недоступен",
        6 => "Недостаточно средств на балансе магазина",
        7 => "Сумма выплаты меньше минимально допустимой",
        8 => "Сумма выплаты больше максимально допустимой",
        9 => "Неверный номер кошелька или счета",
        10 => "Выплата не найдена",
        11 => "Неверная валюта",
        12 => "Превышен дневной лимит выплат",
        13 => "Сервис временно недоступен, повторите запрос позже",
        _ => return None,
    })
}
