use {
    crate::{
        errors::{ErrorBody, MegakassaError, MegakassaResult, RemoteError},
        models::{Action, CreateWithdraw, Params},
        sign::{sign_params, SIGN_FIELD},
    },
    dotenv::dotenv,
    reqwest::Client,
    serde_json::Value,
    std::env,
    tracing::{debug, error},
    url::form_urlencoded,
};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.megakassa.ru";

/// API version segment used in request URLs.
pub const DEFAULT_API_VERSION: &str = "v1.0";

/// Represents the MegaKassa merchant client, encapsulating the shop
/// credentials and the API client.
pub struct Megakassa {
    shop_id: i64,
    secret_key: String,
    base_url: String,
    api_version: String,
    client: Client,
}

impl Megakassa {
    /// Creates a new instance of the MegaKassa client for a shop.
    ///
    /// # Examples
    ///
    /// ```
    /// use megakassa::client::Megakassa;
    ///
    /// let client = Megakassa::new(42, "secret");
    /// ```
    pub fn new(shop_id: i64, secret_key: impl Into<String>) -> Self {
        Self {
            shop_id,
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            client: Client::new(),
        }
    }

    /// Creates a client from the environment, loading `.env` first if one
    /// is present. `MEGAKASSA_SHOP_ID` and `MEGAKASSA_SECRET_KEY` are
    /// required; `MEGAKASSA_BASE_URL` and `MEGAKASSA_API_VERSION` override
    /// the defaults when set.
    ///
    /// # Examples
    ///
    /// ```
    /// use megakassa::client::Megakassa;
    ///
    /// let client = Megakassa::from_env();
    /// ```
    pub fn from_env() -> MegakassaResult<Self> {
        dotenv().ok();

        let shop_id = env::var("MEGAKASSA_SHOP_ID")
            .map_err(|_| MegakassaError::Config("MEGAKASSA_SHOP_ID is not set".to_string()))?
            .parse::<i64>()
            .map_err(|_| {
                MegakassaError::Config("MEGAKASSA_SHOP_ID must be an integer".to_string())
            })?;
        let secret_key = env::var("MEGAKASSA_SECRET_KEY")
            .map_err(|_| MegakassaError::Config("MEGAKASSA_SECRET_KEY is not set".to_string()))?;

        let mut client = Self::new(shop_id, secret_key);
        if let Ok(base_url) = env::var("MEGAKASSA_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        if let Ok(api_version) = env::var("MEGAKASSA_API_VERSION") {
            client = client.with_api_version(api_version);
        }
        Ok(client)
    }

    /// Overrides the API host, e.g. to point the client at a staging
    /// deployment or a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the API version path segment.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Replaces the underlying HTTP client. Timeouts, proxies and TLS
    /// settings are the caller's policy, not this crate's.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn shop_id(&self) -> i64 {
        self.shop_id
    }

    /// Payment methods currently available to the shop.
    pub async fn payment_methods(&self) -> MegakassaResult<Value> {
        self.request(Action::PaymentMethodsList, self.base_params())
            .await
    }

    /// Current shop balance, per currency.
    pub async fn balance(&self) -> MegakassaResult<Value> {
        self.request(Action::ShopBalance, self.base_params()).await
    }

    /// Creates a withdraw from the shop balance to an external wallet.
    ///
    /// The gateway accepts exactly one of `amount` and `amount_due`; a
    /// request carrying both or neither comes back as a gateway error.
    ///
    /// # Arguments
    ///
    /// * `withdraw` - The withdraw parameters: payment method, target
    ///   currency and wallet, and one of the two amount fields.
    pub async fn create_withdraw(&self, withdraw: CreateWithdraw) -> MegakassaResult<Value> {
        let params = self.withdraw_params(withdraw);
        self.request(Action::WithdrawCreate, params).await
    }

    /// Details of a single withdraw.
    ///
    /// # Arguments
    ///
    /// * `withdraw_id` - Identifier the gateway assigned to the withdraw
    ///   when it was created.
    pub async fn withdraw(&self, withdraw_id: i64) -> MegakassaResult<Value> {
        let params = self.base_params().with("withdraw_id", withdraw_id);
        self.request(Action::GetWithdraw, params).await
    }

    /// One page of the shop's withdraw history, 50 records per page.
    ///
    /// # Arguments
    ///
    /// * `page` - Zero-based page number.
    pub async fn withdraws(&self, page: i64) -> MegakassaResult<Value> {
        let params = self.base_params().with("page", page);
        self.request(Action::WithdrawsList, params).await
    }

    /// Computes the `sign` digest for an arbitrary parameter set with this
    /// client's secret key.
    pub fn generate_signature(&self, params: &Params) -> String {
        sign_params(params, &self.secret_key)
    }

    fn base_params(&self) -> Params {
        Params::new().with("shop_id", self.shop_id)
    }

    fn withdraw_params(&self, withdraw: CreateWithdraw) -> Params {
        let mut params = self
            .base_params()
            .with("method_id", withdraw.method_id)
            .with("currency_from", withdraw.currency_from.as_str())
            .with("wallet", withdraw.wallet)
            .with("debug", i64::from(withdraw.debug))
            .with("comment", withdraw.comment);
        if let Some(amount_due) = withdraw.amount_due {
            params.insert("amount_due", amount_due);
        }
        if let Some(amount) = withdraw.amount {
            params.insert("amount", amount);
        }
        params
    }

    fn build_url(&self, action: Action) -> String {
        format!("{}/{}/{}/", self.base_url, self.api_version, action.as_str())
    }

    /// Signs the parameters, issues the GET request and decodes the JSON
    /// body. Failures are logged with the full request context before they
    /// propagate, so a caller that drops the error still leaves a trail.
    async fn request(&self, action: Action, mut params: Params) -> MegakassaResult<Value> {
        let sign = sign_params(&params, &self.secret_key);
        params.insert(SIGN_FIELD, sign);

        let url = self.build_url(action);
        let pairs = params.to_query_pairs();
        debug!(action = action.as_str(), url = %url, "sending gateway request");

        let response = self.client.get(&url).query(&pairs).send().await;
        match self.process_response(response).await {
            Ok(value) => Ok(value),
            Err(err) => {
                error!(
                    action = action.as_str(),
                    params = ?pairs,
                    query = %encode_query(&pairs),
                    error = %err,
                    "gateway request failed"
                );
                Err(err)
            }
        }
    }

    /// Processes an HTTP response, handling success and error scenarios.
    ///
    /// A response only counts as a success when the status is 2xx, the
    /// body is valid JSON and that JSON does not carry a non-zero
    /// `error_code`. Anything else becomes a [`RemoteError`] holding the
    /// raw body, or a transport error if no response arrived at all.
    ///
    /// # Arguments
    ///
    /// * `response` - A `Result` containing either a `reqwest::Response`
    ///   or a `reqwest::Error`.
    async fn process_response(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> MegakassaResult<Value> {
        match response {
            Ok(res) => {
                let status = res.status().as_u16();
                if res.status().is_success() {
                    let body = res.text().await?;
                    let value: Value = serde_json::from_str(&body).map_err(|_| RemoteError {
                        status,
                        code: None,
                        body: body.clone(),
                    })?;
                    match extract_error_code(&body) {
                        Some(code) if code != 0 => Err(RemoteError {
                            status,
                            code: Some(code),
                            body,
                        }
                        .into()),
                        _ => Ok(value),
                    }
                } else {
                    let body = res.text().await.unwrap_or_default();
                    let code = extract_error_code(&body);
                    Err(RemoteError { status, code, body }.into())
                }
            }
            Err(e) => Err(MegakassaError::Transport(e)),
        }
    }
}

fn extract_error_code(body: &str) -> Option<u32> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|envelope| envelope.error_code)
}

fn encode_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;

    #[test]
    fn builds_action_urls_with_trailing_slash() {
        let client = Megakassa::new(1, "k");
        assert_eq!(
            client.build_url(Action::ShopBalance),
            "https://api.megakassa.ru/v1.0/shop_balance/"
        );
    }

    #[test]
    fn base_url_override_tolerates_trailing_slash() {
        let client = Megakassa::new(1, "k").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            client.build_url(Action::GetWithdraw),
            "http://127.0.0.1:9000/v1.0/get_withdraw/"
        );
    }

    #[test]
    fn api_version_override_lands_in_url() {
        let client = Megakassa::new(1, "k").with_api_version("v2.0");
        assert_eq!(
            client.build_url(Action::PaymentMethodsList),
            "https://api.megakassa.ru/v2.0/payment_methods_list/"
        );
    }

    #[test]
    fn generates_signature_with_own_secret() {
        let client = Megakassa::new(42, "secret");
        let params = Params::new().with("shop_id", 42i64);
        assert_eq!(
            client.generate_signature(&params),
            "d0dbff7baf16b65243679e39c51aea4e"
        );
    }

    #[test]
    fn withdraw_params_with_amount_only() {
        let client = Megakassa::new(10, "testkey");
        let withdraw = CreateWithdraw::new(2, Currency::Rub, "410011234567890").amount(500.0);
        let params = client.withdraw_params(withdraw);

        assert_eq!(params.get("amount").map(ToString::to_string), Some("500".to_string()));
        assert_eq!(params.get("amount_due"), None);
        assert_eq!(params.get("debug").map(ToString::to_string), Some("0".to_string()));
        assert_eq!(params.get("comment").map(ToString::to_string), Some(String::new()));

        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["shop_id", "method_id", "currency_from", "wallet", "debug", "comment", "amount"]
        );
    }

    #[test]
    fn withdraw_params_with_amount_due_only() {
        let client = Megakassa::new(10, "testkey");
        let withdraw = CreateWithdraw::new(2, Currency::Usd, "wallet-1")
            .amount_due(99.5)
            .debug(true)
            .comment("payout");
        let params = client.withdraw_params(withdraw);

        assert_eq!(params.get("amount"), None);
        assert_eq!(
            params.get("amount_due").map(ToString::to_string),
            Some("99.5".to_string())
        );
        assert_eq!(params.get("debug").map(ToString::to_string), Some("1".to_string()));
        assert_eq!(
            params.get("currency_from").map(ToString::to_string),
            Some("USD".to_string())
        );
        assert_eq!(
            params.get("comment").map(ToString::to_string),
            Some("payout".to_string())
        );
    }

    #[test]
    fn extracts_error_codes_from_bodies() {
        assert_eq!(
            extract_error_code(r#"{"error_code":6,"error_msg":"no funds"}"#),
            Some(6)
        );
        assert_eq!(extract_error_code(r#"{"balance":[]}"#), None);
        assert_eq!(extract_error_code("<html>502</html>"), None);
        assert_eq!(extract_error_code(""), None);
    }

    #[test]
    fn encodes_query_for_diagnostics() {
        let pairs = vec![
            ("shop_id".to_string(), "42".to_string()),
            ("comment".to_string(), "на кофе".to_string()),
        ];
        let encoded = encode_query(&pairs);
        assert!(encoded.starts_with("shop_id=42&comment="));
        assert!(!encoded.contains(' '));
    }
}
