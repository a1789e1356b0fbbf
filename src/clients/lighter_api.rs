// Lighter REST API client
//
// Thin retrying facade over the handful of venue endpoints the grid needs.
// Paths and response field names come from `ApiSchema`; signing is pluggable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::clients::signing::{sign_params, HmacSha256Signer, RequestSigner};
use crate::config::{ApiCredentials, ApiSchema, NetworkSettings};
use crate::core::error_handling::{ErrorClass, RetryPolicy, RetryableError};
use crate::core::types::Side;

const USER_AGENT: &str = concat!("lighter-grid-bot/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpMethod {
    Get,
    Post,
}

/// An order the venue reports as resting
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub raw: Value,
}

pub struct LighterClient {
    http: reqwest::Client,
    base_url: String,
    schema: ApiSchema,
    signer: Arc<dyn RequestSigner>,
    retry: RetryPolicy,
}

impl LighterClient {
    pub fn new(
        credentials: &ApiCredentials,
        network: &NetworkSettings,
        schema: ApiSchema,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&credentials.api_key)
            .map_err(|e| ApiError::Signing(format!("API key is not a valid header value: {}", e)))?;
        headers.insert("x-api-key", api_key);

        let http = reqwest::Client::builder()
            .timeout(network.timeout())
            .pool_max_idle_per_host(network.pool_max_idle_per_host)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            http,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            schema,
            signer: Arc::new(HmacSha256Signer::new(credentials.api_secret.clone())),
            retry: RetryPolicy::new(network.max_retries, network.retry_backoff()),
        })
    }

    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Last traded price for `symbol` (unsigned)
    pub async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ApiError> {
        let params = BTreeMap::from([("symbol".to_string(), symbol.to_string())]);
        let ticker = self
            .request("get_current_price", HttpMethod::Get, &["ticker"], params, false)
            .await?;

        let price = ticker
            .get(&self.schema.price_field)
            .and_then(decimal_from_json)
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!(
                    "ticker for {} has no usable '{}' field",
                    symbol, self.schema.price_field
                ))
            })?;

        if price <= Decimal::ZERO {
            return Err(ApiError::InvalidResponse(format!(
                "ticker for {} returned non-positive price {}",
                symbol, price
            )));
        }
        Ok(price)
    }

    /// Place a limit order. `Ok(None)` means the venue answered without an order id.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<Option<String>, ApiError> {
        let params = BTreeMap::from([
            ("symbol".to_string(), symbol.to_string()),
            ("side".to_string(), side.as_str().to_string()),
            ("price".to_string(), price.to_string()),
            ("quantity".to_string(), quantity.to_string()),
            ("leverage".to_string(), leverage.to_string()),
            ("type".to_string(), "limit".to_string()),
        ]);
        let response = self
            .request("place_order", HttpMethod::Post, &["order"], params, true)
            .await?;

        Ok(response.get(&self.schema.order_id_field).and_then(id_from_json))
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<Value, ApiError> {
        self.request("cancel_order", HttpMethod::Post, &["order", order_id], BTreeMap::new(), true)
            .await
    }

    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<Value, ApiError> {
        let params = BTreeMap::from([("symbol".to_string(), symbol.to_string())]);
        self.request("cancel_all_orders", HttpMethod::Post, &["orders", "cancel-all"], params, true)
            .await
    }

    pub async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ApiError> {
        let params = BTreeMap::from([
            ("symbol".to_string(), symbol.to_string()),
            ("status".to_string(), "open".to_string()),
        ]);
        let response = self
            .request("list_open_orders", HttpMethod::Get, &["orders"], params, true)
            .await?;

        let records = match &self.schema.orders_field {
            Some(field) => response.get(field).cloned().unwrap_or(Value::Null),
            None => response,
        };
        let records = match records {
            Value::Array(records) => records,
            other => {
                return Err(ApiError::InvalidResponse(format!(
                    "expected an array of open orders, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(records
            .into_iter()
            .map(|raw| self.parse_open_order(raw))
            .collect())
    }

    pub async fn get_balance(&self) -> Result<Value, ApiError> {
        self.request("get_balance", HttpMethod::Get, &["account", "balance"], BTreeMap::new(), true)
            .await
    }

    /// Base URL + API prefix + `segments`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let root = format!("{}{}", self.base_url, self.schema.api_prefix);
        let mut url = Url::parse(&root)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", root, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot take a path", root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn parse_open_order(&self, raw: Value) -> OpenOrder {
        OpenOrder {
            order_id: raw.get(&self.schema.order_id_field).and_then(id_from_json),
            side: raw
                .get("side")
                .and_then(Value::as_str)
                .and_then(|s| match s.to_ascii_lowercase().as_str() {
                    "buy" => Some(Side::Buy),
                    "sell" => Some(Side::Sell),
                    _ => None,
                }),
            price: raw.get("price").and_then(decimal_from_json),
            quantity: raw.get("quantity").and_then(decimal_from_json),
            raw,
        }
    }

    async fn request(
        &self,
        operation: &str,
        method: HttpMethod,
        path: &[&str],
        params: BTreeMap<String, String>,
        signed: bool,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;

        self.retry
            .execute(operation, || {
                let url = url.clone();
                let mut params = params.clone();
                async move {
                    // Fresh timestamp per attempt so retries are not rejected as stale
                    if signed {
                        sign_params(self.signer.as_ref(), &mut params, Utc::now().timestamp_millis())?;
                    }

                    debug!("{} {:?} {}", operation, method, url);
                    let builder = match method {
                        HttpMethod::Get => self.http.get(url).query(&params),
                        HttpMethod::Post => self.http.post(url).json(&params),
                    };
                    let response = builder.send().await?;

                    let status = response.status();
                    let body = response.text().await?;
                    if !status.is_success() {
                        return Err(ApiError::Http {
                            status: status.as_u16(),
                            body: truncate(&body),
                        });
                    }

                    if body.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    serde_json::from_str(&body).map_err(|e| {
                        ApiError::InvalidResponse(format!("{} returned invalid JSON: {}", operation, e))
                    })
                }
            })
            .await
    }
}

impl std::fmt::Debug for LighterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LighterClient")
            .field("base_url", &self.base_url)
            .field("schema", &self.schema)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Decimal from a JSON string or number
fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn id_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Map an HTTP status to a retry class
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        400 | 401 | 403 | 404 => ErrorClass::ClientRequest,
        _ => ErrorClass::Transient,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<ApiError>,
    },
}

impl ApiError {
    /// HTTP status of the (last) failure, if the venue answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Timeout or connection failure, including exhausted retries of one
    pub fn is_network(&self) -> bool {
        self.class() == ErrorClass::Transport
    }
}

impl RetryableError for ApiError {
    fn class(&self) -> ErrorClass {
        match self {
            ApiError::Timeout(_) | ApiError::Connection(_) => ErrorClass::Transport,
            ApiError::Http { status, .. } => classify_status(*status),
            ApiError::InvalidResponse(_) | ApiError::Signing(_) | ApiError::InvalidUrl(_) => {
                ErrorClass::Application
            }
            ApiError::RetriesExhausted { last, .. } => last.class(),
        }
    }

    fn exhausted(operation: &str, attempts: u32, last: Self) -> Self {
        ApiError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
            last: Box::new(last),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            ApiError::Signing(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}
