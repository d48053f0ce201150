//! Notch Pay payment provider implementation
//!
//! Integration with the Notch Pay API for mobile money and card payments in
//! Central and West Africa (XAF, XOF, NGN, GHS, ...).

use crate::error::{AppError, AppResult, DomainError, ExternalError};
use crate::payments::signature;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{InitializeRequest, InitializeResponse, Transaction};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.notchpay.co";

const PROVIDER: &str = "Notch Pay";

/// Notch Pay provider configuration
#[derive(Debug, Clone)]
pub struct NotchPayConfig {
    /// Key sent as the `Authorization` header (public or sandbox key)
    pub api_key: String,
    /// Shared secret used to sign webhook bodies
    pub webhook_secret: String,
    /// Notch Pay API base URL (defaults to https://api.notchpay.co)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of retries for transaction lookups
    pub max_retries: u32,
    /// First backoff delay; doubled on each retry
    pub retry_base_delay: Duration,
}

impl Default for NotchPayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            webhook_secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Notch Pay payment provider
pub struct NotchPayProvider {
    config: NotchPayConfig,
    client: Client,
}

impl NotchPayProvider {
    /// Create a new Notch Pay provider instance
    pub fn new(config: NotchPayConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, endpoint);
        self.client
            .request(method, url)
            .header("Authorization", &self.config.api_key)
            .header("Accept", "application/json")
    }

    /// Send once and read the body. Only transport problems are errors here;
    /// any HTTP status is handed back to the caller.
    async fn send(&self, request: RequestBuilder) -> AppResult<(StatusCode, String)> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Ok((status, body))
    }

    /// Send an idempotent request, retrying rate limits, server errors and
    /// transport failures with exponential backoff.
    async fn send_with_retry(&self, request: RequestBuilder) -> AppResult<(StatusCode, String)> {
        let mut attempt = 0;
        loop {
            let req = request.try_clone().ok_or_else(|| {
                AppError::from(ExternalError::MalformedResponse {
                    provider: PROVIDER.to_string(),
                    message: "Failed to clone request".to_string(),
                })
            })?;

            let result = self.send(req).await;
            let retryable = match &result {
                Ok((status, _)) => {
                    *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                }
                Err(e) => e.is_retryable(),
            };

            if !retryable || attempt >= self.config.max_retries {
                return match result {
                    Ok((StatusCode::TOO_MANY_REQUESTS, _)) => {
                        Err(ExternalError::RateLimit {
                            service: PROVIDER.to_string(),
                            retry_after: Some(60),
                        }
                        .into())
                    }
                    other => other,
                };
            }

            let backoff = self.config.retry_base_delay * 2_u32.pow(attempt);
            match &result {
                Ok((status, _)) => warn!(
                    "{} returned {}, retrying after {:?} (attempt {})",
                    PROVIDER,
                    status,
                    backoff,
                    attempt + 1
                ),
                Err(e) => warn!(
                    "Request error, retrying after {:?} (attempt {}): {}",
                    backoff,
                    attempt + 1,
                    e
                ),
            }
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    error!("{} request failed: {}", PROVIDER, e);
    ExternalError::Transport {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
        is_timeout: e.is_timeout(),
    }
    .into()
}

fn malformed(message: impl Into<String>) -> AppError {
    ExternalError::MalformedResponse {
        provider: PROVIDER.to_string(),
        message: message.into(),
    }
    .into()
}

fn rejection(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<NotchPayErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    error!("{} API error: HTTP {}: {}", PROVIDER, status, message);
    ExternalError::ProviderRejection {
        provider: PROVIDER.to_string(),
        status: status.as_u16(),
        message,
    }
    .into()
}

/// References travel in the URL path; refuse anything that could change it
fn is_safe_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 128
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        && !reference.contains("..")
}

#[async_trait]
impl PaymentProvider for NotchPayProvider {
    async fn initialize_transaction(&self, request: &InitializeRequest) -> AppResult<InitializeResponse> {
        info!(
            "Initiating Notch Pay payment: {} {} {}",
            request.amount, request.currency, request.reference
        );

        let (status, body) = self
            .send(
                self.request(reqwest::Method::POST, "/transactions/initialize")
                    .json(request),
            )
            .await?;

        if status != StatusCode::CREATED {
            return Err(rejection(status, &body));
        }

        let response: NotchPayInitializeResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse Notch Pay response: {}", e);
            malformed(format!("Invalid response format: {}", e))
        })?;

        info!(
            "Notch Pay payment initiated successfully: reference={}",
            request.reference
        );

        Ok(InitializeResponse {
            authorization_url: response.authorization_url,
            provider_reference: response.transaction.and_then(|t| t.reference),
        })
    }

    async fn fetch_transaction(&self, reference: &str) -> AppResult<Transaction> {
        if !is_safe_reference(reference) {
            return Err(DomainError::MalformedReference {
                reference: reference.to_string(),
            }
            .into());
        }

        info!("Fetching Notch Pay transaction: reference={}", reference);

        let (status, body) = self
            .send_with_retry(self.request(
                reqwest::Method::GET,
                &format!("/transactions/{}", reference),
            ))
            .await?;

        match status {
            StatusCode::OK => {
                let parsed: NotchPayTransactionBody = serde_json::from_str(&body).map_err(|e| {
                    error!("Failed to parse Notch Pay transaction: {}", e);
                    malformed(format!("Invalid transaction format: {}", e))
                })?;
                let transaction = parsed.into_transaction();
                info!(
                    "Notch Pay transaction fetched: reference={}, status={}",
                    reference, transaction.status
                );
                Ok(transaction)
            }
            StatusCode::NOT_FOUND => {
                warn!("Notch Pay transaction not found: reference={}", reference);
                Err(ExternalError::TransactionNotFound {
                    provider: PROVIDER.to_string(),
                    reference: reference.to_string(),
                }
                .into())
            }
            other => Err(rejection(other, &body)),
        }
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        match signature::verify(payload, signature, &self.config.webhook_secret) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Webhook signature could not be checked: {}", e);
                false
            }
        }
    }
}

// Initialize transaction response
#[derive(Debug, Deserialize)]
struct NotchPayInitializeResponse {
    authorization_url: String,
    #[serde(default)]
    transaction: Option<NotchPayTransactionRef>,
}

#[derive(Debug, Deserialize)]
struct NotchPayTransactionRef {
    #[serde(default)]
    reference: Option<String>,
}

// Fetch responses come either wrapped or flat depending on API version
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NotchPayTransactionBody {
    Wrapped { transaction: Transaction },
    Flat(Transaction),
}

impl NotchPayTransactionBody {
    fn into_transaction(self) -> Transaction {
        match self {
            NotchPayTransactionBody::Wrapped { transaction } => transaction,
            NotchPayTransactionBody::Flat(transaction) => transaction,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotchPayErrorBody {
    #[serde(default)]
    message: Option<String>,
}
