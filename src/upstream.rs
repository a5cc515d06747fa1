// Upstream product service client
// Owns timeouts, retries of idempotent reads and the circuit breaker; callers never retry.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Method, StatusCode, Url,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::model::{Inventory, ProductPayload};

pub const UPSTREAM_SERVICE_NAME: &str = "product-service";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Upstream responded {status_code}: {message}")]
    ApiResponse { status_code: u16, message: String },

    #[error("Malformed upstream payload: {0}")]
    Decode(String),

    #[error("Circuit breaker open for {service_name}")]
    CircuitBreakerOpen { service_name: String },
}

impl UpstreamError {
    // Failures worth another attempt on an idempotent request
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Network(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::ApiResponse { status_code, .. } => {
                *status_code >= 500 || *status_code == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            UpstreamError::Decode(_) | UpstreamError::CircuitBreakerOpen { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry_config: RetryConfig,
    pub circuit_breaker_config: CircuitBreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_ms: 5000,
            retry_config: RetryConfig::default(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
        }
    }
}

// Backoff for GET retries
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout_ms: 4000,
        }
    }
}

/// Capabilities the gateway needs from the product service.
///
/// Each call maps to exactly one logical upstream request. Product payloads are
/// returned as received.
#[async_trait]
pub trait ProductApi: Send + Sync + 'static {
    // GET /products
    async fn list_products(&self) -> Result<ProductPayload, UpstreamError>;

    // GET /product/{productId}
    async fn get_product(&self, product_id: &str) -> Result<ProductPayload, UpstreamError>;

    // GET /product/{productId}/inventory/{subInventoryId}
    async fn get_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<Inventory, UpstreamError>;

    // POST /product/{productId}/inventory/{subInventoryId}
    async fn book_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<ProductPayload, UpstreamError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub requests_circuit_broken: usize,
    pub circuit_breaker_open: bool,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    circuit_broken: AtomicUsize,
}

// reqwest-backed ProductApi
pub struct HttpProductClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
    breaker: Mutex<CircuitBreaker>,
    counters: Counters,
}

impl HttpProductClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::ConfigError(format!("invalid base url {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "base url {:?} cannot carry a path",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        let cb = &config.circuit_breaker_config;
        let breaker = CircuitBreaker::new(
            UPSTREAM_SERVICE_NAME,
            cb.failure_threshold,
            cb.success_threshold,
            Duration::from_millis(cb.reset_timeout_ms),
        );

        Ok(Self {
            http,
            base_url,
            config,
            breaker: Mutex::new(breaker),
            counters: Counters::default(),
        })
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests_sent: self.counters.sent.load(Ordering::SeqCst),
            requests_succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            requests_failed: self.counters.failed.load(Ordering::SeqCst),
            requests_retried: self.counters.retried.load(Ordering::SeqCst),
            requests_circuit_broken: self.counters.circuit_broken.load(Ordering::SeqCst),
            circuit_breaker_open: self.breaker.lock().state() == BreakerState::Open,
        }
    }

    pub fn circuit_state(&self) -> BreakerState {
        self.breaker.lock().state()
    }

    // Forcibly close the breaker (operator use)
    pub fn reset_circuit_breaker(&self) {
        self.breaker.lock().reset();
    }

    // Helper to calculate exponential backoff with jitter
    pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
        let base_backoff_ms = (config.initial_backoff_ms as f64
            * config.backoff_multiplier.powf(retry_attempt as f64))
        .min(config.max_backoff_ms as f64);

        // Spread retries so callers failing together do not retry together
        let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms as u64)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, segments: &[&str]) -> Result<Bytes, UpstreamError> {
        let url = self.endpoint(segments);
        let max_retries = self.config.retry_config.max_retries;
        let mut attempt = 0;

        loop {
            match self.send(Method::GET, url.clone()).await {
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    let backoff = Self::calculate_backoff(attempt, &self.config.retry_config);
                    warn!(
                        %url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying upstream read"
                    );
                    self.counters.retried.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    // Booking is not idempotent, so writes get exactly one attempt.
    async fn post(&self, segments: &[&str]) -> Result<Bytes, UpstreamError> {
        self.send(Method::POST, self.endpoint(segments)).await
    }

    async fn send(&self, method: Method, url: Url) -> Result<Bytes, UpstreamError> {
        {
            let mut breaker = self.breaker.lock();
            if !breaker.should_allow_call() {
                self.counters.circuit_broken.fetch_add(1, Ordering::SeqCst);
                return Err(UpstreamError::CircuitBreakerOpen {
                    service_name: breaker.service_name().to_string(),
                });
            }
        }

        debug!(%method, %url, "upstream request");
        self.counters.sent.fetch_add(1, Ordering::SeqCst);

        let result = self.send_once(method, url).await;

        let mut breaker = self.breaker.lock();
        match &result {
            Ok(_) => {
                self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
                breaker.success();
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                // 4xx means upstream is healthy and said no
                if err.is_retryable() {
                    breaker.fail();
                } else {
                    breaker.success();
                }
            }
        }

        result
    }

    async fn send_once(&self, method: Method, url: Url) -> Result<Bytes, UpstreamError> {
        let response = self
            .http
            .request(method, url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ApiResponse {
                status_code: status.as_u16(),
                message,
            });
        }

        response.bytes().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.timeout_ms)
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

// Payloads pass through untouched, but must at least be JSON.
fn json_payload(body: Bytes) -> Result<ProductPayload, UpstreamError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(&body)
        .map_err(|e| UpstreamError::Decode(e.to_string()))?;
    Ok(ProductPayload::from(body))
}

#[async_trait]
impl ProductApi for HttpProductClient {
    async fn list_products(&self) -> Result<ProductPayload, UpstreamError> {
        json_payload(self.get(&["products"]).await?)
    }

    async fn get_product(&self, product_id: &str) -> Result<ProductPayload, UpstreamError> {
        json_payload(self.get(&["product", product_id]).await?)
    }

    async fn get_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<Inventory, UpstreamError> {
        let body = self
            .get(&["product", product_id, "inventory", sub_inventory_id])
            .await?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn book_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<ProductPayload, UpstreamError> {
        json_payload(
            self.post(&["product", product_id, "inventory", sub_inventory_id])
                .await?,
        )
    }
}
