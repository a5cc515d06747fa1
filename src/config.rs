// Process configuration, read from the environment

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::upstream::ClientConfig;

pub const ENV_BASE_URL: &str = "PRODUCT_BASE_URL";
pub const ENV_LISTEN_ADDR: &str = "GATEWAY_LISTEN_ADDR";
pub const ENV_TIMEOUT_MS: &str = "UPSTREAM_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "UPSTREAM_MAX_RETRIES";
pub const ENV_FAILURE_THRESHOLD: &str = "UPSTREAM_FAILURE_THRESHOLD";
pub const ENV_RESET_TIMEOUT_MS: &str = "UPSTREAM_RESET_TIMEOUT_MS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub upstream: ClientConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            upstream: ClientConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from any key lookup; unset optional keys keep
    /// their defaults, the upstream base URL is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let base_url = lookup(ENV_BASE_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(ENV_BASE_URL))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: ENV_BASE_URL,
                reason: format!("{base_url:?} is not an http(s) url"),
            });
        }
        config.upstream.base_url = base_url;

        if let Some(addr) = parse_var(&lookup, ENV_LISTEN_ADDR)? {
            config.listen_addr = addr;
        }
        if let Some(timeout_ms) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS)? {
            if timeout_ms == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_TIMEOUT_MS,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.upstream.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = parse_var(&lookup, ENV_MAX_RETRIES)? {
            config.upstream.retry_config.max_retries = max_retries;
        }
        if let Some(threshold) = parse_var(&lookup, ENV_FAILURE_THRESHOLD)? {
            config.upstream.circuit_breaker_config.failure_threshold = threshold;
        }
        if let Some(reset_ms) = parse_var(&lookup, ENV_RESET_TIMEOUT_MS)? {
            config.upstream.circuit_breaker_config.reset_timeout_ms = reset_ms;
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn base_url_is_required() {
        let err = GatewayConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_BASE_URL));

        let err = GatewayConfig::from_lookup(lookup(&[(ENV_BASE_URL, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_BASE_URL));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config =
            GatewayConfig::from_lookup(lookup(&[(ENV_BASE_URL, "http://products:8081")])).unwrap();

        assert_eq!(config.upstream.base_url, "http://products:8081");
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.upstream.timeout_ms, 5000);
        assert_eq!(config.upstream.retry_config.max_retries, 3);
        assert_eq!(config.upstream.circuit_breaker_config.failure_threshold, 5);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://products.internal"),
            (ENV_LISTEN_ADDR, "127.0.0.1:9000"),
            (ENV_TIMEOUT_MS, "250"),
            (ENV_MAX_RETRIES, "0"),
            (ENV_FAILURE_THRESHOLD, "2"),
            (ENV_RESET_TIMEOUT_MS, "1000"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.upstream.timeout_ms, 250);
        assert_eq!(config.upstream.retry_config.max_retries, 0);
        assert_eq!(config.upstream.circuit_breaker_config.failure_threshold, 2);
        assert_eq!(config.upstream.circuit_breaker_config.reset_timeout_ms, 1000);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[(ENV_BASE_URL, "ftp://products")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_BASE_URL, .. }));

        let err = GatewayConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://products"),
            (ENV_TIMEOUT_MS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_TIMEOUT_MS, .. }));

        let err = GatewayConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://products"),
            (ENV_TIMEOUT_MS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_TIMEOUT_MS, .. }));

        let err = GatewayConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://products"),
            (ENV_LISTEN_ADDR, "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_LISTEN_ADDR, .. }));
    }
}
