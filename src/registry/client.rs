//! HTTP client for registry lookups
//!
//! Shared by every catalog fetch in a run:
//! - Configurable timeout and User-Agent
//! - Exponential backoff retry on transport errors, timeouts and 429s
//! - 404 reported as a missing package, never retried

use crate::error::RegistryError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
const DEFAULT_USER_AGENT: &str = concat!("depdoctor/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// Outcome of a single attempt
enum Attempt<T> {
    Done(Result<T, RegistryError>),
    Retry(RegistryError),
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                RegistryError::network_error(
                    "",
                    "HTTP client",
                    format!("failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET a URL and decode its JSON body, retrying transient failures
    ///
    /// `package` and `registry` only label errors.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        registry: &str,
    ) -> Result<T, RegistryError> {
        let mut delay = BASE_DELAY_MS;
        let mut attempt = 0;

        loop {
            let error = match self.attempt(url, package, registry).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(error) => error,
            };
            if attempt >= self.max_retries {
                return Err(error);
            }
            debug!("retrying {} in {}ms after: {}", url, delay, error);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay *= 2;
            attempt += 1;
        }
    }

    async fn attempt<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        registry: &str,
    ) -> Attempt<T> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry(RegistryError::timeout(package, registry))
            }
            Err(e) => {
                return Attempt::Retry(RegistryError::network_error(
                    package,
                    registry,
                    e.to_string(),
                ))
            }
        };

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Attempt::Retry(RegistryError::rate_limit_exceeded(registry))
            }
            StatusCode::NOT_FOUND => {
                return Attempt::Done(Err(RegistryError::package_not_found(package, registry)))
            }
            status if status.is_server_error() => {
                return Attempt::Retry(RegistryError::network_error(
                    package,
                    registry,
                    format!("HTTP {}", status),
                ))
            }
            status if !status.is_success() => {
                return Attempt::Done(Err(RegistryError::network_error(
                    package,
                    registry,
                    format!("HTTP {}", status),
                )))
            }
            _ => {}
        }

        match response.json::<T>().await {
            Ok(parsed) => Attempt::Done(Ok(parsed)),
            Err(e) => Attempt::Retry(RegistryError::invalid_response(
                package,
                registry,
                format!("failed to parse JSON: {}", e),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new().is_ok());
    }

    #[test]
    fn test_http_client_with_config() {
        let client = HttpClient::with_config(Duration::from_secs(60), "test-agent/1.0");
        assert!(client.is_ok());
    }

    #[test]
    fn test_http_client_with_max_retries() {
        let client = HttpClient::new().unwrap().with_max_retries(5);
        assert_eq!(client.max_retries, 5);
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));
        assert!(DEFAULT_USER_AGENT.starts_with("depdoctor/"));
        assert_eq!(MAX_RETRIES, 3);
        assert_eq!(BASE_DELAY_MS, 100);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = HttpClient::with_config(Duration::from_millis(500), "test")
            .unwrap()
            .with_max_retries(0);
        let result: Result<serde_json::Value, _> = client
            .get_json("http://127.0.0.1:9/pkg", "pkg", "npm")
            .await;
        let err = result.unwrap_err();
        assert!(!err.is_not_found());
    }
}
