//! Shared plumbing for the hosted-provider clients.
//!
//! Every provider call goes through [`send_json`], which applies the
//! retry policy: HTTP 429, 5xx, and transport errors are retried with
//! exponential backoff (1s, 2s, 4s, ... capped at 32s) up to
//! `max_retries` times; any other non-success status fails immediately.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },
    #[error("{0} environment variable not set")]
    MissingKey(String),
}

/// Read a required API key from the environment.
pub fn api_key(var: &str) -> Result<String, ProviderError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ProviderError::MissingKey(var.to_string())),
    }
}

/// An API key looked up when a client is built. A missing key is reported
/// on first use rather than at construction.
#[derive(Debug, Clone)]
pub struct ApiKey {
    var: String,
    value: Option<String>,
}

impl ApiKey {
    pub fn from_env(var: &str) -> Self {
        Self {
            var: var.to_string(),
            value: api_key(var).ok(),
        }
    }

    pub fn get(&self) -> Result<&str, ProviderError> {
        self.value
            .as_deref()
            .ok_or_else(|| ProviderError::MissingKey(self.var.clone()))
    }
}

pub fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Send the request produced by `build` and decode a JSON response.
///
/// `build` is called once per attempt since a sent request cannot be
/// reused.
pub async fn send_json<T, F>(
    provider: &'static str,
    max_retries: u32,
    build: F,
) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(provider, attempt, delay_secs = delay.as_secs(), "retrying");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let text = response
                        .text()
                        .await
                        .map_err(|source| ProviderError::Http { provider, source })?;
                    return serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
                        provider,
                        message: e.to_string(),
                    });
                }

                let body = response.text().await.unwrap_or_default();
                let err = ProviderError::Api {
                    provider,
                    status: status.as_u16(),
                    body,
                };
                if !is_retryable(status) {
                    return Err(err);
                }
                warn!(provider, status = status.as_u16(), "retryable provider error");
                last_err = Some(err);
            }
            Err(source) => {
                warn!(provider, error = %source, "provider request failed");
                last_err = Some(ProviderError::Http { provider, source });
            }
        }
    }

    Err(last_err.unwrap_or(ProviderError::Parse {
        provider,
        message: "no attempt was made".to_string(),
    }))
}
