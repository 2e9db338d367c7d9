//! Shared HTTP plumbing for the provider clients.

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracker_core::{HttpConfig, ProviderError, ReqwestErrorExt};
use url::Url;

use crate::retry::{with_retry, RetryConfig};

/// Error bodies from Open-Meteo (`reason`) and NWS (`detail`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    reason: Option<String>,
    detail: Option<String>,
    title: Option<String>,
}

/// JSON-over-HTTP client with timeout, user agent and retry policy applied.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryConfig,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| e.into_provider_error())?;

        Ok(Self {
            client,
            retry: RetryConfig::from_http_config(config),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ProviderError> {
        let response = with_retry(&self.retry, || {
            self.client
                .get(url.clone())
                .header(header::ACCEPT, "application/geo+json, application/json")
                .send()
        })
        .await
        .map_err(|e| e.into_provider_error())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let bytes = response.bytes().await.map_err(|e| e.into_provider_error())?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::InvalidResponse(format!("{} from {}", e, redact_query(url)))
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.reason.or(b.detail).or(b.title))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// Host and path only, for log lines.
fn redact_query(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or(""), url.path())
}
