// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Uniform query interface over every source of search results.

use crate::models::search::{ResultSource, SearchResult};
use async_trait::async_trait;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout for external provider APIs
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(ResultSource),
    #[error("request to {provider} failed: {message}")]
    Request {
        provider: ResultSource,
        message: String,
    },
    #[error("{provider} API returned status {status}: {body}")]
    Status {
        provider: ResultSource,
        status: u16,
        body: String,
    },
    #[error("failed to decode {provider} response: {message}")]
    Decode {
        provider: ResultSource,
        message: String,
    },
    #[error("{0}")]
    Other(String),
}

/// A source of normalized search results: the local catalog or an external API.
#[async_trait]
pub trait TrackProvider: Send + Sync {
    fn source(&self) -> ResultSource;

    /// Whether the provider has the credentials it needs to be queried
    fn is_configured(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchResult>, ProviderError>;
}

/// Timeout applied to provider HTTP clients, from `PROVIDER_TIMEOUT_SECS`
pub fn provider_timeout_from_env() -> Duration {
    env::var("PROVIDER_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
}

/// Shared HTTP client construction for provider APIs
pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET `url` and return the body of a 200 response.
///
/// Query strings carry API keys, so request errors never include the URL.
pub(crate) async fn fetch_json_body(
    client: &reqwest::Client,
    source: ResultSource,
    url: url::Url,
) -> Result<String, ProviderError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::Request {
            provider: source,
            message: e.without_url().to_string(),
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ProviderError::Request {
        provider: source,
        message: e.without_url().to_string(),
    })?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: source,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    source: ResultSource,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Decode {
        provider: source,
        message: e.to_string(),
    })
}

/// Serve `router` on an ephemeral local port and return its base URL
#[cfg(test)]
pub(crate) async fn spawn_test_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
