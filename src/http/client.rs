use async_trait::async_trait;
use reqwest::{self, RequestBuilder};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::constants;

// Shared HTTP client instance.
lazy_static::lazy_static! {
    static ref CLIENT: Arc<reqwest::Client> = Arc::new(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    );
}

/// Custom error type for HTTP requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Error reading response body: {0}")]
    Body(String),
}

/// Status and body of a finished HTTP exchange.
///
/// Non-2xx answers are not errors at this level: the caller decides what a
/// failed status means for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can perform a GET and hand back the raw answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &reqwest::Url) -> Result<RawResponse, RequestError>;
}

/// Builds a URL from a base path and query parameters.
pub fn build_url(path: &str, params: &[(&str, &str)]) -> Result<reqwest::Url, RequestError> {
    let url = if !params.is_empty() {
        reqwest::Url::parse_with_params(path, params)
    } else {
        reqwest::Url::parse(path)
    };
    url.map_err(|e| RequestError::InvalidUrl(path.to_string(), e.to_string()))
}

/// [`Transport`] backed by the shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Arc<reqwest::Client>,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: CLIENT.clone(),
        }
    }
}

impl ReqwestTransport {
    fn request(&self, url: &reqwest::Url) -> RequestBuilder {
        self.client
            .get(url.as_str())
            .header(reqwest::header::USER_AGENT, constants::USER_AGENT)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &reqwest::Url) -> Result<RawResponse, RequestError> {
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        // Get the response status code.
        let status = response.status().as_u16();

        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Body(e.to_string()))?;

        Ok(RawResponse::new(status, body))
    }
}
