//! HTTP transport abstraction.
//!
//! The pipeline talks to the network through [`HttpTransport`] so tests can
//! inject a scripted backend; [`ReqwestTransport`] is the production
//! implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// HTTP method for an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// An outgoing API request, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path starting with `/`, e.g. `/sessions`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Bearer token; the pipeline fills this in for authorized requests.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A raw API response: status plus body bytes.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Extract the server-supplied `message` field, if the body carries one.
    pub fn server_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
    }
}

/// Transport-level failure: the request produced no usable HTTP response.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-level failure
    #[error("Network unavailable: {0}")]
    Network(String),

    /// The request timed out
    #[error("Operation timed out")]
    Timeout,
}

/// Seam between the pipeline and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request and return the raw response.
    ///
    /// An `Err` means no HTTP response was obtained; HTTP-level failures
    /// (4xx/5xx) come back as `Ok` with the failing status.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Production transport over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport for the given API base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        if let Some(bearer) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {bearer}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(map_reqwest_error)?
            .to_vec();

        Ok(ApiResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}
