//! Transport boundary. The core only needs "send a request, get bytes back"
//! and "open a stream, get byte chunks back"; [`HttpTransport`] is the
//! reqwest-backed implementation.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connection_state::{ConnectionManager, ConnectionState};
use crate::endpoint::{Endpoint, Method};
use crate::error::{Result, ServiceError};

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            method: endpoint.method(),
            path: endpoint.path(),
            query: endpoint.query(),
            headers: Vec::new(),
            body: endpoint.body(),
            timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request. Non-success statuses come back as [`ServiceError`].
    async fn send(&self, request: &HttpRequest) -> Result<Vec<u8>>;

    /// Open a long-lived response body and yield its chunks as they arrive.
    async fn open_stream(&self, request: &HttpRequest) -> Result<ByteStream>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_timeout: Duration,
    connection: ConnectionManager,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, default_timeout: Duration) -> Result<Self> {
        // No client-wide timeout: it would also cut long-lived streams.
        let client = Client::builder()
            .build()
            .map_err(|_| ServiceError::InvalidRequestFormat)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_timeout,
            connection: ConnectionManager::with_state(ConnectionState::Connected),
        })
    }

    pub fn connection_state(&self) -> ConnectionManager {
        self.connection.clone()
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url).header("Connection", "close");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }

    async fn map_send_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            warn!("Network failure: {}", err);
            self.connection.set_state(ConnectionState::Disconnected).await;
            ServiceError::NoNetworkConnection
        } else if err.is_decode() || err.is_body() {
            ServiceError::DecodingError(err.to_string())
        } else {
            ServiceError::Unknown
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        self.connection.set_state(ConnectionState::Connected).await;

        let status = response.status();
        debug!("API response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("API error body: {}", body);
        Err(error_from_body(status.as_u16(), &body))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(alias = "errorMessage", alias = "error")]
    message: Option<String>,
}

/// Bad-request, conflict and server errors may carry a message worth showing.
pub(crate) fn error_from_body(status: u16, body: &str) -> ServiceError {
    let carries_message = matches!(status, 400 | 409 | 500..=599);
    if carries_message {
        if let Ok(ErrorBody { message: Some(message) }) = serde_json::from_str::<ErrorBody>(body) {
            if !message.trim().is_empty() {
                return ServiceError::ErrorMessage(message);
            }
        }
    }
    ServiceError::from_status(status)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        debug!("API request: {} {}", request.method.as_str(), request.path);

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let response = match self.build(request).timeout(timeout).send().await {
            Ok(response) => response,
            Err(err) => return Err(self.map_send_error(err).await),
        };
        let response = self.check_status(response).await?;

        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(err) => Err(self.map_send_error(err).await),
        }
    }

    async fn open_stream(&self, request: &HttpRequest) -> Result<ByteStream> {
        debug!("Opening stream: {}", request.path);

        let builder = self
            .build(request)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");

        // The timeout bounds connection setup, not the life of the stream.
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let response = match tokio::time::timeout(timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(self.map_send_error(err).await),
            Err(_) => {
                warn!("Stream connect timed out after {:?}", timeout);
                self.connection.set_state(ConnectionState::Disconnected).await;
                return Err(ServiceError::NoNetworkConnection);
            }
        };
        let response = self.check_status(response).await?;

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|_| ServiceError::NoNetworkConnection)
        });
        Ok(stream.boxed())
    }
}
