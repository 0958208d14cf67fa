use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::endpoint::{AuthHeaderTable, Endpoint};
use crate::error::{Result, ServiceError};
use crate::retry::RetryPolicy;
use crate::session::{Authenticator, Credentials, Session, SessionCoordinator};
use crate::sse::{SseStream, SseSubscriber};
use crate::transport::{HttpRequest, Transport};

/// Wraps a [`Transport`] with session headers and one-shot reauthentication.
///
/// On 401/403 the connector forces exactly one refresh and retries the
/// original request once; a second auth failure is returned to the caller.
#[derive(Clone)]
pub struct AuthenticatedConnector {
    transport: Arc<dyn Transport>,
    sessions: SessionCoordinator,
    header_table: AuthHeaderTable,
    retry_policy: RetryPolicy,
}

impl AuthenticatedConnector {
    pub fn new(transport: Arc<dyn Transport>, sessions: SessionCoordinator) -> Self {
        Self {
            transport,
            sessions,
            header_table: AuthHeaderTable::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_header_table(mut self, header_table: AuthHeaderTable) -> Self {
        self.header_table = header_table;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn sessions(&self) -> &SessionCoordinator {
        &self.sessions
    }

    /// Execute and decode the JSON response body.
    pub async fn execute<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let bytes = self.execute_raw(endpoint).await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            debug!("Failed to decode {:?} response: {}", endpoint.kind(), err);
            ServiceError::DecodingError(err.to_string())
        })
    }

    /// Execute and return the raw response body.
    ///
    /// An `Unauthorized` or `Forbidden` returned here already survived one
    /// forced refresh and retry; callers must treat it as a forced logout.
    pub async fn execute_raw(&self, endpoint: &Endpoint) -> Result<Vec<u8>> {
        let request = HttpRequest::from_endpoint(endpoint);

        if !endpoint.requires_session() {
            debug!("Making unauthenticated request {:?}", endpoint.kind());
            return self.send(endpoint, &request).await;
        }

        let session = self.sessions.get_valid_session(false).await?;
        let authorized = self.authorize(endpoint, request.clone(), &session);
        match self.send(endpoint, &authorized).await {
            Err(err) if err.is_auth_failure() => {
                warn!(
                    "Auth error {} on {:?}, refreshing session and retrying once",
                    err,
                    endpoint.kind()
                );
                let session = self.sessions.get_valid_session(true).await?;
                let retried = self.authorize(endpoint, request, &session);
                let result = self.send(endpoint, &retried).await;
                self.surface_rejection(endpoint, result)
            }
            other => other,
        }
    }

    /// Streaming counterpart of [`execute`](Self::execute) for SSE endpoints.
    ///
    /// Auth failures follow the same forced-logout contract as [`execute_raw`](Self::execute_raw).
    pub async fn execute_stream<T>(&self, endpoint: &Endpoint, timeout: Duration) -> Result<SseStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let subscriber = SseSubscriber::new(self.transport.clone());
        let request = HttpRequest::from_endpoint(endpoint);

        if !endpoint.requires_session() {
            return subscriber.subscribe(request, Vec::new(), timeout).await;
        }

        let session = self.sessions.get_valid_session(false).await?;
        let headers = self.auth_headers(endpoint, &session);
        match subscriber.subscribe(request.clone(), headers, timeout).await {
            Err(err) if err.is_auth_failure() => {
                warn!("Auth error {} opening stream, refreshing session", err);
                let session = self.sessions.get_valid_session(true).await?;
                let headers = self.auth_headers(endpoint, &session);
                let result = subscriber.subscribe(request, headers, timeout).await;
                self.surface_rejection(endpoint, result)
            }
            other => other,
        }
    }

    fn surface_rejection<T>(&self, endpoint: &Endpoint, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_auth_failure() {
                warn!(
                    "{:?} still rejected after session refresh ({}), session must be dropped",
                    endpoint.kind(),
                    err
                );
            }
        }
        result
    }

    fn auth_headers(&self, endpoint: &Endpoint, session: &Session) -> Vec<(String, String)> {
        self.header_table
            .headers_for(endpoint.kind(), &session.session_id, &session.user_id)
    }

    fn authorize(&self, endpoint: &Endpoint, request: HttpRequest, session: &Session) -> HttpRequest {
        request.with_headers(self.auth_headers(endpoint, session))
    }

    // Transient failures are retried for idempotent calls only.
    async fn send(&self, endpoint: &Endpoint, request: &HttpRequest) -> Result<Vec<u8>> {
        if endpoint.method().is_idempotent() {
            self.retry_policy
                .retry_if(|| self.transport.send(request), ServiceError::is_transient)
                .await
        } else {
            self.transport.send(request).await
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    session_id: String,
    user_id: WireId,
}

/// [`Authenticator`] that logs in through the platform's login endpoint.
pub struct TransportAuthenticator {
    transport: Arc<dyn Transport>,
}

impl TransportAuthenticator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Authenticator for TransportAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let endpoint = Endpoint::Login {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        };
        let bytes = self
            .transport
            .send(&HttpRequest::from_endpoint(&endpoint))
            .await?;
        let response: LoginResponse = serde_json::from_slice(&bytes)?;
        Ok(Session {
            session_id: response.session_id,
            user_id: response.user_id.into_string(),
        })
    }
}
