//! Transport: one HTTP attempt is the host's job; retries and status handling live here.

use std::time::Duration;

use crate::error::Error;
use crate::protocol::Request;

/// Body text the switch serves once it has locked out the client after failed logins.
pub const LOCKOUT_MARKER: &str = "SECURITY LOCKOUT";

/// Where and how to reach one switch. Fixed for the whole invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total attempts per request on connection failures. 0 behaves as 1.
    pub attempts: u32,
}

impl Endpoint {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.host, path)
    }
}

/// Response from the switch, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Final URL of the request (after redirects).
    pub url: String,
    pub body: String,
}

/// Why a single attempt produced no response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),
    #[error("connect timed out: {0}")]
    ConnectTimeout(String),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("timed out waiting for response: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl SendError {
    /// Connection-level failures are worth another attempt; anything past connecting is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SendError::ConnectionReset(_) | SendError::ConnectTimeout(_) | SendError::Connect(_)
        )
    }
}

/// One authenticated HTTP attempt against the endpoint. Implementations must use
/// basic auth with the endpoint credentials and honour `endpoint.timeout`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, endpoint: &Endpoint, request: &Request) -> Result<Response, SendError>;
}

/// Send with bounded retries, then classify the response.
pub async fn request<T: Transport>(
    transport: &T,
    endpoint: &Endpoint,
    req: &Request,
) -> Result<Response, Error> {
    let attempts = endpoint.attempts.max(1);
    let mut attempt = 0;
    let response = loop {
        attempt += 1;
        tracing::debug!(method = %req.method, path = req.path, attempt, "sending request");
        match transport.send(endpoint, req).await {
            Ok(response) => break response,
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    method = %req.method,
                    path = req.path,
                    attempt,
                    attempts,
                    error = %e,
                    "request failed, retrying"
                );
            }
            Err(source) => {
                return Err(Error::TransportFailure {
                    method: req.method,
                    url: endpoint.url(req.path),
                    attempts: attempt,
                    source,
                })
            }
        }
    };
    check_response(endpoint, req, response)
}

/// Lockout is checked before status: it needs a different remedy than a plain HTTP error.
fn check_response(endpoint: &Endpoint, req: &Request, response: Response) -> Result<Response, Error> {
    if response.body.contains(LOCKOUT_MARKER) {
        return Err(Error::SecurityLockout {
            status: response.status,
            method: req.method,
            url: response.url,
            user: endpoint.user.clone(),
            password: endpoint.password.clone(),
        });
    }
    if !(200..300).contains(&response.status) {
        return Err(Error::HttpError {
            status: response.status,
            method: req.method,
            url: response.url,
            user: endpoint.user.clone(),
            password: endpoint.password.clone(),
        });
    }
    Ok(response)
}
