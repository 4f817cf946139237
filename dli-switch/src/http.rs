//! reqwest-backed transport: one authenticated attempt per call, failures classified for retry.

use std::error::Error as _;
use std::io;

use dli_core::transport::{Endpoint, Response, SendError, Transport};
use dli_core::{Method, Request};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: &Endpoint) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(endpoint.timeout)
            .timeout(endpoint.timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, endpoint: &Endpoint, request: &Request) -> Result<Response, SendError> {
        let url = endpoint.url(request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url).form(&request.form),
        };
        let resp = builder
            .basic_auth(&endpoint.user, Some(&endpoint.password))
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let body = resp.text().await.map_err(classify)?;
        Ok(Response { status, url, body })
    }
}

fn classify(err: reqwest::Error) -> SendError {
    let msg = err.to_string();
    if is_connection_reset(&err) {
        SendError::ConnectionReset(msg)
    } else if err.is_connect() && err.is_timeout() {
        SendError::ConnectTimeout(msg)
    } else if err.is_connect() {
        SendError::Connect(msg)
    } else if err.is_timeout() {
        SendError::Timeout(msg)
    } else {
        SendError::Other(msg)
    }
}

/// reqwest wraps the socket error; look for it down the source chain.
fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endpoint(host: String) -> Endpoint {
        Endpoint {
            host,
            user: "admin".to_string(),
            password: "1234".to_string(),
            timeout: Duration::from_secs(1),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn refused_connection_is_retryable() {
        // Bind then drop to get a local port with nothing listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let ep = endpoint(format!("127.0.0.1:{}", port));
        let transport = HttpTransport::new(&ep).unwrap();
        let err = transport
            .send(&ep, &Request::read_listing())
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected classification: {:?}", err);
    }
}
