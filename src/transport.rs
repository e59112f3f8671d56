//! HTTP transport abstraction for testability.
//!
//! The service never talks to `reqwest` directly; it goes through the
//! [`Transport`] trait so tests can substitute a scripted implementation
//! and drive every failure mode deterministically.

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors a transport can report.
///
/// Anything more exotic (TLS failure, DNS failure, connection reset) is
/// collapsed into `ConnectionFailed`; the service only distinguishes the
/// cases its retry policy treats differently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request exceeded its timeout.
    #[error("request timed out")]
    Timeout,
    /// The request never produced an HTTP response.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

impl TransportError {
    /// True for HTTP 429, the upstream's rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TransportError::HttpStatus(429))
    }
}

/// A single request descriptor handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Fully-built request URL.
    pub url: String,
    /// Extra request headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
    /// Per-request timeout, independent of any retry backoff.
    pub timeout: Duration,
}

impl TransportRequest {
    /// Creates a request with no extra headers.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }
}

/// Async fetch operation: request in, body bytes or a typed error out.
pub trait Transport: Send + Sync {
    /// Performs the request and returns the response body.
    ///
    /// Implementations must report non-2xx statuses as
    /// [`TransportError::HttpStatus`] rather than returning the error body.
    fn fetch(
        &self,
        request: &TransportRequest,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// A shared transport is a transport. Lets callers hold one instance behind
/// an `Arc` and hand clones to the service, daemons and tests.
impl<T: Transport> Transport for Arc<T> {
    async fn fetch(&self, request: &TransportRequest) -> Result<Bytes, TransportError> {
        (**self).fetch(request).await
    }
}

/// Default User-Agent; some public APIs reject requests without one.
const DEFAULT_USER_AGENT: &str = concat!("coinfeed/", env!("CARGO_PKG_VERSION"));

/// Real transport backed by a pooled async `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with connection pooling and keepalive tuned for
    /// a handful of periodic API calls.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, request: &TransportRequest) -> Result<Bytes, TransportError> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::ConnectionFailed(format!("failed to read body: {}", e))
            }
        })?;

        trace!(url = %request.url, bytes = body.len(), "transport fetch complete");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_only_429() {
        assert!(TransportError::HttpStatus(429).is_rate_limit());
        assert!(!TransportError::HttpStatus(500).is_rate_limit());
        assert!(!TransportError::HttpStatus(404).is_rate_limit());
        assert!(!TransportError::Timeout.is_rate_limit());
    }

    #[test]
    fn request_without_headers() {
        let request = TransportRequest::new("https://api.example.com/v3/global", Duration::from_secs(10));
        assert!(request.headers.is_empty());
        assert_eq!(request.timeout, Duration::from_secs(10));
    }

    #[test]
    fn reqwest_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }

    struct FixedTransport(Bytes);

    impl Transport for FixedTransport {
        async fn fetch(&self, _request: &TransportRequest) -> Result<Bytes, TransportError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn arc_wrapped_transport_delegates() {
        let transport = Arc::new(FixedTransport(Bytes::from_static(b"body")));
        let request = TransportRequest::new("https://api.example.com/v3/global", Duration::from_secs(1));
        let body = transport.fetch(&request).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"body"));
    }
}
