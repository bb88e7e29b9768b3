//! Single upstream fetch with bounded retry and body normalization.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::decode::decode_body;
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;

/// Classified transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    /// HTTP 429. Surfaced immediately so callers can stop hammering the host.
    RateLimited,
    /// Any other non-2xx status.
    Status(u16),
    Other,
}

/// Failure of a whole transport call, after the retry bound was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    attempts: u32,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts,
        }
    }

    fn from_http(error: &HttpError, attempts: u32) -> Self {
        let kind = match error.kind() {
            HttpErrorKind::Timeout => TransportErrorKind::Timeout,
            HttpErrorKind::Connect => TransportErrorKind::Connect,
            HttpErrorKind::Other => TransportErrorKind::Other,
        };
        Self::new(kind, error.message(), attempts)
    }

    fn from_status(status: u16, attempts: u32) -> Self {
        if status == 429 {
            Self::new(
                TransportErrorKind::RateLimited,
                "upstream returned 429 Too Many Requests",
                attempts,
            )
        } else {
            Self::new(
                TransportErrorKind::Status(status),
                format!("upstream returned status {status}"),
                attempts,
            )
        }
    }

    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn is_rate_limited(&self) -> bool {
        matches!(self.kind, TransportErrorKind::RateLimited)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            TransportErrorKind::Timeout => "transport.timeout",
            TransportErrorKind::Connect => "transport.connect",
            TransportErrorKind::RateLimited => "transport.rate_limited",
            TransportErrorKind::Status(_) => "transport.status",
            TransportErrorKind::Other => "transport.other",
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, after {} attempt(s))",
            self.message,
            self.code(),
            self.attempts
        )
    }
}

impl std::error::Error for TransportError {}

/// Successful fetch: raw bytes plus the declared content encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_encoding: Option<String>,
    pub attempts: u32,
}

impl FetchedBody {
    /// Body as text, decompressing when declared or sniffed.
    pub fn text(&self) -> String {
        decode_body(&self.bytes, self.content_encoding.as_deref())
    }
}

// Outcome of one attempt inside the retry loop.
enum FetchAttempt {
    Success(HttpResponse),
    Retry(TransportError),
    Fail(TransportError),
}

/// Retrying, decoding wrapper around an [`HttpClient`].
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn HttpClient>,
    retry: RetryConfig,
}

impl Transport {
    pub fn new(client: Arc<dyn HttpClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch `url`, retrying timeouts and connection failures up to the bound.
    ///
    /// 429 and every other non-2xx status fail immediately.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout_ms: u64,
    ) -> Result<FetchedBody, TransportError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = HttpRequest::get(url)
                .with_headers(headers)
                .with_timeout_ms(timeout_ms);

            match self.attempt(request, attempt).await {
                FetchAttempt::Success(response) => {
                    tracing::debug!(url, attempt, status = response.status, "fetch succeeded");
                    return Ok(FetchedBody {
                        bytes: response.body,
                        content_encoding: response.content_encoding,
                        attempts: attempt,
                    });
                }
                FetchAttempt::Fail(error) => {
                    tracing::debug!(url, attempt, error = %error, "fetch failed without retry");
                    return Err(error);
                }
                FetchAttempt::Retry(error) if attempt >= max_attempts => {
                    tracing::warn!(url, attempt, error = %error, "fetch retry budget exhausted");
                    return Err(error);
                }
                FetchAttempt::Retry(error) => {
                    let delay = self.retry.delay_for_retry(attempt - 1);
                    tracing::warn!(
                        url,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "fetch failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// [`Transport::fetch`] followed by body decoding.
    pub async fn fetch_text(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout_ms: u64,
    ) -> Result<String, TransportError> {
        Ok(self.fetch(url, headers, timeout_ms).await?.text())
    }

    async fn attempt(&self, request: HttpRequest, attempt: u32) -> FetchAttempt {
        match self.client.execute(request).await {
            Ok(response) if response.is_success() => FetchAttempt::Success(response),
            Ok(response) => FetchAttempt::Fail(TransportError::from_status(response.status, attempt)),
            Err(error) if RetryConfig::is_retryable(error.kind()) => {
                FetchAttempt::Retry(TransportError::from_http(&error, attempt))
            }
            Err(error) => FetchAttempt::Fail(TransportError::from_http(&error, attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedHttpClient {
        script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedHttpClient {
        fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("calls lock")
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            *self.calls.lock().expect("calls lock") += 1;
            let next = self
                .script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::other("script exhausted")));
            Box::pin(async move { next })
        }
    }

    fn transport(client: Arc<ScriptedHttpClient>, attempts: u32) -> Transport {
        Transport::new(client, RetryConfig::fixed(Duration::ZERO, attempts))
    }

    #[tokio::test]
    async fn retries_timeouts_and_returns_final_attempt_body() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Err(HttpError::timeout("t1")),
            Err(HttpError::timeout("t2")),
            Ok(HttpResponse::ok("third")),
        ]));

        let body = transport(client.clone(), 3)
            .fetch("https://example.test", &BTreeMap::new(), 100)
            .await
            .expect("third attempt succeeds");

        assert_eq!(body.bytes, b"third");
        assert_eq!(body.attempts, 3);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn rate_limit_fails_immediately() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::ok("never reached")),
        ]));

        let error = transport(client.clone(), 3)
            .fetch("https://example.test", &BTreeMap::new(), 100)
            .await
            .expect_err("429 is a hard failure");

        assert!(error.is_rate_limited());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn other_status_is_not_retried() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(503, ""))]));

        let error = transport(client.clone(), 3)
            .fetch("https://example.test", &BTreeMap::new(), 100)
            .await
            .expect_err("503 fails");

        assert_eq!(error.kind(), TransportErrorKind::Status(503));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn connection_errors_stop_at_the_bound() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Err(HttpError::connect("c1")),
            Err(HttpError::connect("c2")),
            Ok(HttpResponse::ok("too late")),
        ]));

        let error = transport(client.clone(), 2)
            .fetch("https://example.test", &BTreeMap::new(), 100)
            .await
            .expect_err("bound is two attempts");

        assert_eq!(error.kind(), TransportErrorKind::Connect);
        assert_eq!(error.attempts(), 2);
        assert_eq!(client.calls(), 2);
    }
}
