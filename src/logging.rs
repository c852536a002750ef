//! Structured request/response logging with secret redaction.
//!
//! What this module provides
//! - A `tracing`-backed stage emitting one `request` event before the call
//!   is forwarded and exactly one of `response`/`error` after it returns
//! - Header redaction: values of credential-bearing headers are replaced
//!   with [`REDACTION_MARKER`] before they reach any subscriber
//! - Timing: duration measured on a monotonic clock from just before the
//!   forward to just after the return, attached to the response as
//!   [`Timing`](crate::message::Timing)
//!
//! Implementation strategy
//! - `info_span!` per call with method and URI fields; events are emitted
//!   inside the span via `Instrument`, mirroring how model calls are traced
//!   elsewhere in this stack
//! - The stage never rewrites what it forwards: redaction happens on a
//!   copied header map used only for the log fields
//!
//! Testing strategy
//! - Unit tests cover the redaction filter directly; the integration suite
//!   installs a capturing subscriber and asserts that secrets never reach
//!   the sink output

use std::future::Future;
use std::pin::Pin;
use std::time::{Instant, SystemTime};

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use tower::{BoxError, Layer, Service};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::message::{Request, Response, Timing};

/// Placeholder written in place of sensitive header values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Header names whose values never reach the log output. `HeaderName`
/// normalizes to lowercase, so matching is case-insensitive by construction.
const SENSITIVE_HEADERS: [&str; 5] = [
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
];

pub fn is_sensitive(name: &HeaderName) -> bool {
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Copy of `headers` with sensitive values replaced by [`REDACTION_MARKER`].
/// Multi-valued headers keep one marker per value.
pub fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut redacted = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_sensitive(name) {
            redacted.append(name, HeaderValue::from_static(REDACTION_MARKER));
        } else {
            redacted.append(name, value.clone());
        }
    }
    redacted
}

/// Layer that logs each call through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging { inner }
    }
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = BoxError>,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let span = info_span!("send", method = %req.method(), uri = %req.uri());
        span.in_scope(|| debug!(headers = ?redact_headers(req.headers()), "request"));

        let started_at = SystemTime::now();
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let result = fut.await;
                let elapsed = start.elapsed();
                match result {
                    Ok(mut response) => {
                        info!(
                            status = response.status().as_u16(),
                            headers = ?redact_headers(response.headers()),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "response"
                        );
                        response.set_timing(Timing { started_at, elapsed });
                        Ok(response)
                    }
                    Err(error) => {
                        warn!(
                            error = %error,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "error"
                        );
                        Err(error)
                    }
                }
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{StatusCode, Uri};
    use tower::{service_fn, ServiceExt};

    #[test]
    fn redacts_all_sensitive_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret123"));
        headers.insert("cookie", HeaderValue::from_static("session=abc"));
        headers.insert("set-cookie", HeaderValue::from_static("session=abc"));
        headers.insert("x-api-key", HeaderValue::from_static("key-1"));
        headers.insert("api-key", HeaderValue::from_static("key-2"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let redacted = redact_headers(&headers);

        for name in ["authorization", "cookie", "set-cookie", "x-api-key", "api-key"] {
            assert_eq!(
                redacted.get(name).unwrap(),
                REDACTION_MARKER,
                "{name} should be redacted"
            );
        }
        assert_eq!(redacted.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        // Parsing normalizes the name to lowercase.
        headers.insert(
            "X-Api-Key".parse::<HeaderName>().unwrap(),
            HeaderValue::from_static("key-1"),
        );
        let redacted = redact_headers(&headers);
        assert_eq!(redacted.get("x-api-key").unwrap(), REDACTION_MARKER);
    }

    #[test]
    fn keeps_one_marker_per_repeated_value() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let redacted = redact_headers(&headers);
        let values: Vec<_> = redacted.get_all("set-cookie").iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| *v == REDACTION_MARKER));
    }

    #[test]
    fn does_not_mutate_the_original() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret123"));
        let _ = redact_headers(&headers);
        assert_eq!(headers.get("authorization").unwrap(), "Bearer secret123");
    }

    #[tokio::test]
    async fn attaches_timing_to_the_response() {
        let mut svc = LoggingLayer::new().layer(service_fn(|_req: Request| async {
            Ok::<_, BoxError>(Response::new(StatusCode::OK))
        }));

        let req = Request::get(Uri::from_static("https://api.example.com/v1/items"));
        let resp = svc.ready().await.unwrap().call(req).await.unwrap();

        let timing = resp.timing().expect("timing attached");
        assert!(timing.started_at <= SystemTime::now());
    }

    #[tokio::test]
    async fn passes_errors_through_unchanged() {
        let mut svc = LoggingLayer::new().layer(service_fn(|_req: Request| async {
            Err::<Response, BoxError>("connection reset".into())
        }));

        let req = Request::get(Uri::from_static("https://api.example.com/v1/items"));
        let err = svc.ready().await.unwrap().call(req).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
