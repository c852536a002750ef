//! User-agent tagging for outgoing requests.
//!
//! Innermost stage of the canonical stack. If the caller already set a
//! `User-Agent`, the configured product token is appended after a space
//! rather than clobbering it; otherwise it is inserted. The stage mutates
//! only its own copy of the request (requests move through the stack by
//! value), so the caller never observes the tagged header.

use http::header::{HeaderValue, USER_AGENT};
use tower::{Layer, Service};

use crate::error::InterceptError;
use crate::message::Request;

/// Product token for pipelines that do not configure their own.
pub const DEFAULT_USER_AGENT: &str = concat!("tower-intercept/", env!("CARGO_PKG_VERSION"));

/// Layer that tags requests with a user-agent string.
#[derive(Debug, Clone)]
pub struct UserAgentLayer {
    value: HeaderValue,
}

impl UserAgentLayer {
    pub fn new(value: HeaderValue) -> Self {
        Self { value }
    }

    /// Layer tagging requests with this crate's own product token.
    pub fn default_agent() -> Self {
        Self::new(HeaderValue::from_static(DEFAULT_USER_AGENT))
    }

    pub fn try_from_str(value: &str) -> crate::Result<Self> {
        HeaderValue::from_str(value).map(Self::new).map_err(|_| {
            InterceptError::Config(format!("user agent {value:?} is not a valid header value"))
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserAgent<S> {
    inner: S,
    value: HeaderValue,
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgent<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgent {
            inner,
            value: self.value.clone(),
        }
    }
}

impl<S> Service<Request> for UserAgent<S>
where
    S: Service<Request>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let tagged = match req.headers().get(USER_AGENT) {
            None => Some(self.value.clone()),
            Some(existing) => {
                // Two valid header values joined by a space are still valid.
                let combined = [existing.as_bytes(), b" ", self.value.as_bytes()].concat();
                HeaderValue::from_bytes(&combined).ok()
            }
        };
        if let Some(value) = tagged {
            req.headers_mut().insert(USER_AGENT, value);
        }
        self.inner.call(req)
    }
}
