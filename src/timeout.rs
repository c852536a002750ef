//! Per-call deadline enforcement.
//!
//! The deadline covers everything below this stage, so where it sits in the
//! stack decides what it bounds: outside the retry stage it caps the whole
//! retry sequence, inside it caps each attempt. Expiry surfaces as
//! [`InterceptError::DeadlineExceeded`], which the retry classifier treats
//! as cancellation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tower::{BoxError, Layer, Service, ServiceExt};

use crate::error::InterceptError;
use crate::message::{Request, Response};

#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    duration: Duration,
}

impl TimeoutLayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[derive(Debug, Clone)]
pub struct Timeout<S> {
    inner: S,
    duration: Duration,
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = Timeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timeout {
            inner,
            duration: self.duration,
        }
    }
}

impl<S> Service<Request> for Timeout<S>
where
    S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let duration = self.duration;

        Box::pin(async move {
            let attempt = async move { inner.ready().await?.call(req).await };
            match tokio::time::timeout(duration, attempt).await {
                Ok(result) => result,
                Err(_) => Err(InterceptError::DeadlineExceeded(duration).into()),
            }
        })
    }
}
