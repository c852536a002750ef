//! Assembling stages into a single sender.
//!
//! What this module provides
//! - [`Pipeline::builder`]: folds configuration options into nested layers
//!   at construction time. Each option wraps the chain built so far and
//!   becomes the new outermost stage, so the canonical stack
//!   rate-limit → retry → logging → user-agent → sender is spelled
//!   `builder(sender).user_agent(..).logging().retry(..).rate_limit(..)`
//! - [`Pipeline::send`]: one request in, one response or error out,
//!   indistinguishable from calling the bare sender
//!
//! Composition
//! - The chain is erased to a [`BoxCloneService`] after every option, which
//!   keeps the builder monomorphic and lets `send` take `&self`: each call
//!   drives its own clone of the stack while stateful stages (the rate
//!   limiter's bucket) stay shared through `Arc`

use std::time::Duration;

use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::config::{PipelineConfig, RateLimitConfig, RetryConfig};
use crate::error::{InterceptError, Result};
use crate::logging::LoggingLayer;
use crate::message::{Request, Response};
use crate::rate_limit::RateLimitLayer;
use crate::retry::RetryLayer;
use crate::timeout::TimeoutLayer;
use crate::user_agent::UserAgentLayer;

/// Boxed, cloneable request→response service: the shape every stage wraps
/// and the shape the finished pipeline presents.
pub type BoxSender = BoxCloneSyncService<Request, Response, BoxError>;

/// An assembled stack of stages terminating in a sender.
#[derive(Clone, Debug)]
pub struct Pipeline {
    inner: BoxSender,
}

impl Pipeline {
    /// Start a builder around the terminal sender.
    pub fn builder<S>(sender: S) -> PipelineBuilder
    where
        S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        PipelineBuilder {
            sender: BoxCloneSyncService::new(sender.map_err(Into::into)),
            invalid: None,
        }
    }

    /// Build a pipeline from a declarative config, applying stages in the
    /// canonical order: user agent innermost, then logging, retry, rate
    /// limiting, and the deadline outermost so it also bounds time spent
    /// waiting for a token.
    pub fn from_config<S>(sender: S, config: &PipelineConfig) -> Result<Pipeline>
    where
        S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        let mut builder = Pipeline::builder(sender);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if config.logging {
            builder = builder.logging();
        }
        if let Some(retry) = &config.retry {
            builder = builder.retry(retry.clone());
        }
        if let Some(rate_limit) = &config.rate_limit {
            builder = builder.rate_limit(rate_limit.clone());
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Send a request through the whole stack.
    pub async fn send(&self, req: Request) -> Result<Response> {
        let mut sender = self.inner.clone();
        let response = sender
            .ready()
            .await
            .map_err(InterceptError::from_boxed)?
            .call(req)
            .await
            .map_err(InterceptError::from_boxed)?;
        Ok(response)
    }
}

/// Builder folding options into nested stages.
pub struct PipelineBuilder {
    sender: BoxSender,
    invalid: Option<InterceptError>,
}

impl PipelineBuilder {
    /// Wrap the chain built so far in `layer`, making it the new outermost
    /// stage. The named options below all bottom out here.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxSender>,
        L::Service: Service<Request, Response = Response, Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.sender = BoxCloneSyncService::new(layer.layer(self.sender));
        self
    }

    pub fn user_agent(mut self, value: &str) -> Self {
        match UserAgentLayer::try_from_str(value) {
            Ok(layer) => self.layer(layer),
            Err(err) => {
                self.invalid.get_or_insert(err);
                self
            }
        }
    }

    pub fn logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    pub fn retry(self, config: RetryConfig) -> Self {
        self.layer(RetryLayer::new(config))
    }

    pub fn timeout(self, duration: Duration) -> Self {
        self.layer(TimeoutLayer::new(duration))
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        if !(config.requests_per_second.is_finite() && config.requests_per_second > 0.0) {
            self.invalid.get_or_insert(InterceptError::Config(format!(
                "requests_per_second must be positive, got {}",
                config.requests_per_second
            )));
            return self;
        }
        self.layer(RateLimitLayer::new(config))
    }

    /// Finish the stack. Reports the first invalid option, if any.
    pub fn build(self) -> Result<Pipeline> {
        match self.invalid {
            Some(err) => Err(err),
            None => Ok(Pipeline { inner: self.sender }),
        }
    }
}
