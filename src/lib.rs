//! # tower-intercept
//!
//! Composable Tower middleware for HTTP API clients. The crate wraps an
//! outbound sender (any `Service<Request, Response = Response>`) with
//! independently stackable stages, and ships a lazy pager for offset/limit
//! list endpoints.
//!
//! ## Core concepts
//!
//! - **Sender**: the terminal transport that performs the actual I/O. The
//!   crate never opens a socket; it only wraps.
//! - **Stages**: Tower layers for cross-cutting concerns: token-bucket
//!   rate limiting, retries with exponential backoff, structured logging
//!   with secret redaction, user-agent tagging, per-call deadlines. Every
//!   stage speaks the same request→response contract, so they stack in any
//!   order.
//! - **Pipeline**: folds stages around a sender at construction time and
//!   exposes a single `send` entry point indistinguishable from the bare
//!   sender.
//! - **Pager**: fetch-agnostic forward-only iteration over paged list
//!   APIs, buffering at most one page.
//!
//! ## Getting started
//!
//! ```rust
//! use tower_intercept::{Pipeline, Request, Response, RetryConfig, RateLimitConfig};
//! use http::{StatusCode, Uri};
//! use tower::service_fn;
//!
//! # async fn example() -> Result<(), tower_intercept::InterceptError> {
//! // Any Service<Request, Response = Response> works as the sender; real
//! // clients adapt their HTTP library here.
//! let sender = service_fn(|_req: Request| async {
//!     Ok::<_, tower::BoxError>(Response::new(StatusCode::OK))
//! });
//!
//! let pipeline = Pipeline::builder(sender)
//!     .user_agent("acme-sdk/1.2")
//!     .logging()
//!     .retry(RetryConfig::default())
//!     .rate_limit(RateLimitConfig::default())
//!     .build()?;
//!
//! let resp = pipeline
//!     .send(Request::get(Uri::from_static("https://api.example.com/v1/items")))
//!     .await?;
//! assert_eq!(resp.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```
//!
//! Stages apply in the order supplied, each becoming the new outermost
//! layer, so the example above throttles before it retries and retries
//! before it logs each attempt.

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod pager;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod timeout;
pub mod user_agent;

pub use config::{PipelineConfig, RateLimitConfig, RetryConfig};
pub use error::{InterceptError, Result};
pub use logging::{LoggingLayer, REDACTION_MARKER};
pub use message::{Body, Request, Response, Timing};
pub use pager::{Page, Pager, TotalCount, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use pipeline::{BoxSender, Pipeline, PipelineBuilder};
pub use rate_limit::RateLimitLayer;
pub use retry::RetryLayer;
pub use timeout::TimeoutLayer;
pub use user_agent::{UserAgentLayer, DEFAULT_USER_AGENT};

// Re-export the Tower vocabulary callers need to implement a sender.
pub use tower::{BoxError, Layer, Service, ServiceExt};
