//! Configuration for the pipeline stages.
//!
//! Mirrors the builder options one-for-one so a whole pipeline can be
//! described in data (and deserialized from a config file) and then applied
//! with [`crate::Pipeline::from_config`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry behavior for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the second attempt; doubles per retry.
    pub initial_delay: Duration,

    /// Cap applied to the doubled delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Token-bucket throttle for outgoing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained request rate; tokens refill continuously at this rate.
    pub requests_per_second: f64,

    /// Bucket capacity: how many requests may go out back-to-back.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst: 5,
        }
    }
}

/// Declarative form of a full pipeline.
///
/// Stages left as `None`/`false` are simply not installed. Applied in the
/// canonical order: user agent innermost, then logging, retry, rate
/// limiting, and the per-call deadline outermost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub user_agent: Option<String>,
    pub logging: bool,
    pub retry: Option<RetryConfig>,
    pub timeout: Option<Duration>,
    pub rate_limit: Option<RateLimitConfig>,
}
