//! Stacks every stage around a scripted sender: the first two attempts come
//! back 503, the third succeeds, and the log shows redacted headers and the
//! backoff in between.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderValue, AUTHORIZATION};
use http::{StatusCode, Uri};
use tower::{service_fn, BoxError};

use tower_intercept::{Pipeline, RateLimitConfig, Request, Response, RetryConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let sender = service_fn(move |_req: Request| {
        let calls = counter.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let status = if n < 2 {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            Ok::<_, BoxError>(Response::new(status).with_body("{\"ok\":true}"))
        }
    });

    let pipeline = Pipeline::builder(sender)
        .user_agent("demo-sdk/0.1")
        .logging()
        .retry(RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
        })
        .rate_limit(RateLimitConfig {
            requests_per_second: 5.0,
            burst: 2,
        })
        .build()?;

    let mut req = Request::get(Uri::from_static("https://api.example.com/v1/items"));
    req.headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_static("Bearer demo-secret"));

    let resp = pipeline.send(req).await?;
    println!(
        "status={} attempts={} elapsed={:?}",
        resp.status(),
        calls.load(Ordering::SeqCst),
        resp.timing().map(|t| t.elapsed),
    );

    Ok(())
}
