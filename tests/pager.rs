//! Pager driven by a pipeline underneath: the fetch closure sends a real
//! request through the stack and decodes the page out of the response body.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{StatusCode, Uri};
use tower::{service_fn, BoxError, Service};

use tower_intercept::{Page, Pager, Pipeline, Request, Response, TotalCount};

/// Sender serving `data` as a JSON array, sliced by `offset`/`limit` query
/// parameters the way an offset-paged list endpoint would.
fn list_endpoint(
    data: Vec<u64>,
    calls: Arc<AtomicUsize>,
) -> impl Service<Request, Response = Response, Error = BoxError, Future: Send> + Clone + Send + 'static
{
    service_fn(move |req: Request| {
        let data = data.clone();
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut offset = 0usize;
            let mut limit = data.len();
            for pair in req.uri().query().unwrap_or("").split('&') {
                match pair.split_once('=') {
                    Some(("offset", v)) => offset = v.parse().unwrap_or(0),
                    Some(("limit", v)) => limit = v.parse().unwrap_or(limit),
                    _ => {}
                }
            }
            let page: Vec<u64> = data.into_iter().skip(offset).take(limit).collect();
            let body = serde_json::to_vec(&page)?;
            Ok::<_, BoxError>(Response::new(StatusCode::OK).with_body(body))
        }
    })
}

fn paged_fetch(
    pipeline: Pipeline,
) -> impl FnMut(usize, usize) -> futures::future::BoxFuture<'static, Result<Page<u64>, BoxError>>
       + Send
       + 'static {
    move |offset, limit| {
        let pipeline = pipeline.clone();
        Box::pin(async move {
            let uri: Uri = format!("https://api.example.com/v1/items?offset={offset}&limit={limit}")
                .parse()?;
            let resp = pipeline.send(Request::get(uri)).await?;
            if !resp.status().is_success() {
                return Err(format!("unexpected status {}", resp.status()).into());
            }
            let bytes = resp.into_body().into_bytes().await?;
            let items: Vec<u64> = serde_json::from_slice(&bytes)?;
            Ok(Page::new(items, TotalCount::Unknown))
        })
    }
}

#[tokio::test]
async fn pages_a_listing_through_the_pipeline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::builder(list_endpoint((0..7).collect(), calls.clone()))
        .user_agent("acme-sdk/1.2")
        .logging()
        .build()
        .unwrap();

    let mut pager = Pager::new(3, paged_fetch(pipeline));
    let mut seen = Vec::new();
    while pager.advance().await {
        seen.push(*pager.current().unwrap());
    }

    assert_eq!(seen, (0..7).collect::<Vec<_>>());
    assert!(pager.error().is_none());
    // 3 + 3 + 1 items, then the empty page.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn server_failure_makes_the_pager_stick() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let flaky = service_fn(move |req: Request| {
        let calls = counter.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let first_page = req.uri().query().unwrap_or("").contains("offset=0");
            if first_page {
                let body = serde_json::to_vec(&vec![0u64, 1, 2])?;
                Ok::<_, BoxError>(Response::new(StatusCode::OK).with_body(body))
            } else {
                Ok(Response::new(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    });
    let pipeline = Pipeline::builder(flaky).build().unwrap();

    let mut pager = Pager::new(3, paged_fetch(pipeline));
    let mut seen = Vec::new();
    while pager.advance().await {
        seen.push(*pager.current().unwrap());
    }

    assert_eq!(seen, vec![0, 1, 2]);
    let error = pager.error().expect("sticky terminal error");
    assert!(error.to_string().contains("500"));

    // No further fetches after failure.
    assert!(!pager.advance().await);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
