//! Lazy pager over offset/limit list endpoints.
//!
//! What this module provides
//! - [`Pager`]: wraps a caller-supplied page-fetch closure and walks a paged
//!   collection as one forward-only sequence, buffering at most one page
//! - [`TotalCount`]: the three total-count conventions paged endpoints use,
//!   as an explicit enum instead of sentinel integers
//!
//! Implementation strategy
//! - The pager is fetch-agnostic: the closure typically performs a
//!   [`Pipeline::send`](crate::Pipeline::send) plus payload decoding, but
//!   the pager only does offset/limit bookkeeping
//! - Failure is terminal and sticky: after a fetch error, [`Pager::advance`]
//!   keeps returning `false` and [`Pager::error`] reports the cause; build
//!   a new pager to retry the listing
//! - Single consumer: `advance` takes `&mut self`, so concurrent
//!   advancement of one pager does not compile; there is no internal
//!   synchronization
//!
//! Testing strategy
//! - Scripted fetch closures over in-memory data cover each total-count
//!   convention, the failure path, and the bookkeeping invariants

use std::future::Future;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use tower::BoxError;

/// Page size used when the caller passes 0.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size handed to a fetch closure; bigger requests are capped.
pub const MAX_PAGE_SIZE: usize = 100;

/// How a fetch result describes the size of the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCount {
    /// The endpoint reported an exact total.
    Known(usize),
    /// No total available; keep fetching until an empty page comes back.
    Unknown,
    /// This page is the last one; the effective total is the offset at
    /// fetch time plus this page's length.
    LastPage,
}

/// One page of fetched items plus the endpoint's total-count claim.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: TotalCount,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: TotalCount) -> Self {
        Self { items, total }
    }
}

type FetchFn<T> =
    Box<dyn FnMut(usize, usize) -> BoxFuture<'static, std::result::Result<Page<T>, BoxError>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    HasPage,
    Exhausted,
    Failed,
}

/// Forward-only iterator over a paged collection.
///
/// ```
/// use tower_intercept::{Page, Pager, TotalCount};
///
/// # async fn demo() {
/// let data: Vec<u32> = (0..7).collect();
/// let mut pager = Pager::new(3, move |offset, limit| {
///     let page: Vec<u32> = data.iter().skip(offset).take(limit).copied().collect();
///     async move { Ok(Page::new(page, TotalCount::Unknown)) }
/// });
///
/// let mut seen = Vec::new();
/// while pager.advance().await {
///     seen.extend(pager.current().copied());
/// }
/// assert_eq!(seen, (0..7).collect::<Vec<_>>());
/// assert!(pager.error().is_none());
/// # }
/// ```
pub struct Pager<T> {
    fetch: FetchFn<T>,
    page_size: usize,
    offset: usize,
    items: Vec<T>,
    cursor: usize,
    total: Option<usize>,
    state: State,
    error: Option<BoxError>,
}

impl<T> Pager<T> {
    /// Wrap a fetch closure. `page_size` is normalized: 0 becomes
    /// [`DEFAULT_PAGE_SIZE`], anything above [`MAX_PAGE_SIZE`] is capped.
    pub fn new<F, Fut>(page_size: usize, mut fetch: F) -> Self
    where
        F: FnMut(usize, usize) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Page<T>, BoxError>> + Send + 'static,
    {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE)
        };
        Self {
            fetch: Box::new(move |offset, limit| fetch(offset, limit).boxed()),
            page_size,
            offset: 0,
            items: Vec::new(),
            cursor: 0,
            total: None,
            state: State::Fresh,
            error: None,
        }
    }

    /// Move to the next item, fetching the next page when the buffered one
    /// is spent. Returns `false` once the sequence is exhausted or failed.
    pub async fn advance(&mut self) -> bool {
        match self.state {
            State::Exhausted | State::Failed => false,
            State::HasPage if self.cursor + 1 < self.items.len() => {
                self.cursor += 1;
                true
            }
            State::Fresh | State::HasPage => self.fetch_next_page().await,
        }
    }

    async fn fetch_next_page(&mut self) -> bool {
        // A known (or derived) total lets us skip the trailing empty-page
        // round trip entirely.
        if let Some(total) = self.total {
            if self.offset >= total {
                self.state = State::Exhausted;
                return false;
            }
        }
        match (self.fetch)(self.offset, self.page_size).await {
            Err(error) => {
                self.state = State::Failed;
                self.error = Some(error);
                false
            }
            Ok(page) if page.items.is_empty() => {
                self.state = State::Exhausted;
                false
            }
            Ok(page) => {
                match page.total {
                    TotalCount::Known(total) => self.total = Some(total),
                    TotalCount::LastPage => self.total = Some(self.offset + page.items.len()),
                    TotalCount::Unknown => {}
                }
                self.offset += page.items.len();
                self.items = page.items;
                self.cursor = 0;
                self.state = State::HasPage;
                true
            }
        }
    }

    /// The item `advance` last moved to. `None` until the first successful
    /// advance; afterwards it keeps answering with the last item even once
    /// the pager is exhausted or failed.
    pub fn current(&self) -> Option<&T> {
        self.items.get(self.cursor)
    }

    /// The terminal fetch error, if the pager failed.
    pub fn error(&self) -> Option<&BoxError> {
        self.error.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offset the next fetch would use.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take_error(&mut self) -> Option<BoxError> {
        self.error.take()
    }

    /// Adapt the pager into a `Stream` of items. The stream ends after the
    /// last item, or yields the terminal error as its final element.
    pub fn into_stream(self) -> impl Stream<Item = std::result::Result<T, BoxError>> + Send
    where
        T: Clone + Send + 'static,
    {
        futures::stream::try_unfold(self, |mut pager| async move {
            if pager.advance().await {
                Ok(pager.current().cloned().map(|item| (item, pager)))
            } else if let Some(error) = pager.take_error() {
                Err(error)
            } else {
                Ok(None)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::TryStreamExt;

    /// Fetch closure serving `items` in slices, with a scripted total-count
    /// convention and a call counter.
    fn slicing_fetch(
        items: Vec<u32>,
        total: TotalCount,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut(usize, usize) -> futures::future::Ready<std::result::Result<Page<u32>, BoxError>>
           + Send
           + 'static {
        move |offset, limit| {
            calls.fetch_add(1, Ordering::SeqCst);
            let page: Vec<u32> = items.iter().skip(offset).take(limit).copied().collect();
            futures::future::ready(Ok(Page::new(page, total)))
        }
    }

    #[tokio::test]
    async fn yields_seven_items_over_pages_of_three() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pager = Pager::new(
            3,
            slicing_fetch((0..7).collect(), TotalCount::Unknown, calls.clone()),
        );

        let mut seen = Vec::new();
        while pager.advance().await {
            seen.push(*pager.current().unwrap());
        }

        assert_eq!(seen, (0..7).collect::<Vec<_>>());
        assert!(pager.error().is_none());
        // 3 + 3 + 1, then the empty page that signals exhaustion.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn known_total_skips_the_empty_page_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pager = Pager::new(
            3,
            slicing_fetch((0..5).collect(), TotalCount::Known(5), calls.clone()),
        );

        let mut seen = Vec::new();
        while pager.advance().await {
            seen.push(*pager.current().unwrap());
        }

        assert_eq!(seen, (0..5).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_page_marker_derives_the_total() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut pager = Pager::new(3, move |offset, _limit| {
            counter.fetch_add(1, Ordering::SeqCst);
            let (page, total) = if offset == 0 {
                (vec![0u32, 1, 2], TotalCount::Unknown)
            } else {
                (vec![3u32, 4], TotalCount::LastPage)
            };
            futures::future::ready(Ok(Page::new(page, total)))
        });

        let mut seen = Vec::new();
        while pager.advance().await {
            seen.push(*pager.current().unwrap());
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_is_sticky_and_keeps_earlier_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut pager = Pager::new(3, move |offset, _limit| {
            counter.fetch_add(1, Ordering::SeqCst);
            let result = if offset == 0 {
                Ok(Page::new(vec![0u32, 1, 2], TotalCount::Unknown))
            } else {
                Err(BoxError::from("boom"))
            };
            futures::future::ready(result)
        });

        let mut seen = Vec::new();
        while pager.advance().await {
            seen.push(*pager.current().unwrap());
        }

        assert_eq!(seen, vec![0, 1, 2]);
        assert!(pager.error().is_some());

        // Still failed; no further fetches happen.
        assert!(!pager.advance().await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pager.current(), Some(&2));
    }

    #[tokio::test]
    async fn current_is_none_before_the_first_advance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pager = Pager::new(
            3,
            slicing_fetch((0..3).collect(), TotalCount::Unknown, calls.clone()),
        );
        assert!(pager.current().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn current_sticks_after_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pager = Pager::new(
            5,
            slicing_fetch((0..2).collect(), TotalCount::Unknown, calls.clone()),
        );

        while pager.advance().await {}

        assert_eq!(pager.current(), Some(&1));
        assert!(!pager.advance().await);
        assert_eq!(pager.current(), Some(&1));
    }

    #[test]
    fn page_size_is_normalized() {
        let make = |size| {
            Pager::new(size, |_offset, _limit| {
                futures::future::ready(Ok(Page::<u32>::new(Vec::new(), TotalCount::Unknown)))
            })
        };
        assert_eq!(make(0).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(make(7).page_size(), 7);
        assert_eq!(make(1000).page_size(), MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn offsets_advance_by_page_length() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pager = Pager::new(
            3,
            slicing_fetch((0..4).collect(), TotalCount::Unknown, calls.clone()),
        );

        assert!(pager.advance().await);
        assert_eq!(pager.offset(), 3);
        for _ in 0..3 {
            pager.advance().await;
        }
        assert_eq!(pager.offset(), 4);
    }

    #[tokio::test]
    async fn stream_adapter_yields_all_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pager = Pager::new(
            3,
            slicing_fetch((0..7).collect(), TotalCount::Unknown, calls.clone()),
        );

        let seen: Vec<u32> = pager.into_stream().try_collect().await.unwrap();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn stream_adapter_surfaces_the_terminal_error() {
        let mut first = true;
        let pager = Pager::new(3, move |_offset, _limit| {
            let result = if first {
                first = false;
                Ok(Page::new(vec![0u32, 1, 2], TotalCount::Unknown))
            } else {
                Err(BoxError::from("boom"))
            };
            futures::future::ready(result)
        });

        let mut stream = Box::pin(pager.into_stream());
        let mut seen = Vec::new();
        let err = loop {
            match stream.try_next().await {
                Ok(Some(item)) => seen.push(item),
                Ok(None) => panic!("expected the stream to end with an error"),
                Err(err) => break err,
            }
        };

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(err.to_string(), "boom");
    }
}
