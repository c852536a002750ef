//! Walks a 25-item collection through the pager, one page of 10 at a time,
//! then re-walks it as a stream.

use futures::TryStreamExt;

use tower_intercept::{Page, Pager, TotalCount};

#[tokio::main]
async fn main() -> Result<(), tower::BoxError> {
    let data: Vec<u32> = (1..=25).collect();

    let source = data.clone();
    let mut pager = Pager::new(10, move |offset, limit| {
        let page: Vec<u32> = source.iter().skip(offset).take(limit).copied().collect();
        // The endpoint reports an exact total, so the pager stops without a
        // trailing empty-page fetch.
        let total = TotalCount::Known(25);
        async move { Ok(Page::new(page, total)) }
    });

    let mut count = 0usize;
    while pager.advance().await {
        count += 1;
        if count % 10 == 1 {
            println!("page boundary at item {:?}", pager.current());
        }
    }
    println!("iterated {count} items, error: {:?}", pager.error());

    let source = data;
    let pager = Pager::new(10, move |offset, limit| {
        let page: Vec<u32> = source.iter().skip(offset).take(limit).copied().collect();
        async move { Ok(Page::new(page, TotalCount::Unknown)) }
    });
    let sum: u32 = pager
        .into_stream()
        .try_fold(0, |acc, item| async move { Ok(acc + item) })
        .await?;
    println!("sum over stream: {sum}");

    Ok(())
}
