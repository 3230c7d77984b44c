//! Turning token-paged listings into streams
//!
//! Every listing call returns one page plus an optional continuation token.
//! [`pages`] wraps such a call into a lazy stream that fetches the next page
//! only when polled, so consumers that stop early never issue further requests.

use std::future::Future;

use anyhow::Result;
use async_stream::try_stream;
use futures::TryStreamExt;
use futures::stream::BoxStream;

use crate::service::Page;

/// Stream the pages produced by repeatedly calling `fetch` with the previous
/// page's token, starting with no token, until no token comes back
pub fn pages<'a, T, F, Fut>(mut fetch: F) -> BoxStream<'a, Result<Vec<T>>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
    Box::pin(try_stream! {
        let mut token = None;
        loop {
            let page = fetch(token.take()).await?;
            yield page.items;
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
    })
}

/// Return the first item matching `predicate`, stopping at the page that
/// contains it
pub async fn find_first<T, P>(
    mut pages: BoxStream<'_, Result<Vec<T>>>,
    mut predicate: P,
) -> Result<Option<T>>
where
    P: FnMut(&T) -> bool,
{
    while let Some(page) = pages.try_next().await? {
        if let Some(found) = page.into_iter().find(|item| predicate(item)) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Drain every page into a single list
pub async fn collect_all<T>(pages: BoxStream<'_, Result<Vec<T>>>) -> Result<Vec<T>> {
    pages.try_concat().await
}
