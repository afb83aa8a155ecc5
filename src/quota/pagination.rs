// Cursor-driven collection under a single credential.
//
// A paginated unit of work runs all of its pages with one credential. If any
// page fails, the whole attempt fails with that page's outcome and the
// fetcher rotates to the next credential, which starts over from page one.

use std::future::Future;

use tracing::debug;

use super::attempt::AttemptResult;

/// One page of results plus the continuation token, if there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Hard stop for runaway cursors (an API that keeps handing back tokens).
pub const MAX_PAGES: usize = 500;

/// Follow continuation tokens until they run out, `max_items` is reached,
/// or a page fails.
///
/// An empty page ends the loop even if it carries a cursor.
pub async fn collect_pages<T, F, Fut>(
    max_items: Option<usize>,
    mut fetch_page: F,
) -> AttemptResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AttemptResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = match fetch_page(cursor.take()).await {
            AttemptResult::Success(page) => page,
            AttemptResult::QuotaExceeded => return AttemptResult::QuotaExceeded,
            AttemptResult::RetryableError(detail) => {
                return AttemptResult::RetryableError(format!("page {page_number}: {detail}"))
            }
            AttemptResult::FatalError(err) => return AttemptResult::FatalError(err),
        };

        let page_len = page.items.len();
        items.extend(page.items);

        debug!(
            page = page_number,
            page_items = page_len,
            total_collected = items.len(),
            "Fetched page"
        );

        if let Some(max) = max_items {
            if items.len() >= max {
                items.truncate(max);
                break;
            }
        }

        match page.next_cursor {
            Some(next) if page_len > 0 && !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    AttemptResult::Success(items)
}
