//! Offset-based search results
//!
//! A `Pagination` describes one page of an exact-match search and yields
//! its rows lazily. Rows are pulled from the underlying table in batches,
//! only as the caller iterates.

use std::collections::VecDeque;

/// Largest batch fetched from a table in one go
pub const SEARCH_BATCH_SIZE: usize = 100;

type FetchFn<T> = Box<dyn FnMut(usize, usize) -> Vec<T> + Send>;

/// One page of search results
///
/// Iterating consumes the page. To traverse it again, run the search again
/// with the same offset.
pub struct Pagination<T> {
    /// Offset the page starts at
    pub current_offset: usize,

    /// Number of rows matching the search key
    pub total_count: usize,

    /// Number of rows in the searched table
    pub max_count: usize,

    /// Offset of the following page, unset on the last page
    pub next_offset: Option<usize>,

    rows: PageRows<T>,
}

struct PageRows<T> {
    fetch: FetchFn<T>,
    buffer: VecDeque<T>,
    next_offset: usize,
    remaining: usize,
    batch_size: usize,
    exhausted: bool,
}

impl<T> Pagination<T> {
    /// Build a page over `fetch(offset, limit)`
    ///
    /// `limit` is clamped to `max_count`, so no batch larger than the table is
    /// ever requested.
    pub fn new<F>(offset: usize, limit: usize, total_count: usize, max_count: usize, fetch: F) -> Self
    where
        F: FnMut(usize, usize) -> Vec<T> + Send + 'static,
    {
        let next_offset = match offset.checked_add(limit) {
            Some(end) if end < total_count => Some(end),
            _ => None,
        };
        let page_size = limit.min(max_count);

        Pagination {
            current_offset: offset,
            total_count,
            max_count,
            next_offset,
            rows: PageRows {
                fetch: Box::new(fetch),
                buffer: VecDeque::new(),
                next_offset: offset,
                remaining: page_size,
                batch_size: page_size.min(SEARCH_BATCH_SIZE),
                exhausted: page_size == 0,
            },
        }
    }

    /// A page with nothing in it
    pub fn empty(offset: usize) -> Self
    where
        T: 'static,
    {
        Self::new(offset, 0, 0, 0, |_, _| Vec::new())
    }
}

impl<T> PageRows<T> {
    fn fill(&mut self) {
        let limit = self.batch_size.min(self.remaining);
        let mut batch = (self.fetch)(self.next_offset, limit);
        batch.truncate(limit);

        if batch.len() < limit {
            self.exhausted = true;
        }
        self.next_offset += batch.len();
        self.buffer.extend(batch);
    }
}

impl<T> Iterator for Pagination<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let rows = &mut self.rows;

        if rows.buffer.is_empty() && !rows.exhausted && rows.remaining > 0 {
            rows.fill();
        }

        let row = rows.buffer.pop_front()?;
        rows.remaining -= 1;
        if rows.remaining == 0 {
            rows.exhausted = true;
        }
        Some(row)
    }
}

impl<T> std::fmt::Debug for Pagination<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pagination")
            .field("current_offset", &self.current_offset)
            .field("total_count", &self.total_count)
            .field("max_count", &self.max_count)
            .field("next_offset", &self.next_offset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn page_over(rows: Vec<u32>, offset: usize, limit: usize) -> Pagination<u32> {
        let total = rows.len();
        Pagination::new(offset, limit, total, total, move |offset, limit| {
            rows.iter().copied().skip(offset).take(limit).collect()
        })
    }

    #[rstest]
    #[case::first_page(0, 10, 25, Some(10))]
    #[case::middle_page(10, 10, 25, Some(20))]
    #[case::last_page(20, 10, 25, None)]
    #[case::exact_end(15, 10, 25, None)]
    #[case::empty_result(0, 10, 0, None)]
    fn test_next_offset(
        #[case] offset: usize,
        #[case] limit: usize,
        #[case] total: usize,
        #[case] expected: Option<usize>,
    ) {
        let page: Pagination<u32> = Pagination::new(offset, limit, total, total, |_, _| Vec::new());
        assert_eq!(page.next_offset, expected);
    }

    #[test]
    fn test_page_yields_rows_from_offset() {
        let rows: Vec<u32> = (0..25).collect();
        let page = page_over(rows, 10, 10);
        assert_eq!(page.collect::<Vec<_>>(), (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_page_spanning_everything() {
        let rows: Vec<u32> = (0..7).collect();
        let page = page_over(rows, 0, 100);
        let total = page.total_count;
        assert_eq!(page.count(), total);
    }

    #[test]
    fn test_zero_limit_yields_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let page: Pagination<u32> = Pagination::new(0, 0, 5, 5, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1]
        });

        assert_eq!(page.count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rows_are_fetched_lazily_in_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rows: Vec<u32> = (0..250).collect();
        let mut page = Pagination::new(0, 250, 250, 250, move |offset, limit| {
            counter.fetch_add(1, Ordering::SeqCst);
            rows.iter().copied().skip(offset).take(limit).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(page.next(), Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(page.by_ref().count(), 249);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_short_batch_ends_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        // Table shrank between counting and fetching
        let page = Pagination::new(0, 10, 10, 10, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1u32, 2, 3]
        });

        assert_eq!(page.count(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_limit_clamped_to_table_size() {
        let seen = Arc::new(AtomicUsize::new(0));
        let requested = Arc::clone(&seen);
        let page: Pagination<u32> = Pagination::new(0, 1000, 3, 3, move |_, limit| {
            requested.store(limit, Ordering::SeqCst);
            vec![1, 2, 3]
        });

        assert_eq!(page.count(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
