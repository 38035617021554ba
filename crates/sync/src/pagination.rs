//! Lazy walks over paged remote collections.
//!
//! Both walkers yield whole pages. The next request is only issued when the
//! stream is polled again, so the cursor never moves past a page the caller
//! has not finished with. A failed fetch is yielded as the stream's last item;
//! no page is ever skipped.
//!
//! - [`offset_pages`] advances a `startIndex` by the page size. Only safe for
//!   collections that do not change during the walk (categories, entity
//!   lists, settings, redirects).
//! - [`sequence_pages`] resumes after the largest ordering key seen so far.
//!   Records inserted or removed mid-walk cannot shift it, which is why the
//!   product walk uses it.

use std::future::Future;

use async_stream::stream;
use futures::{Stream, TryStreamExt};
use tenant_clone_core::Page;
use tracing::warn;

/// Walk a collection by `startIndex`.
///
/// Ends after an empty page, when `totalCount` is 0, or once the next start
/// index reaches `totalCount`.
pub fn offset_pages<T, E, F, Fut>(page_size: u32, fetch: F) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(u64, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream! {
        let mut fetch = fetch;
        let mut start_index: u64 = 0;
        loop {
            let page = match fetch(start_index, page_size).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            let received = page.items.len();
            let total = page.total_count;
            if received > 0 {
                yield Ok(page.items);
            }

            start_index += u64::from(page_size);
            if received == 0 || total == 0 || start_index >= total {
                break;
            }
        }
    }
}

/// Walk a collection in ascending key order, resuming after the last key seen.
///
/// `fetch(after, page_size)` must return the records whose key is greater than
/// `after` (all records when `None`), ascending, with `totalCount` counting
/// every record that matches the filter. The walk ends after an empty page or
/// once a page holds all remaining matches.
pub fn sequence_pages<T, E, K, F, Fut>(
    page_size: u32,
    key: K,
    fetch: F,
) -> impl Stream<Item = Result<Vec<T>, E>>
where
    K: Fn(&T) -> i64,
    F: FnMut(Option<i64>, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream! {
        let mut fetch = fetch;
        let mut after: Option<i64> = None;
        loop {
            let page = match fetch(after, page_size).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            let received = page.items.len();
            if received == 0 {
                break;
            }
            let last = page.items.iter().map(&key).max();
            let more = page.total_count > received as u64;

            yield Ok(page.items);

            if !more {
                break;
            }
            if last <= after {
                warn!(?after, ?last, "Cursor did not advance, stopping walk");
                break;
            }
            after = last;
        }
    }
}

/// Drain a page stream into one `Vec`, stopping at the first error.
///
/// # Errors
///
/// Returns the first fetch error.
pub async fn collect_all<T, E, S>(pages: S) -> Result<Vec<T>, E>
where
    S: Stream<Item = Result<Vec<T>, E>>,
{
    pages.try_concat().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::pin::pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;

    use super::*;
    use crate::ApiError;

    #[derive(Debug, Clone)]
    struct Record {
        code: String,
        sequence: i64,
    }

    /// A collection that gains three records right after its first page is
    /// served. The newcomers sort before everything by code and after
    /// everything by sequence.
    struct LiveCollection {
        records: Mutex<Vec<Record>>,
        fetches: AtomicUsize,
    }

    impl LiveCollection {
        fn new(count: i64) -> Self {
            let records = (0..count)
                .map(|i| Record {
                    code: format!("P{i:02}"),
                    sequence: i + 1,
                })
                .collect();
            Self {
                records: Mutex::new(records),
                fetches: AtomicUsize::new(0),
            }
        }

        fn after_fetch(&self) {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                let mut records = self.records.lock().unwrap();
                for i in 0..3 {
                    records.push(Record {
                        code: format!("A{i}"),
                        sequence: 101 + i,
                    });
                }
            }
        }

        fn by_offset(&self, start: u64, size: u32) -> Page<Record> {
            let page = {
                let mut records = self.records.lock().unwrap().clone();
                records.sort_by(|a, b| a.code.cmp(&b.code));
                let total = records.len() as u64;
                let items = records
                    .into_iter()
                    .skip(usize::try_from(start).unwrap())
                    .take(size as usize)
                    .collect();
                Page::new(items, total)
            };
            self.after_fetch();
            page
        }

        fn by_sequence(&self, after: Option<i64>, size: u32) -> Page<Record> {
            let page = {
                let mut records: Vec<Record> = self
                    .records
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|r| after.is_none_or(|after| r.sequence > after))
                    .cloned()
                    .collect();
                records.sort_by_key(|r| r.sequence);
                let total = records.len() as u64;
                Page::new(records.into_iter().take(size as usize).collect(), total)
            };
            self.after_fetch();
            page
        }
    }

    fn seen_counts(pages: Vec<Vec<Record>>) -> HashMap<String, usize> {
        let mut seen = HashMap::new();
        for record in pages.into_iter().flatten() {
            *seen.entry(record.code).or_insert(0) += 1;
        }
        seen
    }

    fn original_codes() -> Vec<String> {
        (0..10).map(|i| format!("P{i:02}")).collect()
    }

    #[tokio::test]
    async fn test_sequence_walk_sees_each_existing_record_once_under_mutation() {
        let live = LiveCollection::new(10);
        let pages: Vec<Vec<Record>> = sequence_pages(
            4,
            |r: &Record| r.sequence,
            |after, size| {
                let page = live.by_sequence(after, size);
                async move { Ok::<_, ApiError>(page) }
            },
        )
        .try_collect()
        .await
        .unwrap();

        let seen = seen_counts(pages);
        for code in original_codes() {
            assert_eq!(seen.get(&code), Some(&1), "{code}");
        }
    }

    #[tokio::test]
    async fn test_offset_walk_repeats_records_under_mutation() {
        let live = LiveCollection::new(10);
        let pages: Vec<Vec<Record>> = offset_pages(4, |start, size| {
            let page = live.by_offset(start, size);
            async move { Ok::<_, ApiError>(page) }
        })
        .try_collect()
        .await
        .unwrap();

        let seen = seen_counts(pages);
        let exactly_once = original_codes()
            .iter()
            .all(|code| seen.get(code) == Some(&1));
        assert!(!exactly_once);
    }

    #[tokio::test]
    async fn test_offset_walk_stops_at_total() {
        let calls = AtomicUsize::new(0);
        let all = collect_all(offset_pages(2, |start, size| {
            calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<u64> = (start..5).take(size as usize).collect();
            async move { Ok::<_, ApiError>(Page::new(items, 5)) }
        }))
        .await
        .unwrap();

        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_total_ends_walk() {
        let calls = AtomicUsize::new(0);
        let all: Vec<u64> = collect_all(offset_pages(2, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ApiError>(Page::new(Vec::new(), 0)) }
        }))
        .await
        .unwrap();

        assert!(all.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_last_item() {
        let mut pages = pin!(sequence_pages(
            2,
            |n: &i64| *n,
            |after, _| async move {
                match after {
                    None => Ok(Page::new(vec![1, 2], 4)),
                    Some(_) => Err(ApiError::Status {
                        status: 500,
                        message: "boom".to_string(),
                    }),
                }
            },
        ));

        assert_eq!(pages.next().await.unwrap().unwrap(), vec![1, 2]);
        assert!(matches!(
            pages.next().await,
            Some(Err(ApiError::Status { status: 500, .. }))
        ));
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_page_is_not_requested_until_polled() {
        let calls = AtomicUsize::new(0);
        let mut pages = pin!(sequence_pages(
            1,
            |n: &i64| *n,
            |after, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                let next = after.unwrap_or(0) + 1;
                async move { Ok::<_, ApiError>(Page::new(vec![next], 10)) }
            },
        ));

        pages.next().await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        pages.next().await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stuck_cursor_stops_walk() {
        let pages: Vec<Vec<i64>> = sequence_pages(2, |n: &i64| *n, |_, _| async {
            Ok::<_, ApiError>(Page::new(vec![1, 2], 10))
        })
        .try_collect()
        .await
        .unwrap();

        assert_eq!(pages.len(), 2);
    }
}
