//! Single-flight answer cache.
//!
//! Concurrent requests for the same `(question, k)` share one computation:
//! the first caller runs the pipeline, the rest wait on the same cell and
//! receive a clone of its answer. A failed computation is handed to the next
//! waiter on the same cell; with no waiter left the key is dropped.

use super::types::AnswerResult;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    question: String,
    k: usize,
}

impl CacheKey {
    fn new(question: &str, k: usize) -> Self {
        Self {
            question: question.trim().to_string(),
            k,
        }
    }
}

type Cell = Arc<OnceCell<AnswerResult>>;

#[derive(Default)]
struct Entries {
    cells: HashMap<CacheKey, Cell>,
    order: VecDeque<CacheKey>,
}

/// Bounded map from `(question, k)` to a computed answer.
///
/// The map lock is only held to find or insert a cell, never while an answer
/// is being computed.
pub struct AnswerCache {
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl AnswerCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns the cached answer for `(question, k)`, computing it with `init`
    /// if no caller has done so yet.
    ///
    /// At most one `init` runs per key at a time. If it fails the error is
    /// returned to that caller; a waiting caller takes over the same cell,
    /// and the key is cleared only once nobody else holds it.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        question: &str,
        k: usize,
        init: F,
    ) -> Result<AnswerResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnswerResult, E>>,
    {
        let key = CacheKey::new(question, k);
        let cell = self.cell_for(&key);

        if cell.initialized() {
            debug!(k, "Answer cache hit");
        }

        match cell.get_or_try_init(init).await {
            Ok(answer) => Ok(answer.clone()),
            Err(e) => {
                self.forget(&key, &cell);
                Err(e)
            }
        }
    }

    /// Number of keys currently tracked, including in-flight ones.
    pub fn len(&self) -> usize {
        self.lock().cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.cells.clear();
        entries.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cell_for(&self, key: &CacheKey) -> Cell {
        let mut entries = self.lock();
        if let Some(cell) = entries.cells.get(key) {
            return cell.clone();
        }

        if entries.cells.len() >= self.max_entries {
            evict_oldest_ready(&mut entries);
        }

        let cell = Arc::new(OnceCell::new());
        entries.cells.insert(key.clone(), cell.clone());
        entries.order.push_back(key.clone());
        cell
    }

    fn forget(&self, key: &CacheKey, cell: &Cell) {
        let mut entries = self.lock();
        // Handles are only cloned under this lock, so a count of two (the map
        // and `cell`) means no other caller is waiting on or retrying it.
        let stale = entries.cells.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, cell) && !current.initialized() && Arc::strong_count(cell) == 2
        });
        if stale {
            entries.cells.remove(key);
            entries.order.retain(|k| k != key);
        }
    }
}

/// In-flight cells are never evicted; if every entry is in flight the map
/// temporarily grows past its bound.
fn evict_oldest_ready(entries: &mut Entries) {
    let position = entries.order.iter().position(|key| {
        entries
            .cells
            .get(key)
            .is_some_and(|cell| cell.initialized())
    });

    if let Some(position) = position {
        if let Some(key) = entries.order.remove(position) {
            entries.cells.remove(&key);
            debug!(k = key.k, "Evicted cached answer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn answer(question: &str) -> AnswerResult {
        AnswerResult {
            question: question.to_string(),
            answer: format!("answer to {}", question),
            sources: vec![],
        }
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = AnswerCache::new(8);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let result: Result<_, ()> = cache
                .get_or_try_insert_with("why?", 3, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(answer("why?"))
                })
                .await;
            assert_eq!(result.unwrap(), answer("why?"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_key_includes_k_and_trims_question() {
        let cache = AnswerCache::new(8);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(answer("q"))
        };

        cache.get_or_try_insert_with("q", 3, compute).await.unwrap();
        cache.get_or_try_insert_with("  q \n", 3, compute).await.unwrap();
        cache.get_or_try_insert_with("q", 4, compute).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = AnswerCache::new(8);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ()>(answer("same"))
        };

        let (a, b) = tokio::join!(
            cache.get_or_try_insert_with("same", 2, compute),
            cache.get_or_try_insert_with("same", 2, compute),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = AnswerCache::new(8);

        let failed: Result<AnswerResult, &str> = cache
            .get_or_try_insert_with("q", 1, move || async move { Err("boom") })
            .await;
        assert_eq!(failed.unwrap_err(), "boom");
        assert!(cache.is_empty());

        let ok: Result<AnswerResult, &str> = cache
            .get_or_try_insert_with("q", 1, move || async move { Ok(answer("q")) })
            .await;
        assert_eq!(ok.unwrap(), answer("q"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_with_waiter_keeps_single_flight() {
        let cache = AnswerCache::new(8);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        // The first computation fails; the waiter's retry takes a while.
        let compute = move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err("boom")
            } else {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(answer("q"))
            }
        };
        let late = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cache.get_or_try_insert_with("q", 1, compute).await
        };

        let (first, waiter, late) = tokio::join!(
            cache.get_or_try_insert_with("q", 1, compute),
            cache.get_or_try_insert_with("q", 1, compute),
            late,
        );
        assert_eq!(first.unwrap_err(), "boom");
        assert_eq!(waiter.unwrap(), answer("q"));
        assert_eq!(late.unwrap(), answer("q"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_by_max_entries() {
        let cache = AnswerCache::new(2);
        for question in ["a", "b", "c"] {
            cache
                .get_or_try_insert_with(question, 1, move || async move {
                    Ok::<_, ()>(answer(question))
                })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);

        // "a" was oldest and must be recomputed.
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        cache
            .get_or_try_insert_with("a", 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(answer("a"))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = AnswerCache::new(4);
        cache
            .get_or_try_insert_with("q", 1, move || async move { Ok::<_, ()>(answer("q")) })
            .await
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
