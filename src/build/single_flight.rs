//! Deduplication of concurrent identical builds.
//!
//! # Responsibilities
//! - Run at most one build per key at a time
//! - Hand every concurrent caller the same result (bytes or error)
//!
//! # Design Decisions
//! - The build runs in a spawned task: callers that go away never cancel it
//! - The task removes its own entry when done, so later callers start fresh
//! - A panicking build is reported to all waiters as [`BuildError::Panicked`]

use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::build::error::BuildError;

/// Result shared between all waiters of one flight.
pub type SharedResult<T> = Result<T, Arc<BuildError>>;

struct Flight<T: Clone> {
    id: u64,
    result: Shared<BoxFuture<'static, SharedResult<T>>>,
}

/// Groups concurrent calls for the same key onto one in-flight build.
pub struct SingleFlight<K, T: Clone> {
    flights: Arc<DashMap<K, Flight<T>>>,
    next_id: AtomicU64,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the flight for `key`, starting it with `build` if none is running.
    ///
    /// `build` is only invoked by the caller that starts the flight.
    pub async fn run<F>(&self, key: K, build: F) -> SharedResult<T>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, BuildError>>,
    {
        let (result, leader) = match self.flights.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().result.clone(), None),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let result = rx
                    .map(|received| received.unwrap_or_else(|_| Err(Arc::new(BuildError::Panicked))))
                    .boxed()
                    .shared();
                entry.insert(Flight {
                    id,
                    result: result.clone(),
                });
                (result, Some((id, tx)))
            }
        };

        if let Some((id, tx)) = leader {
            let flights = Arc::clone(&self.flights);
            let future = build();
            tokio::spawn(async move {
                let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(outcome) => outcome.map_err(Arc::new),
                    Err(_) => Err(Arc::new(BuildError::Panicked)),
                };
                flights.remove_if(&key, |_, flight| flight.id == id);
                let _ = tx.send(outcome);
            });
        }

        result.await
    }

    /// Number of builds currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::error::CompileError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_build() {
        let group = Arc::new(SingleFlight::<&'static str, u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let group = group.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                group
                    .run("app.js", move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(42)
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let group = Arc::new(SingleFlight::<u8, u32>::new());
        let slow_failure = || {
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(BuildError::from(CompileError::Timeout(Duration::from_secs(1))))
            }
            .boxed()
        };

        let (a, b) = tokio::join!(group.run(1, slow_failure), group.run(1, slow_failure));
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_sequential_calls_build_again() {
        let group = SingleFlight::<u8, usize>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for expected in 1..=2 {
            let calls = calls.clone();
            let value = group
                .run(7, move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok(n) }.boxed()
                })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn test_panic_reported_and_cleared() {
        let group = SingleFlight::<u8, u32>::new();
        let result = group
            .run(1, || {
                async {
                    let output: Option<u32> = None;
                    Ok(output.expect("bundler exploded"))
                }
                .boxed()
            })
            .await;
        assert!(matches!(result.unwrap_err().as_ref(), BuildError::Panicked));

        let result = group.run(1, || async { Ok(5) }.boxed()).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel() {
        let group = Arc::new(SingleFlight::<u8, u32>::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let f = finished.clone();
        let caller = {
            let group = group.clone();
            tokio::spawn(async move {
                group
                    .run(1, move || {
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            f.fetch_add(1, Ordering::SeqCst);
                            Ok(1)
                        }
                        .boxed()
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(group.in_flight(), 0);
    }
}
