use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::debug;
use parking_lot::Mutex;
use tokio::task::JoinError;

type PendingFetch<E> = Shared<BoxFuture<'static, Result<(), Arc<E>>>>;

/// Tracks cache keys with a fetch in progress so concurrent requesters for
/// the same key share one underlying network call.
///
/// The first caller for a key claims it: its work runs on a spawned task and
/// a shared handle to the outcome is registered under the key. Every caller
/// arriving before the work settles awaits that same handle instead of
/// starting a second fetch. The registration is dropped once the work
/// settles, whether it succeeded, failed or panicked, so a later request for
/// the key can trigger a fresh fetch.
pub struct InFlight<E> {
    pending: Arc<Mutex<HashMap<String, PendingFetch<E>>>>,
}

impl<E> InFlight<E>
where
    E: From<JoinError> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether no fetch is currently in progress.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Runs the work produced by `work` under `key`, unless a fetch for the
    /// same key is already in progress, in which case its outcome is awaited
    /// instead and `work` is never invoked.
    ///
    /// The work runs to completion on its own task, so a caller that
    /// disconnects mid-fetch does not abort the fetch for everyone else.
    pub async fn claim_or_join<W, F>(&self, key: &str, work: W) -> Result<(), Arc<E>>
    where
        W: FnOnce() -> F,
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let fetch = {
            let mut pending = self.pending.lock();
            if let Some(existing) = pending.get(key) {
                debug!("joining in-flight fetch for {}", key);
                existing.clone()
            } else {
                let ticket = Ticket {
                    pending: Arc::clone(&self.pending),
                    key: key.to_string(),
                };
                let future = work();
                let handle = tokio::spawn(async move {
                    let _ticket = ticket;
                    future.await.map_err(Arc::new)
                });
                let fetch: PendingFetch<E> = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_err) => Err(Arc::new(E::from(join_err))),
                    }
                }
                .boxed()
                .shared();
                pending.insert(key.to_string(), fetch.clone());
                fetch
            }
        };
        fetch.await
    }
}

// Removes the registration when the fetch task settles, panics included.
struct Ticket<E> {
    pending: Arc<Mutex<HashMap<String, PendingFetch<E>>>>,
    key: String,
}

impl<E> Drop for Ticket<E> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct TestError(&'static str);

    impl From<JoinError> for TestError {
        fn from(_: JoinError) -> Self {
            TestError("task died")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_run_the_work_once() {
        let inflight = Arc::new(InFlight::<TestError>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let inflight = Arc::clone(&inflight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    inflight
                        .claim_or_join("key", move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failure_is_shared_and_the_key_is_released() {
        let inflight = Arc::new(InFlight::<TestError>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let work = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(TestError("origin said no"))
            }
        };

        let joiner = {
            let inflight = Arc::clone(&inflight);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { inflight.claim_or_join("key", work(calls)).await })
        };
        let claimer = inflight.claim_or_join("key", work(Arc::clone(&calls))).await;
        let joined = joiner.await.unwrap();

        assert_eq!(*claimer.unwrap_err(), TestError("origin said no"));
        assert_eq!(*joined.unwrap_err(), TestError("origin said no"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());

        // the failed key can be claimed again afterwards
        let retry = inflight
            .claim_or_join("key", {
                let calls = Arc::clone(&calls);
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert!(retry.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_keys_do_not_share_work() {
        let inflight = InFlight::<TestError>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["first", "second"] {
            let calls = Arc::clone(&calls);
            inflight
                .claim_or_join(key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_work_releases_the_key() {
        let inflight = InFlight::<TestError>::new();

        let result = inflight
            .claim_or_join("key", || async { panic!("boom") })
            .await;

        assert_eq!(*result.unwrap_err(), TestError("task died"));
        assert!(inflight.is_empty());
    }
}
