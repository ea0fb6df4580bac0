use std::sync::Arc;

use axum_extra::extract::cookie::Cookie;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Settled result of one coalesced refresh exchange, handed to every
/// request that joined it. `None` means the refresh was rejected and the
/// subscribers must terminate their requests unauthenticated.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: String,
    /// Set-Cookie descriptors from the exchange, propagated onto each
    /// subscriber's response.
    pub cookies: Vec<Cookie<'static>>,
}

/// The memoized in-flight exchange all subscribers of one key await.
pub type SharedRefresh = Shared<BoxFuture<'static, Option<RefreshedSession>>>;

/// Coalesces concurrent refresh exchanges onto one upstream call per
/// distinct refresh-token value.
///
/// The map entry exists only while the exchange is outstanding: the owning
/// task removes it before the shared result settles, so a later request
/// with the same (or a rotated) token always starts a fresh attempt instead
/// of replaying a memoized failure. The exchange runs as a detached task —
/// waiters that disconnect never cancel it, and remaining subscribers still
/// observe its outcome.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    in_flight: Arc<DashMap<String, SharedRefresh>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight refresh for `refresh_token`, starting one via
    /// `start` if none exists. Get-or-create is atomic: two racing requests
    /// can never both invoke `start` for the same key.
    pub fn join<F>(&self, refresh_token: &str, start: F) -> SharedRefresh
    where
        F: FnOnce() -> BoxFuture<'static, Option<RefreshedSession>>,
    {
        self.in_flight
            .entry(refresh_token.to_string())
            .or_insert_with(|| {
                let map = Arc::clone(&self.in_flight);
                let key = refresh_token.to_string();
                let exchange = start();
                let task = tokio::spawn(async move {
                    let settled = exchange.await;
                    // Free the key before any waiter observes the result.
                    map.remove(&key);
                    settled
                });
                // A panicked or aborted exchange settles as a rejection.
                task.map(|joined| joined.ok().flatten()).boxed().shared()
            })
            .clone()
    }

    /// Number of exchanges currently outstanding.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn session(token: &str) -> RefreshedSession {
        RefreshedSession {
            access_token: token.to_string(),
            cookies: Vec::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_share_one_exchange() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let joins: Vec<_> = (0..50)
            .map(|_| {
                let calls = Arc::clone(&calls);
                coordinator.join("stale-rt", move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Some(session("fresh-at"))
                    }
                    .boxed()
                })
            })
            .collect();

        let outcomes = futures::future::join_all(joins).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(
            outcomes
                .iter()
                .all(|o| o.as_ref().map(|s| s.access_token.as_str()) == Some("fresh-at"))
        );
        assert_eq!(coordinator.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_tokens_do_not_coalesce() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let calls = Arc::clone(&calls);
            coordinator.join("rt-a", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(session("at-a"))
                }
                .boxed()
            })
        };
        let b = {
            let calls = Arc::clone(&calls);
            coordinator.join("rt-b", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(session("at-b"))
                }
                .boxed()
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.map(|s| s.access_token), Some("at-a".to_string()));
        assert_eq!(b.map(|s| s.access_token), Some("at-b".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_not_cached_across_settlement() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let calls = Arc::clone(&calls);
            coordinator.join("rt", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                }
                .boxed()
            })
        };
        assert!(first.await.is_none());
        assert_eq!(coordinator.pending(), 0);

        // The key settled and was released: a new attempt reaches upstream.
        let second = {
            let calls = Arc::clone(&calls);
            coordinator.join("rt", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(session("recovered"))
                }
                .boxed()
            })
        };
        assert_eq!(second.await.map(|s| s.access_token), Some("recovered".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exchange_survives_dropped_waiters() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let join = {
            let calls = Arc::clone(&calls);
            let finished = Arc::clone(&finished);
            coordinator.join("rt", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Some(session("at"))
                }
                .boxed()
            })
        };
        // The only waiter disconnects before the exchange settles.
        drop(join);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending(), 0);
    }
}
