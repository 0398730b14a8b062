//! Data-fetch state holders.
//!
//! [`Fetcher`] tracks one remote resource as `{data, error, is_loading}`;
//! [`PageFeed`] accumulates an infinite list page by page. Neither retries:
//! failures are captured into state for the view to offer a retry.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

mod pages;

pub use pages::{LoadOutcome, PageFeed};

/// Captured error of a failed fetch
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct FetchFailure {
    pub message: String,
}

impl From<anyhow::Error> for FetchFailure {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchState<T> {
    /// Last successfully fetched data; kept while revalidating or after an error
    pub data: Option<T>,
    pub error: Option<FetchFailure>,
    /// True while any fetch is in flight
    pub is_loading: bool,
    /// Ticket handed to the most recent `run`
    #[serde(skip)]
    issued: u64,
    /// Ticket of the result currently shown; older results are dropped
    #[serde(skip)]
    committed: u64,
    #[serde(skip)]
    in_flight: usize,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            issued: 0,
            committed: 0,
            in_flight: 0,
        }
    }
}

impl<T> FetchState<T> {
    /// Loading with nothing to show yet
    pub fn is_initial_load(&self) -> bool {
        self.is_loading && self.data.is_none()
    }
}

/// State of one fetched resource, observable while a fetch is in flight
#[derive(Debug)]
pub struct Fetcher<T> {
    state: watch::Sender<FetchState<T>>,
}

impl<T: Clone + Send + Sync> Default for Fetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> Fetcher<T> {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(FetchState::default());
        Self { state }
    }

    /// Start with already-known data, e.g. rendered server-side
    pub fn with_data(data: T) -> Self {
        let (state, _rx) = watch::channel(FetchState {
            data: Some(data),
            ..FetchState::default()
        });
        Self { state }
    }

    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    /// Run one fetch and record its outcome. Returns true on success.
    ///
    /// Fetches may overlap. A result is only recorded if no newer fetch has
    /// been recorded already, and `is_loading` stays set until the last one
    /// finishes.
    pub async fn run<F>(&self, fetch: F) -> bool
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            state.issued += 1;
            ticket = state.issued;
            state.in_flight += 1;
            state.is_loading = true;
            state.error = None;
        });
        let mut pending = PendingFetch {
            state: &self.state,
            settled: false,
        };

        let result = fetch.await;
        let ok = result.is_ok();
        let outcome = result.map_err(FetchFailure::from);
        match &outcome {
            Ok(_) => debug!(ticket, "fetch succeeded"),
            Err(failure) => warn!(ticket, error = %failure, "fetch failed"),
        }

        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_loading = state.in_flight > 0;
            if ticket <= state.committed {
                debug!(ticket, committed = state.committed, "stale fetch result dropped");
                return;
            }
            state.committed = ticket;
            match outcome {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                }
                Err(failure) => state.error = Some(failure),
            }
        });
        pending.settled = true;
        ok
    }

    /// Replace the data locally without fetching. Fetches still in flight
    /// will not overwrite it.
    pub fn mutate(&self, data: T) {
        self.state.send_modify(|state| {
            state.data = Some(data);
            state.error = None;
            state.committed = state.issued;
        });
    }
}

/// Keeps `is_loading` accurate when a `run` future is dropped mid-flight
struct PendingFetch<'a, T> {
    state: &'a watch::Sender<FetchState<T>>,
    settled: bool,
}

impl<T> Drop for PendingFetch<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_loading = state.in_flight > 0;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_success_sets_data() {
        let fetcher = Fetcher::new();
        assert!(fetcher.run(async { Ok(vec!["beach cleanup"]) }).await);

        let state = fetcher.state();
        assert_eq!(state.data, Some(vec!["beach cleanup"]));
        assert!(state.error.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_failure_keeps_stale_data() {
        let fetcher = Fetcher::with_data(3_u32);
        let ok = fetcher
            .run(async { Err(anyhow::anyhow!("timeout").context("GET /causes")) })
            .await;
        assert!(!ok);

        let state = fetcher.state();
        assert_eq!(state.data, Some(3));
        assert_eq!(
            state.error.map(|e| e.message),
            Some("GET /causes: timeout".to_string())
        );
    }

    #[tokio::test]
    async fn test_loading_visible_while_in_flight() {
        let fetcher = Arc::new(Fetcher::<u8>::new());
        let gate = Arc::new(Notify::new());
        let mut rx = fetcher.subscribe();

        let task = {
            let fetcher = Arc::clone(&fetcher);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                fetcher
                    .run(async move {
                        gate.notified().await;
                        Ok(1)
                    })
                    .await
            })
        };

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_initial_load());

        gate.notify_one();
        assert!(task.await.unwrap());
        assert_eq!(fetcher.state().data, Some(1));
    }

    #[tokio::test]
    async fn test_older_fetch_never_overwrites_newer_one() {
        let fetcher = Arc::new(Fetcher::new());
        let gate = Arc::new(Notify::new());
        let mut rx = fetcher.subscribe();

        let older = {
            let fetcher = Arc::clone(&fetcher);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                fetcher
                    .run(async move {
                        gate.notified().await;
                        Ok("old")
                    })
                    .await
            })
        };
        rx.changed().await.unwrap();

        assert!(fetcher.run(async { Ok("new") }).await);
        let state = fetcher.state();
        assert_eq!(state.data, Some("new"));
        // The older request is still pending
        assert!(state.is_loading);

        gate.notify_one();
        assert!(older.await.unwrap());
        let state = fetcher.state();
        assert_eq!(state.data, Some("new"));
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_stops_loading() {
        let fetcher = Arc::new(Fetcher::<u8>::new());
        let mut rx = fetcher.subscribe();
        let task = {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { fetcher.run(std::future::pending()).await })
        };
        rx.changed().await.unwrap();
        assert!(fetcher.state().is_loading);

        task.abort();
        let _ = task.await;
        assert!(!fetcher.state().is_loading);
    }

    #[test]
    fn test_mutate_clears_error() {
        let fetcher = Fetcher::<u8>::new();
        fetcher.mutate(9);
        let state = fetcher.state();
        assert_eq!(state.data, Some(9));
        assert!(!state.is_loading);
    }
}
