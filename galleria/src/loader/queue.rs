//! Admission control for concurrent image loads.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::backlog::{Backlog, PendingLoad};
use super::error::LoadError;
use super::fetcher::ImageFetcher;
use super::task::{LoadHandle, LoadResult, LoadState, LoadTask, LoadedImage};
use crate::monitor::PerformanceMonitor;
use crate::policy::MAX_CONCURRENT;

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Loads currently fetching.
    pub in_flight: usize,
    /// Current concurrency limit.
    pub max_concurrent: usize,
    /// Loads waiting for a slot.
    pub backlog: usize,
    /// Loads finished successfully.
    pub completed: u64,
    /// Loads finished with an error.
    pub failed: u64,
    /// Loads removed from the backlog by [`ConcurrentLoadQueue::drain`].
    pub drained: u64,
}

struct QueueState {
    in_flight: usize,
    max_concurrent: usize,
    backlog: Backlog,
    completed: u64,
    failed: u64,
    drained: u64,
}

impl QueueState {
    /// Pop backlog entries into free slots, marking them as loading.
    fn admit_ready(&mut self) -> Vec<PendingLoad> {
        let mut admitted = Vec::new();
        while self.in_flight < self.max_concurrent {
            let Some(load) = self.backlog.pop() else {
                break;
            };
            self.in_flight += 1;
            *load.state.lock() = LoadState::Loading;
            admitted.push(load);
        }
        admitted
    }
}

struct QueueInner {
    fetcher: Arc<dyn ImageFetcher>,
    monitor: Arc<PerformanceMonitor>,
    state: Mutex<QueueState>,
}

/// Bounded-concurrency load queue.
///
/// Cheap to clone; clones share the same slots and backlog. Must be used
/// from within a tokio runtime since admitted loads are spawned as tasks.
#[derive(Clone)]
pub struct ConcurrentLoadQueue {
    inner: Arc<QueueInner>,
}

impl ConcurrentLoadQueue {
    /// Create a queue with the given concurrency limit (clamped to `[1, 6]`).
    pub fn new(fetcher: Arc<dyn ImageFetcher>, monitor: Arc<PerformanceMonitor>, max_concurrent: usize) -> Self {
        let max_concurrent = clamp_concurrency(max_concurrent);

        info!(max_concurrent, "Load queue created");

        Self {
            inner: Arc::new(QueueInner {
                fetcher,
                monitor,
                state: Mutex::new(QueueState {
                    in_flight: 0,
                    max_concurrent,
                    backlog: Backlog::new(),
                    completed: 0,
                    failed: 0,
                    drained: 0,
                }),
            }),
        }
    }

    /// Submit a load. Starts immediately if a slot is free, otherwise waits
    /// in the backlog.
    pub fn enqueue(&self, task: LoadTask) -> LoadHandle {
        let state = Arc::new(Mutex::new(LoadState::Queued));
        let (tx, rx) = oneshot::channel();
        let handle = LoadHandle::new(task.url.clone(), state.clone(), rx);
        let load = PendingLoad::new(task, state, tx);

        let admitted = {
            let mut queue = self.inner.state.lock();
            if queue.in_flight < queue.max_concurrent {
                queue.in_flight += 1;
                *load.state.lock() = LoadState::Loading;
                debug!(
                    url = %load.task.url,
                    in_flight = queue.in_flight,
                    max_concurrent = queue.max_concurrent,
                    "Load admitted"
                );
                Some(load)
            } else {
                debug!(
                    url = %load.task.url,
                    priority = load.task.priority,
                    backlog = queue.backlog.len() + 1,
                    "Load queued"
                );
                queue.backlog.push(load);
                None
            }
        };

        if let Some(load) = admitted {
            self.inner.start(load);
        }
        handle
    }

    /// Remove every backlog entry without touching in-flight loads.
    ///
    /// Drained handles resolve to [`LoadError::Drained`]. Returns how many
    /// entries were removed.
    pub fn drain(&self) -> usize {
        let drained = {
            let mut queue = self.inner.state.lock();
            let drained = queue.backlog.drain();
            queue.drained += drained.len() as u64;
            drained
        };

        let count = drained.len();
        for load in drained {
            *load.state.lock() = LoadState::Failed;
            let _ = load.tx.send(Err(LoadError::Drained { url: load.task.url }));
        }

        if count > 0 {
            info!(drained = count, "Load backlog drained");
        }
        count
    }

    /// Number of loads currently fetching.
    pub fn current_load(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Current concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.inner.state.lock().max_concurrent
    }

    /// Number of loads waiting for a slot.
    pub fn backlog_len(&self) -> usize {
        self.inner.state.lock().backlog.len()
    }

    /// Change the concurrency limit (clamped to `[1, 6]`).
    ///
    /// Raising the limit admits waiting loads right away. Lowering it never
    /// interrupts loads already in flight.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        let max_concurrent = clamp_concurrency(max_concurrent);
        let admitted = {
            let mut queue = self.inner.state.lock();
            if queue.max_concurrent == max_concurrent {
                return;
            }
            debug!(
                from = queue.max_concurrent,
                to = max_concurrent,
                "Load concurrency changed"
            );
            queue.max_concurrent = max_concurrent;
            queue.admit_ready()
        };

        for load in admitted {
            self.inner.start(load);
        }
    }

    /// Current counters.
    pub fn stats(&self) -> QueueStats {
        let queue = self.inner.state.lock();
        QueueStats {
            in_flight: queue.in_flight,
            max_concurrent: queue.max_concurrent,
            backlog: queue.backlog.len(),
            completed: queue.completed,
            failed: queue.failed,
            drained: queue.drained,
        }
    }

    /// The monitor load outcomes are reported to.
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.inner.monitor
    }
}

impl std::fmt::Debug for ConcurrentLoadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentLoadQueue")
            .field("stats", &self.stats())
            .finish()
    }
}

impl QueueInner {
    fn start(self: &Arc<Self>, load: PendingLoad) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let waited_ms = load.enqueued_at.elapsed().as_millis() as u64;
            let started = Instant::now();

            // A panicking fetcher still has to free its slot
            let outcome = AssertUnwindSafe(inner.fetcher.fetch(&load.task.url))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(bytes)) => Ok(LoadedImage {
                    url: load.task.url.clone(),
                    bytes,
                    elapsed: started.elapsed(),
                }),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(LoadError::Abandoned {
                    url: load.task.url.clone(),
                }),
            };

            inner.finish(load, started, waited_ms, result);
        });
    }

    fn finish(self: &Arc<Self>, load: PendingLoad, started: Instant, waited_ms: u64, result: LoadResult) {
        let success = result.is_ok();
        self.monitor.record(started, success);
        *load.state.lock() = if success {
            LoadState::Done
        } else {
            LoadState::Failed
        };

        let admitted = {
            let mut queue = self.state.lock();
            queue.in_flight = queue.in_flight.saturating_sub(1);
            if success {
                queue.completed += 1;
            } else {
                queue.failed += 1;
            }
            queue.admit_ready()
        };

        match &result {
            Ok(image) => debug!(
                url = %image.url,
                bytes = image.bytes.len(),
                elapsed_ms = image.elapsed.as_millis() as u64,
                waited_ms,
                "Load completed"
            ),
            Err(e) => debug!(url = %load.task.url, error = %e, waited_ms, "Load failed"),
        }

        for next in admitted {
            self.start(next);
        }

        // Caller may have dropped the handle
        let _ = load.tx.send(result);
    }
}

fn clamp_concurrency(max_concurrent: usize) -> usize {
    max_concurrent.clamp(1, MAX_CONCURRENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testing::{GatedFetcher, StaticFetcher};
    use std::time::Duration;

    fn queue_with(fetcher: Arc<dyn ImageFetcher>, max: usize) -> (ConcurrentLoadQueue, Arc<PerformanceMonitor>) {
        let monitor = Arc::new(PerformanceMonitor::new());
        (ConcurrentLoadQueue::new(fetcher, monitor.clone(), max), monitor)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_load_succeeds_and_reports_to_monitor() {
        let (queue, monitor) = queue_with(Arc::new(StaticFetcher::ok(vec![7; 16])), 2);

        let handle = queue.enqueue(LoadTask::new("/a.webp"));
        let image = handle.wait().await.unwrap();

        assert_eq!(image.bytes.len(), 16);
        assert_eq!(monitor.snapshot().total_loads, 1);
        assert_eq!(queue.stats().completed, 1);
        assert_eq!(queue.current_load(), 0);
    }

    #[tokio::test]
    async fn test_failure_reported_not_retried() {
        let fetcher = Arc::new(StaticFetcher::failing());
        let (queue, monitor) = queue_with(fetcher.clone(), 2);

        let handle = queue.enqueue(LoadTask::new("/broken.webp"));
        assert!(handle.wait().await.is_err());

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(monitor.failure_rate(), 1.0);
        assert_eq!(queue.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let fetcher = Arc::new(GatedFetcher::new());
        let (queue, _) = queue_with(fetcher.clone(), 2);

        let handles: Vec<LoadHandle> = (0..6).map(|i| queue.enqueue(LoadTask::new(format!("/{}.webp", i)))).collect();
        assert_eq!(queue.current_load(), 2);
        assert_eq!(queue.backlog_len(), 4);

        for i in 0..6 {
            fetcher.release(&format!("/{}.webp", i));
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert!(fetcher.peak() <= 2);
        assert_eq!(queue.stats().completed, 6);
        assert_eq!(queue.backlog_len(), 0);
    }

    #[tokio::test]
    async fn test_priority_task_admitted_before_earlier_normal_tasks() {
        let fetcher = Arc::new(GatedFetcher::new());
        let (queue, _) = queue_with(fetcher.clone(), 1);

        let first = queue.enqueue(LoadTask::new("/first.webp"));
        let normal = queue.enqueue(LoadTask::new("/normal.webp"));
        let urgent = queue.enqueue(LoadTask::priority("/urgent.webp"));
        assert_eq!(normal.state(), LoadState::Queued);
        assert_eq!(urgent.state(), LoadState::Queued);

        fetcher.release("/first.webp");
        first.wait().await.unwrap();

        // The next slot went to the priority task
        assert_eq!(urgent.state(), LoadState::Loading);
        assert_eq!(normal.state(), LoadState::Queued);

        fetcher.release("/urgent.webp");
        fetcher.release("/normal.webp");
        urgent.wait().await.unwrap();
        normal.wait().await.unwrap();

        assert_eq!(
            fetcher.started(),
            vec!["/first.webp", "/urgent.webp", "/normal.webp"]
        );
    }

    #[tokio::test]
    async fn test_drain_clears_backlog_only() {
        let fetcher = Arc::new(GatedFetcher::new());
        let (queue, monitor) = queue_with(fetcher.clone(), 1);

        let running = queue.enqueue(LoadTask::new("/running.webp"));
        let waiting = queue.enqueue(LoadTask::new("/waiting.webp"));

        assert_eq!(queue.drain(), 1);
        let err = waiting.wait().await.unwrap_err();
        assert!(err.is_drained());

        assert_eq!(running.state(), LoadState::Loading);
        fetcher.release("/running.webp");
        running.wait().await.unwrap();

        // Drained loads are not load outcomes
        assert_eq!(monitor.snapshot().total_loads, 1);
        assert_eq!(queue.stats().drained, 1);
    }

    #[tokio::test]
    async fn test_raising_limit_admits_backlog() {
        let fetcher = Arc::new(GatedFetcher::new());
        let (queue, _) = queue_with(fetcher.clone(), 1);

        let handles: Vec<LoadHandle> = (0..3).map(|i| queue.enqueue(LoadTask::new(format!("/{}.webp", i)))).collect();
        assert_eq!(queue.current_load(), 1);

        queue.set_max_concurrent(3);
        assert_eq!(queue.current_load(), 3);
        assert_eq!(queue.backlog_len(), 0);

        wait_until(|| fetcher.started().len() == 3).await;
        for i in 0..3 {
            fetcher.release(&format!("/{}.webp", i));
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let (queue, _) = queue_with(Arc::new(StaticFetcher::ok(Vec::new())), 0);
        assert_eq!(queue.max_concurrent(), 1);

        queue.set_max_concurrent(64);
        assert_eq!(queue.max_concurrent(), MAX_CONCURRENT);
    }

    #[tokio::test]
    async fn test_lowering_limit_keeps_in_flight() {
        let fetcher = Arc::new(GatedFetcher::new());
        let (queue, _) = queue_with(fetcher.clone(), 3);

        let handles: Vec<LoadHandle> = (0..4).map(|i| queue.enqueue(LoadTask::new(format!("/{}.webp", i)))).collect();
        queue.set_max_concurrent(1);
        assert_eq!(queue.current_load(), 3);

        for i in 0..4 {
            fetcher.release(&format!("/{}.webp", i));
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }
        assert_eq!(queue.current_load(), 0);
    }

    struct PanickingFetcher;

    impl ImageFetcher for PanickingFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> crate::loader::BoxFuture<'a, Result<Vec<u8>, LoadError>> {
            Box::pin(async move {
                if url.is_empty() {
                    return Ok(Vec::new());
                }
                panic!("fetcher bug")
            })
        }
    }

    #[tokio::test]
    async fn test_panicking_fetcher_frees_slot() {
        let (queue, monitor) = queue_with(Arc::new(PanickingFetcher), 1);

        let err = queue.enqueue(LoadTask::new("/a.webp")).wait().await.unwrap_err();
        assert!(matches!(err, LoadError::Abandoned { .. }));
        assert_eq!(queue.current_load(), 0);
        assert_eq!(monitor.snapshot().failures, 1);
    }
}
