//! Preload scheduling on top of the load queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::mode::PreloadMode;
use crate::device::DeviceSignalProbe;
use crate::item::ImageItem;
use crate::loader::{ConcurrentLoadQueue, LoadTask};
use crate::monitor::PerformanceMonitor;
use crate::policy::{EffectivePolicy, QualityRequest, QualitySelector, RequestUrlBuilder};

/// Delay before critical preloading starts, so first paint is not blocked.
pub const DEFAULT_CRITICAL_DELAY: Duration = Duration::from_secs(1);

/// Quality ceiling for critical preloads.
pub const DEFAULT_CRITICAL_QUALITY_CAP: u8 = 30;

/// Look-ahead cap on mobile or slow connections.
pub const CONSTRAINED_LOOKAHEAD: usize = 2;

/// Look-ahead used when the caller has no preference.
pub const DEFAULT_LOOKAHEAD: usize = 3;

const MOBILE_CRITICAL_COUNT: usize = 3;
const DESKTOP_CRITICAL_COUNT: usize = 6;

/// Preload tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Wait before critical preloading.
    pub critical_delay: Duration,
    /// Quality ceiling for critical preloads.
    pub critical_quality_cap: u8,
    /// Default look-ahead distance.
    pub lookahead: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            critical_delay: DEFAULT_CRITICAL_DELAY,
            critical_quality_cap: DEFAULT_CRITICAL_QUALITY_CAP,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

impl PreloadConfig {
    /// Set the critical preload delay.
    pub fn with_critical_delay(mut self, delay: Duration) -> Self {
        self.critical_delay = delay;
        self
    }

    /// Set the critical quality ceiling.
    pub fn with_critical_quality_cap(mut self, cap: u8) -> Self {
        self.critical_quality_cap = cap;
        self
    }

    /// Set the default look-ahead distance.
    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }
}

/// URLs the scheduler has already handled.
#[derive(Debug, Default)]
struct Tracked {
    /// Loaded successfully.
    preloaded: HashSet<String>,
    /// Submitted and not yet settled.
    in_flight: HashSet<String>,
}

/// Releases in-flight URLs when a pass settles or is dropped mid-flight.
struct InFlightGuard<'a> {
    tracked: &'a Mutex<Tracked>,
    urls: Vec<String>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut tracked = self.tracked.lock();
        for url in &self.urls {
            tracked.in_flight.remove(url);
        }
    }
}

/// Outcome of one preload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    /// Items selected for preloading.
    pub requested: usize,
    /// Items actually submitted to the queue.
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items not submitted (already preloaded or in flight, or preloading disabled).
    pub skipped: usize,
}

/// Submits critical and look-ahead preloads to the load queue.
pub struct PreloadScheduler {
    queue: ConcurrentLoadQueue,
    probe: DeviceSignalProbe,
    monitor: Arc<PerformanceMonitor>,
    selector: QualitySelector,
    urls: RequestUrlBuilder,
    request: QualityRequest,
    config: PreloadConfig,
    tracked: Mutex<Tracked>,
}

impl PreloadScheduler {
    /// Create a scheduler.
    ///
    /// `request` is the base quality and width; device constraints and the
    /// monitor's feedback are applied on every pass.
    pub fn new(
        queue: ConcurrentLoadQueue,
        probe: DeviceSignalProbe,
        urls: RequestUrlBuilder,
        request: QualityRequest,
        config: PreloadConfig,
    ) -> Self {
        let monitor = Arc::clone(queue.monitor());
        Self {
            queue,
            probe,
            monitor,
            selector: QualitySelector::new(),
            urls,
            request,
            config,
            tracked: Mutex::new(Tracked::default()),
        }
    }

    /// Preload configuration.
    pub fn config(&self) -> PreloadConfig {
        self.config
    }

    /// Critical preload count for the current device.
    pub fn default_critical_count(&self) -> usize {
        if self.probe.profile().is_mobile {
            MOBILE_CRITICAL_COUNT
        } else {
            DESKTOP_CRITICAL_COUNT
        }
    }

    /// Current connection-aware preload mode.
    pub fn mode(&self) -> PreloadMode {
        PreloadMode::from_connection(self.probe.connection().as_ref())
    }

    fn policy(&self) -> EffectivePolicy {
        let request = self
            .request
            .with_reduce_quality(self.monitor.should_reduce_quality());
        self.selector.select(&self.probe.profile(), request)
    }

    /// Preload the first `count` priority items after the startup delay.
    ///
    /// When no item carries the priority flag, the leading items are used.
    /// Skipped entirely on slow connections or when the mode is disabled;
    /// a limited connection only gets a small batch.
    pub async fn preload_critical(&self, items: &[ImageItem], count: usize) -> PreloadReport {
        if !self.config.critical_delay.is_zero() {
            tokio::time::sleep(self.config.critical_delay).await;
        }

        let mut selected = select_critical(items, count);
        let profile = self.probe.profile();
        let mode = self.mode();
        if !mode.allows_preload() || profile.is_slow_connection {
            info!(
                mode = %mode,
                slow_connection = profile.is_slow_connection,
                "Skipping critical preload"
            );
            return PreloadReport {
                requested: selected.len(),
                skipped: selected.len(),
                ..Default::default()
            };
        }

        selected.truncate(mode.cap_batch(selected.len()));

        let policy = self.policy();
        self.queue.set_max_concurrent(policy.max_concurrent);

        let quality = policy.quality.min(self.config.critical_quality_cap);
        let report = self.submit(&selected, policy.max_width, quality, true).await;

        info!(
            requested = report.requested,
            succeeded = report.succeeded,
            failed = report.failed,
            quality,
            "Critical preload finished"
        );
        report
    }

    /// Preload the `lookahead` items after `current_index`.
    ///
    /// Look-ahead is capped on mobile devices, slow connections and limited
    /// connection modes.
    pub async fn preload_ahead(&self, current_index: usize, items: &[ImageItem], lookahead: usize) -> PreloadReport {
        let profile = self.probe.profile();
        let mode = self.mode();

        let mut lookahead = mode.cap_batch(lookahead);
        if profile.is_constrained() {
            lookahead = lookahead.min(CONSTRAINED_LOOKAHEAD);
        }

        let start = current_index.saturating_add(1).min(items.len());
        let end = start.saturating_add(lookahead).min(items.len());
        let selected: Vec<&ImageItem> = items[start..end].iter().collect();

        if !mode.allows_preload() {
            debug!(current_index, "Look-ahead preload disabled by connection");
            return PreloadReport::default();
        }

        let policy = self.policy();
        self.queue.set_max_concurrent(policy.max_concurrent);
        let report = self.submit(&selected, policy.max_width, policy.quality, false).await;

        debug!(
            current_index,
            lookahead,
            submitted = report.submitted,
            skipped = report.skipped,
            failed = report.failed,
            "Look-ahead preload finished"
        );
        report
    }

    /// Whether a request URL has been preloaded successfully.
    pub fn is_preloaded(&self, url: &str) -> bool {
        self.tracked.lock().preloaded.contains(url)
    }

    /// Number of URLs preloaded so far.
    pub fn preloaded_count(&self) -> usize {
        self.tracked.lock().preloaded.len()
    }

    /// Number of preloads submitted and not yet settled.
    pub fn in_flight_count(&self) -> usize {
        self.tracked.lock().in_flight.len()
    }

    /// Forget every preloaded URL.
    ///
    /// Preloads still in flight keep blocking duplicates until they settle.
    pub fn clear(&self) {
        self.tracked.lock().preloaded.clear();
    }

    async fn submit(&self, items: &[&ImageItem], width: u32, quality: u8, priority: bool) -> PreloadReport {
        let host = self.probe.signals().host();
        let mut report = PreloadReport {
            requested: items.len(),
            ..Default::default()
        };

        // Claimed under one lock so concurrent passes never submit the same URL
        let guard = {
            let mut tracked = self.tracked.lock();
            let mut urls = Vec::with_capacity(items.len());
            for item in items {
                let url = self.urls.build_with(host.as_deref(), &item.source, width, quality);
                if tracked.preloaded.contains(&url) || !tracked.in_flight.insert(url.clone()) {
                    report.skipped += 1;
                    continue;
                }
                urls.push(url);
            }
            InFlightGuard {
                tracked: &self.tracked,
                urls,
            }
        };

        let handles: Vec<_> = guard
            .urls
            .iter()
            .map(|url| {
                self.queue.enqueue(LoadTask {
                    url: url.clone(),
                    priority,
                })
            })
            .collect();
        report.submitted = handles.len();

        let results = join_all(handles.into_iter().map(|handle| handle.wait())).await;
        {
            let mut tracked = self.tracked.lock();
            for (url, result) in guard.urls.iter().zip(results) {
                match result {
                    Ok(_) => {
                        tracked.preloaded.insert(url.clone());
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Preload failed");
                        report.failed += 1;
                    }
                }
            }
        }
        drop(guard);

        report
    }
}

impl std::fmt::Debug for PreloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadScheduler")
            .field("config", &self.config)
            .field("preloaded", &self.preloaded_count())
            .finish_non_exhaustive()
    }
}

fn select_critical(items: &[ImageItem], count: usize) -> Vec<&ImageItem> {
    let flagged: Vec<&ImageItem> = items.iter().filter(|item| item.priority).take(count).collect();
    if !flagged.is_empty() {
        return flagged;
    }
    items.iter().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BrowserSignals, ConnectionHint, NoopSignals, PlatformSignals};
    use crate::loader::testing::{GatedFetcher, StaticFetcher};
    use crate::loader::{ImageFetcher, LoadError};
    use crate::policy::DeliveryConfig;

    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";
    const MOBILE_UA: &str = "Mozilla/5.0 (Linux; Android 14)";

    fn items(n: usize) -> Vec<ImageItem> {
        (0..n)
            .map(|i| ImageItem::new(format!("image{:02}", i), format!("/images/{:02}.webp", i), 640, 960))
            .collect()
    }

    fn scheduler(signals: Arc<dyn PlatformSignals>, fetcher: Arc<dyn ImageFetcher>) -> PreloadScheduler {
        let monitor = Arc::new(PerformanceMonitor::new());
        let queue = ConcurrentLoadQueue::new(fetcher, monitor, 6);
        PreloadScheduler::new(
            queue,
            DeviceSignalProbe::new(signals),
            RequestUrlBuilder::default(),
            QualityRequest::default(),
            PreloadConfig::default().with_critical_delay(Duration::ZERO),
        )
    }

    fn fast_desktop() -> Arc<dyn PlatformSignals> {
        Arc::new(BrowserSignals::new(DESKTOP_UA).with_connection(ConnectionHint::effective("4g").with_downlink(20.0)))
    }

    #[test]
    fn test_select_critical_prefers_flagged() {
        let mut list = items(8);
        list[2].priority = true;
        list[5].priority = true;

        let selected = select_critical(&list, 6);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].alt, "image02");

        let unflagged = items(8);
        assert_eq!(select_critical(&unflagged, 3).len(), 3);
    }

    #[tokio::test]
    async fn test_preload_ahead_requests_next_items() {
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(fast_desktop(), fetcher.clone());
        let list = items(10);

        let report = scheduler.preload_ahead(2, &list, 3).await;

        assert_eq!(report.submitted, 3);
        assert_eq!(report.succeeded, 3);
        assert!(scheduler.is_preloaded("/images/03.webp"));
        assert!(scheduler.is_preloaded("/images/05.webp"));
        assert!(!scheduler.is_preloaded("/images/06.webp"));
    }

    #[tokio::test]
    async fn test_preload_ahead_skips_already_preloaded() {
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(fast_desktop(), fetcher.clone());
        let list = items(10);

        scheduler.preload_ahead(0, &list, 2).await;
        let report = scheduler.preload_ahead(0, &list, 3).await;

        assert_eq!(report.skipped, 2);
        assert_eq!(report.submitted, 1);
        assert_eq!(fetcher.calls(), 3);

        scheduler.clear();
        assert_eq!(scheduler.preloaded_count(), 0);
    }

    #[tokio::test]
    async fn test_preload_ahead_near_end_of_list() {
        let scheduler = scheduler(fast_desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        let list = items(4);

        assert_eq!(scheduler.preload_ahead(2, &list, 3).await.submitted, 1);
        assert_eq!(scheduler.preload_ahead(3, &list, 3).await.submitted, 0);
        assert_eq!(scheduler.preload_ahead(99, &list, 3).await.submitted, 0);
    }

    #[tokio::test]
    async fn test_mobile_lookahead_is_capped() {
        let signals: Arc<dyn PlatformSignals> =
            Arc::new(BrowserSignals::new(MOBILE_UA).with_connection(ConnectionHint::effective("4g")));
        let scheduler = scheduler(signals, Arc::new(StaticFetcher::ok(vec![1])));

        let report = scheduler.preload_ahead(0, &items(10), 5).await;
        assert_eq!(report.submitted, CONSTRAINED_LOOKAHEAD);
    }

    #[tokio::test]
    async fn test_limited_mode_caps_batch() {
        let signals: Arc<dyn PlatformSignals> =
            Arc::new(BrowserSignals::new(DESKTOP_UA).with_connection(ConnectionHint::effective("3g").with_downlink(5.0)));
        let scheduler = scheduler(signals, Arc::new(StaticFetcher::ok(vec![1])));

        assert_eq!(scheduler.mode(), PreloadMode::Limited);
        assert_eq!(scheduler.preload_ahead(0, &items(10), 5).await.submitted, 2);
    }

    #[tokio::test]
    async fn test_limited_mode_caps_critical_batch() {
        let signals: Arc<dyn PlatformSignals> =
            Arc::new(BrowserSignals::new(DESKTOP_UA).with_connection(ConnectionHint::effective("3g").with_downlink(5.0)));
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(signals, fetcher.clone());

        let mut list = items(10);
        for item in &mut list {
            item.priority = true;
        }

        let report = scheduler.preload_critical(&list, 6).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.submitted, 2);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_passes_share_in_flight_loads() {
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]).with_delay(Duration::from_millis(50)));
        let scheduler = Arc::new(scheduler(fast_desktop(), fetcher.clone()));
        let list: Arc<[ImageItem]> = items(10).into();

        let first = {
            let scheduler = Arc::clone(&scheduler);
            let list = Arc::clone(&list);
            tokio::spawn(async move { scheduler.preload_ahead(0, &list, 3).await })
        };
        for _ in 0..200 {
            if scheduler.in_flight_count() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(scheduler.in_flight_count(), 3);

        let second = scheduler.preload_ahead(0, &list, 3).await;
        assert_eq!(second.submitted, 0);
        assert_eq!(second.skipped, 3);

        assert_eq!(first.await.unwrap().succeeded, 3);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(scheduler.in_flight_count(), 0);
        assert_eq!(scheduler.preloaded_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_preload_can_be_retried() {
        let fetcher = Arc::new(StaticFetcher::failing());
        let scheduler = scheduler(fast_desktop(), fetcher.clone());
        let list = items(4);

        assert_eq!(scheduler.preload_ahead(0, &list, 1).await.failed, 1);
        assert_eq!(scheduler.in_flight_count(), 0);
        assert_eq!(scheduler.preload_ahead(0, &list, 1).await.submitted, 1);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_preload_ahead_applies_policy_concurrency() {
        let monitor = Arc::new(PerformanceMonitor::new());
        let queue = ConcurrentLoadQueue::new(Arc::new(StaticFetcher::ok(vec![1])), monitor, 1);
        let scheduler = PreloadScheduler::new(
            queue.clone(),
            DeviceSignalProbe::new(fast_desktop()),
            RequestUrlBuilder::default(),
            QualityRequest::default(),
            PreloadConfig::default(),
        );

        assert_eq!(scheduler.preload_ahead(0, &items(10), 3).await.succeeded, 3);
        assert_eq!(queue.max_concurrent(), 6);
    }

    #[tokio::test]
    async fn test_save_data_disables_preloading() {
        let signals: Arc<dyn PlatformSignals> =
            Arc::new(BrowserSignals::new(DESKTOP_UA).with_connection(ConnectionHint::effective("4g").with_save_data(true)));
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(signals, fetcher.clone());

        let list = items(10);
        assert_eq!(scheduler.preload_ahead(0, &list, 3).await.submitted, 0);
        let critical = scheduler.preload_critical(&list, 6).await;
        assert_eq!(critical.submitted, 0);
        assert_eq!(critical.skipped, 6);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let fetcher = StaticFetcher::ok(vec![1]).with_response(
            "/images/01.webp",
            Err(LoadError::Status {
                url: "/images/01.webp".to_string(),
                status: 500,
            }),
        );
        let scheduler = scheduler(fast_desktop(), Arc::new(fetcher));

        let report = scheduler.preload_ahead(0, &items(10), 3).await;
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!scheduler.is_preloaded("/images/01.webp"));
    }

    #[tokio::test]
    async fn test_critical_preload_uses_low_quality_priority_requests() {
        let signals: Arc<dyn PlatformSignals> = Arc::new(
            BrowserSignals::new(DESKTOP_UA)
                .with_connection(ConnectionHint::effective("4g").with_downlink(20.0))
                .with_host("gallery.vercel.app"),
        );
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(signals, fetcher.clone());

        let mut list = items(10);
        list[0].priority = true;
        list[1].priority = true;

        let report = scheduler.preload_critical(&list, scheduler.default_critical_count()).await;
        assert_eq!(report.succeeded, 2);
        assert!(scheduler.is_preloaded("/_next/image?url=%2Fimages%2F00.webp&w=800&q=30"));
    }

    #[tokio::test]
    async fn test_critical_preload_skipped_on_slow_connection() {
        let signals: Arc<dyn PlatformSignals> = Arc::new(BrowserSignals::new(MOBILE_UA));
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let scheduler = scheduler(signals, fetcher.clone());

        let report = scheduler.preload_critical(&items(10), 3).await;
        assert_eq!(report.skipped, 3);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_critical_preload_applies_policy_concurrency() {
        let fetcher = Arc::new(GatedFetcher::new());
        let monitor = Arc::new(PerformanceMonitor::new());
        let queue = ConcurrentLoadQueue::new(fetcher.clone(), monitor, 1);
        let scheduler = PreloadScheduler::new(
            queue.clone(),
            DeviceSignalProbe::new(Arc::new(NoopSignals)),
            RequestUrlBuilder::new(DeliveryConfig::default()),
            QualityRequest::default(),
            PreloadConfig::default().with_critical_delay(Duration::ZERO),
        );

        let blocker = queue.enqueue(LoadTask::new("/blocker.webp"));
        let waiting = queue.enqueue(LoadTask::new("/waiting.webp"));
        assert_eq!(queue.backlog_len(), 1);

        let mut list = items(3);
        list[0].priority = true;
        let critical = tokio::spawn(async move { scheduler.preload_critical(&list, 1).await });

        // Desktop policy raises the limit to 6, so nothing stays queued
        for _ in 0..400 {
            if fetcher.started().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.max_concurrent(), 6);
        assert_eq!(queue.backlog_len(), 0);

        for url in ["/blocker.webp", "/waiting.webp", "/images/00.webp"] {
            fetcher.release(url);
        }

        assert_eq!(critical.await.unwrap().succeeded, 1);
        blocker.wait().await.unwrap();
        waiting.wait().await.unwrap();
    }
}
