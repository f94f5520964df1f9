//! Gallery engine facade.
//!
//! [`GalleryEngine`] owns one instance of every component and exposes the
//! handful of operations a rendering layer needs:
//!
//! ```text
//! on_scroll ──► VirtualWindowCalculator ──► VirtualWindow
//!     │
//!     └──(spawned)──► PreloadScheduler::preload_ahead ──► ConcurrentLoadQueue
//!
//! start ──(spawned, deferred)──► PreloadScheduler::preload_critical
//!
//! activation ──► VisibilityObserver (or immediate when unsupported)
//! placeholder ──► BlurPlaceholderCache
//! ```
//!
//! Background preloads are spawned on the ambient tokio runtime. Calling
//! [`GalleryEngine::shutdown`] cancels them and drains queued loads.

mod config;

pub use config::GalleryConfig;

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{DeviceProfile, DeviceSignalProbe, PlatformSignals};
use crate::item::ImageItem;
use crate::loader::{ConcurrentLoadQueue, ImageFetcher, LoadHandle, LoadTask};
use crate::monitor::PerformanceMonitor;
use crate::placeholder::{BlurPlaceholderCache, PlaceholderKey};
use crate::policy::{EffectivePolicy, QualitySelector, RequestUrlBuilder};
use crate::preload::{PreloadReport, PreloadScheduler};
use crate::visibility::{Bounds, VisibilityObserver, VisibilitySubscription};
use crate::window::{GalleryLayout, VirtualWindow, VirtualWindowCalculator};

/// Adaptive delivery engine for one gallery.
pub struct GalleryEngine {
    items: Arc<[ImageItem]>,
    config: GalleryConfig,
    probe: DeviceSignalProbe,
    selector: QualitySelector,
    urls: RequestUrlBuilder,
    monitor: Arc<PerformanceMonitor>,
    queue: ConcurrentLoadQueue,
    placeholders: BlurPlaceholderCache,
    scheduler: Arc<PreloadScheduler>,
    calculator: VirtualWindowCalculator,
    observer: VisibilityObserver,
    shutdown: CancellationToken,
}

impl GalleryEngine {
    /// Build an engine over `items`.
    ///
    /// The load queue starts with the concurrency limit of the current
    /// device policy.
    pub fn new(
        items: Vec<ImageItem>,
        signals: Arc<dyn PlatformSignals>,
        fetcher: Arc<dyn ImageFetcher>,
        config: GalleryConfig,
    ) -> Self {
        let probe = DeviceSignalProbe::new(signals);
        let selector = QualitySelector::new();
        let monitor = Arc::new(PerformanceMonitor::new());

        let profile = probe.profile();
        let initial = selector.select(&profile, config.quality);
        let queue = ConcurrentLoadQueue::new(Arc::clone(&fetcher), Arc::clone(&monitor), initial.max_concurrent);
        let placeholders = BlurPlaceholderCache::new(fetcher, config.placeholder);

        let scheduler = Arc::new(PreloadScheduler::new(
            queue.clone(),
            probe.clone(),
            RequestUrlBuilder::new(config.delivery.clone()),
            config.quality,
            config.preload,
        ));

        info!(
            items = items.len(),
            mobile = profile.is_mobile,
            slow_connection = profile.is_slow_connection,
            quality = initial.quality,
            max_width = initial.max_width,
            max_concurrent = initial.max_concurrent,
            "Gallery engine created"
        );

        Self {
            items: items.into(),
            urls: RequestUrlBuilder::new(config.delivery.clone()),
            calculator: VirtualWindowCalculator::with_gap(config.gap),
            observer: VisibilityObserver::new(config.observer),
            config,
            probe,
            selector,
            monitor,
            queue,
            placeholders,
            scheduler,
            shutdown: CancellationToken::new(),
        }
    }

    /// Items in display order.
    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// Current device profile.
    pub fn profile(&self) -> DeviceProfile {
        self.probe.profile()
    }

    /// Current effective policy, including monitor feedback.
    pub fn policy(&self) -> EffectivePolicy {
        let request = self
            .config
            .quality
            .with_reduce_quality(self.monitor.should_reduce_quality());
        self.selector.select(&self.probe.profile(), request)
    }

    /// Grid geometry for the given viewport height.
    pub fn layout(&self, viewport_height: f64) -> GalleryLayout {
        let layout = GalleryLayout::for_viewport(&self.probe.profile(), viewport_height);
        match self.config.overscan {
            Some(overscan) => layout.with_overscan(overscan),
            None => layout,
        }
    }

    /// Compute the window without side effects.
    pub fn window(&self, scroll_top: f64, viewport_height: f64) -> VirtualWindow {
        let layout = self.layout(viewport_height);
        self.calculator.compute_window(self.items.len(), &layout, scroll_top)
    }

    /// Compute the window for a scroll position and preload what follows it.
    ///
    /// The look-ahead preload runs in the background; the window is returned
    /// immediately.
    pub fn on_scroll(&self, scroll_top: f64, viewport_height: f64) -> VirtualWindow {
        let window = self.window(scroll_top, viewport_height);
        if window.is_empty() {
            return window;
        }

        let scheduler = Arc::clone(&self.scheduler);
        let items = Arc::clone(&self.items);
        let current = window.end_index;
        let lookahead = self.config.preload.lookahead;
        self.spawn("look-ahead preload", async move {
            scheduler.preload_ahead(current, &items, lookahead).await
        });

        window
    }

    /// Start the deferred critical preload.
    ///
    /// Returns `None` when no tokio runtime is available or the engine has
    /// been shut down.
    pub fn start(&self) -> Option<JoinHandle<Option<PreloadReport>>> {
        let scheduler = Arc::clone(&self.scheduler);
        let items = Arc::clone(&self.items);
        let count = scheduler.default_critical_count();
        self.spawn("critical preload", async move {
            scheduler.preload_critical(&items, count).await
        })
    }

    /// Request URL for `item` under the current policy.
    pub fn request_url(&self, item: &ImageItem) -> String {
        let host = self.probe.signals().host();
        self.urls.build(host.as_deref(), &item.source, &self.policy())
    }

    /// Request URL for a thumbnail of `item`.
    pub fn thumbnail_url(&self, item: &ImageItem) -> String {
        let host = self.probe.signals().host();
        let profile = self.probe.profile();
        let policy = self.policy();
        let width = self.selector.thumbnail_width(&profile);
        self.urls.build_with(host.as_deref(), &item.source, width, policy.quality)
    }

    /// Blur placeholder for `item`, generated on first use.
    pub async fn placeholder(&self, item: &ImageItem) -> String {
        self.placeholders.generate_default(&item.source).await
    }

    /// Blur placeholder for `item` if one is already cached.
    pub fn cached_placeholder(&self, item: &ImageItem) -> Option<String> {
        let config = self.placeholders.config();
        let key = PlaceholderKey::new(item.source.as_str(), config.width, config.height, config.quality);
        self.placeholders.get(&key).map(|entry| entry.data_url.to_string())
    }

    /// Subscription that resolves when `item` should start loading.
    ///
    /// Priority items and platforms without visibility support resolve
    /// immediately.
    pub fn activation(&self, item: &ImageItem, bounds: Bounds) -> VisibilitySubscription {
        if item.priority || !self.probe.signals().supports_visibility() {
            return VisibilitySubscription::immediate();
        }
        self.observer.observe(bounds)
    }

    /// Report the viewport to pending activations.
    pub fn update_viewport(&self, viewport: Bounds) -> usize {
        self.observer.update_viewport(viewport)
    }

    /// Queue a full-quality load of `item`.
    pub fn load(&self, item: &ImageItem) -> LoadHandle {
        self.queue.set_max_concurrent(self.policy().max_concurrent);
        self.queue.enqueue(LoadTask {
            url: self.request_url(item),
            priority: item.priority,
        })
    }

    /// The page was hidden: forget collected performance samples.
    pub fn on_visibility_hidden(&self) {
        debug!("Page hidden, resetting performance monitor");
        self.monitor.reset();
    }

    /// Cancel background preloads, drain queued loads and drop pending
    /// activations.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let drained = self.queue.drain();
        self.observer.disconnect();
        info!(drained, "Gallery engine shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn queue(&self) -> &ConcurrentLoadQueue {
        &self.queue
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn placeholders(&self) -> &BlurPlaceholderCache {
        &self.placeholders
    }

    pub fn scheduler(&self) -> &Arc<PreloadScheduler> {
        &self.scheduler
    }

    pub fn observer(&self) -> &VisibilityObserver {
        &self.observer
    }

    fn spawn<F>(&self, what: &'static str, work: F) -> Option<JoinHandle<Option<PreloadReport>>>
    where
        F: Future<Output = PreloadReport> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            debug!(task = what, "Engine shut down, not spawning");
            return None;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(task = what, error = %e, "No tokio runtime, skipping background task");
                return None;
            }
        };

        let token = self.shutdown.clone();
        Some(handle.spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(task = what, "Background task cancelled");
                    None
                }
                report = work => Some(report),
            }
        }))
    }
}

impl std::fmt::Debug for GalleryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryEngine")
            .field("items", &self.items.len())
            .field("config", &self.config)
            .field("queue", &self.queue.stats())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BrowserSignals, ConnectionHint, NoopSignals};
    use crate::loader::testing::StaticFetcher;
    use crate::placeholder::DATA_URL_PREFIX;
    use crate::preload::PreloadConfig;
    use std::time::Duration;

    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/125.0";
    const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";

    fn items(count: usize) -> Vec<ImageItem> {
        (0..count)
            .map(|i| ImageItem::new(format!("Photo {}", i), format!("/images/{:02}.webp", i), 1200, 1800))
            .collect()
    }

    fn desktop() -> Arc<BrowserSignals> {
        Arc::new(
            BrowserSignals::new(DESKTOP_UA)
                .with_connection(ConnectionHint::effective("4g").with_downlink(10.0))
                .with_host("gallery.vercel.app"),
        )
    }

    fn config() -> GalleryConfig {
        GalleryConfig::default().with_preload(PreloadConfig::default().with_critical_delay(Duration::ZERO))
    }

    fn engine(count: usize, signals: Arc<dyn PlatformSignals>, fetcher: Arc<StaticFetcher>) -> GalleryEngine {
        GalleryEngine::new(items(count), signals, fetcher, config())
    }

    #[tokio::test]
    async fn test_request_url_uses_policy() {
        let engine = engine(4, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        let url = engine.request_url(&engine.items()[0]);
        assert_eq!(url, "/_next/image?url=%2Fimages%2F00.webp&w=800&q=75");

        let thumb = engine.thumbnail_url(&engine.items()[0]);
        assert_eq!(thumb, "/_next/image?url=%2Fimages%2F00.webp&w=150&q=75");
    }

    #[tokio::test]
    async fn test_unoptimized_host_keeps_source() {
        let signals = Arc::new(BrowserSignals::new(DESKTOP_UA).with_host("photos.example.com"));
        let engine = engine(1, signals, Arc::new(StaticFetcher::ok(vec![1])));
        assert_eq!(engine.request_url(&engine.items()[0]), "/images/00.webp");
    }

    #[tokio::test]
    async fn test_policy_reacts_to_monitor() {
        let engine = engine(1, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        assert_eq!(engine.policy().quality, 75);

        for _ in 0..5 {
            engine.monitor().record_duration(Duration::from_millis(4000), true);
        }
        assert_eq!(engine.policy().quality, 60);

        engine.on_visibility_hidden();
        assert_eq!(engine.policy().quality, 75);
    }

    #[tokio::test]
    async fn test_layout_overscan_override() {
        let engine = GalleryEngine::new(
            items(10),
            desktop(),
            Arc::new(StaticFetcher::ok(vec![1])),
            config().with_overscan(0),
        );
        let layout = engine.layout(1000.0);
        assert_eq!(layout.overscan, 0);
        assert_eq!(layout.item_height, 200.0);
        assert_eq!(layout.container_height, 600.0);
    }

    #[tokio::test]
    async fn test_on_scroll_preloads_beyond_window() {
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]));
        let engine = engine(40, desktop(), fetcher.clone());

        let window = engine.on_scroll(0.0, 1000.0);
        assert_eq!(window.start_index, 0);
        assert!(window.end_index < 39);

        for _ in 0..200 {
            if engine.scheduler().preloaded_count() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(engine.scheduler().preloaded_count(), 3);

        let next = &engine.items()[window.end_index + 1];
        assert!(engine.scheduler().is_preloaded(&engine.request_url(next)));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_repeated_scroll_does_not_refetch_in_flight() {
        let fetcher = Arc::new(StaticFetcher::ok(vec![1]).with_delay(Duration::from_millis(100)));
        let engine = engine(40, desktop(), fetcher.clone());

        for _ in 0..10 {
            engine.on_scroll(0.0, 1000.0);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for _ in 0..200 {
            if engine.scheduler().preloaded_count() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(engine.scheduler().preloaded_count(), 3);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_gallery() {
        let engine = engine(0, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        let window = engine.on_scroll(0.0, 800.0);
        assert!(window.is_empty());
        assert_eq!(window.total_height, 0.0);
    }

    #[tokio::test]
    async fn test_start_runs_critical_preload() {
        let engine = engine(10, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        let report = engine.start().unwrap().await.unwrap().unwrap();
        assert_eq!(report.requested, 6);
        assert_eq!(report.succeeded, 6);
    }

    #[tokio::test]
    async fn test_start_on_slow_mobile_is_skipped() {
        let signals = Arc::new(BrowserSignals::new(MOBILE_UA));
        let engine = engine(10, signals, Arc::new(StaticFetcher::ok(vec![1])));
        let report = engine.start().unwrap().await.unwrap().unwrap();
        assert_eq!(report.requested, 3);
        assert_eq!(report.submitted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_deferred_preload() {
        let engine = GalleryEngine::new(
            items(10),
            desktop(),
            Arc::new(StaticFetcher::ok(vec![1])),
            GalleryConfig::default(),
        );
        let handle = engine.start().unwrap();
        engine.shutdown();

        assert_eq!(handle.await.unwrap(), None);
        assert!(engine.is_shutdown());
        assert!(engine.start().is_none());
    }

    #[test]
    fn test_spawn_without_runtime() {
        let engine = engine(10, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        assert!(engine.start().is_none());
        assert_eq!(engine.on_scroll(0.0, 800.0).start_index, 0);
    }

    #[tokio::test]
    async fn test_activation_modes() {
        let engine = engine(2, desktop(), Arc::new(StaticFetcher::ok(vec![1])));
        let lazy_item = engine.items()[0].clone();
        let priority_item = lazy_item.clone().with_priority(true);

        let mut eager = engine.activation(&priority_item, Bounds::new(5000.0, 0.0, 100.0, 100.0));
        assert!(eager.visible().await);
        assert_eq!(engine.observer().pending(), 0);

        let mut lazy = engine.activation(&lazy_item, Bounds::new(1200.0, 0.0, 100.0, 100.0));
        assert_eq!(engine.observer().pending(), 1);
        assert_eq!(engine.update_viewport(Bounds::new(600.0, 0.0, 400.0, 800.0)), 1);
        assert!(lazy.visible().await);
    }

    #[tokio::test]
    async fn test_activation_without_visibility_support() {
        let engine = engine(1, Arc::new(NoopSignals), Arc::new(StaticFetcher::ok(vec![1])));
        let mut sub = engine.activation(&engine.items()[0], Bounds::new(9000.0, 0.0, 10.0, 10.0));
        assert!(sub.visible().await);
        assert_eq!(engine.observer().pending(), 0);
    }

    #[tokio::test]
    async fn test_placeholder_falls_back_and_caches() {
        let engine = engine(1, desktop(), Arc::new(StaticFetcher::failing()));
        let item = engine.items()[0].clone();
        assert!(engine.cached_placeholder(&item).is_none());

        let url = engine.placeholder(&item).await;
        assert!(url.starts_with(DATA_URL_PREFIX));
        assert_eq!(engine.cached_placeholder(&item), Some(url));
    }

    #[tokio::test]
    async fn test_load_records_to_monitor() {
        let engine = engine(1, desktop(), Arc::new(StaticFetcher::ok(vec![7, 7])));
        let image = engine.load(&engine.items()[0]).wait().await.unwrap();
        assert_eq!(image.bytes, vec![7, 7]);
        assert_eq!(engine.monitor().snapshot().total_loads, 1);
    }
}
