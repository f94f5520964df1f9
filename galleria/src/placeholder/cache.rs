//! Bounded, coalescing placeholder cache.
//!
//! Entries live in a `moka::sync::Cache` bounded by entry count, so lookups
//! stay synchronous for the rendering layer. Concurrent generations of the
//! same key share a single `OnceCell` so the fetch, decode and encode work
//! runs once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use moka::sync::Cache;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::raster::{downsample, encode_data_url, fallback_data_url};
use super::PlaceholderError;
use crate::loader::ImageFetcher;

/// Default placeholder width in pixels.
pub const DEFAULT_WIDTH: u32 = 8;

/// Default placeholder height in pixels.
pub const DEFAULT_HEIGHT: u32 = 12;

/// Default placeholder JPEG quality.
pub const DEFAULT_QUALITY: u8 = 10;

/// Default maximum number of cached placeholders.
pub const DEFAULT_MAX_ENTRIES: u64 = 512;

/// Identity of a placeholder: the same source at different sizes or
/// qualities produces different entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderKey {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl PlaceholderKey {
    pub fn new(url: impl Into<String>, width: u32, height: u32, quality: u8) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            quality,
        }
    }
}

impl std::fmt::Display for PlaceholderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}_{}", self.url, self.width, self.height, self.quality)
    }
}

/// Where a cached placeholder came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaceholderOrigin {
    /// Down-sampled from the source image.
    Generated,
    /// Synthetic gradient substituted after a failure.
    Fallback,
}

/// A cached placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderEntry {
    pub key: PlaceholderKey,
    /// `data:image/jpeg;base64,...` URL.
    pub data_url: Arc<str>,
    pub origin: PlaceholderOrigin,
}

/// Placeholder cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderConfig {
    /// Maximum cached entries; least recently used entries are evicted first.
    pub max_entries: u64,
    /// Default width for [`BlurPlaceholderCache::generate_default`].
    pub width: u32,
    /// Default height for [`BlurPlaceholderCache::generate_default`].
    pub height: u32,
    /// Default JPEG quality for [`BlurPlaceholderCache::generate_default`].
    pub quality: u8,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl PlaceholderConfig {
    /// Set the entry bound.
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the default placeholder size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the default placeholder quality.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaceholderStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    /// Number of times generation work actually ran.
    pub generations: u64,
    pub fallbacks: u64,
}

/// Memoized blur placeholder generator.
pub struct BlurPlaceholderCache {
    fetcher: Arc<dyn ImageFetcher>,
    config: PlaceholderConfig,
    entries: Cache<PlaceholderKey, PlaceholderEntry>,
    in_flight: DashMap<PlaceholderKey, Arc<OnceCell<PlaceholderEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    generations: AtomicU64,
    fallbacks: AtomicU64,
}

impl BlurPlaceholderCache {
    /// Create an empty cache that fetches sources through `fetcher`.
    pub fn new(fetcher: Arc<dyn ImageFetcher>, config: PlaceholderConfig) -> Self {
        let entries = Cache::builder().max_capacity(config.max_entries).build();

        Self {
            fetcher,
            config,
            entries,
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generations: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> PlaceholderConfig {
        self.config
    }

    /// Cache-only lookup. Never triggers generation.
    pub fn get(&self, key: &PlaceholderKey) -> Option<PlaceholderEntry> {
        self.entries.get(key)
    }

    /// Placeholder for `url` at the given size and quality.
    ///
    /// Returns a cached entry when present. Otherwise fetches, decodes,
    /// down-samples and encodes the source; on any failure a gradient is
    /// cached and returned instead.
    pub async fn generate(&self, url: &str, width: u32, height: u32, quality: u8) -> String {
        let key = PlaceholderKey::new(url, width, height, quality);
        self.generate_entry(key).await.data_url.to_string()
    }

    /// Placeholder for `url` at the configured default size and quality.
    pub async fn generate_default(&self, url: &str) -> String {
        self.generate(url, self.config.width, self.config.height, self.config.quality)
            .await
    }

    /// Full cache entry for `key`, generating it if needed.
    pub async fn generate_entry(&self, key: PlaceholderKey) -> PlaceholderEntry {
        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let entry = cell
            .get_or_init(|| async {
                // A generation may have finished between the lookup and here
                if let Some(entry) = self.entries.get(&key) {
                    return entry;
                }
                let entry = self.build(&key).await;
                self.entries.insert(key.clone(), entry.clone());
                entry
            })
            .await
            .clone();

        self.in_flight.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        entry
    }

    /// Generate default-size placeholders for many sources at once.
    ///
    /// Every URL gets an entry, generated or fallback.
    pub async fn pregenerate(&self, urls: &[String]) -> HashMap<String, String> {
        let results = join_all(urls.iter().map(|url| async move {
            let data_url = self.generate_default(url).await;
            (url.clone(), data_url)
        }))
        .await;

        debug!(count = results.len(), "Pregenerated blur placeholders");
        results.into_iter().collect()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of cached entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache counters.
    pub fn stats(&self) -> PlaceholderStats {
        PlaceholderStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            generations: self.generations.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    async fn build(&self, key: &PlaceholderKey) -> PlaceholderEntry {
        self.generations.fetch_add(1, Ordering::Relaxed);

        match self.render(key).await {
            Ok(data_url) => PlaceholderEntry {
                key: key.clone(),
                data_url: data_url.into(),
                origin: PlaceholderOrigin::Generated,
            },
            Err(e) => {
                warn!(
                    url = %key.url,
                    width = key.width,
                    height = key.height,
                    error = %e,
                    "Blur placeholder generation failed, using gradient"
                );
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                PlaceholderEntry {
                    key: key.clone(),
                    data_url: fallback_data_url(key.width, key.height).into(),
                    origin: PlaceholderOrigin::Fallback,
                }
            }
        }
    }

    async fn render(&self, key: &PlaceholderKey) -> Result<String, PlaceholderError> {
        let (width, height, quality) = (key.width, key.height, key.quality);
        if width == 0 || height == 0 {
            return Err(PlaceholderError::InvalidDimensions { width, height });
        }

        let bytes = self.fetcher.fetch(&key.url).await?;

        // Decoding and encoding are CPU-bound
        tokio::task::spawn_blocking(move || {
            let image = downsample(&bytes, width, height)?;
            encode_data_url(&image, quality)
        })
        .await
        .map_err(|e| PlaceholderError::Worker(e.to_string()))?
    }
}

impl std::fmt::Debug for BlurPlaceholderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlurPlaceholderCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
