//! Galleria - adaptive image delivery for virtualized photo galleries
//!
//! This library decides, per device and network condition, what quality and
//! size of image to fetch, how many images may load at once, which items of a
//! scrolling grid are currently relevant, and how to degrade gracefully when
//! the device is slow or memory-constrained.
//!
//! # Architecture
//!
//! ```text
//! PlatformSignals ──► DeviceSignalProbe ──► QualitySelector ◄── PerformanceMonitor
//!                                                │                      ▲
//! VirtualWindowCalculator ──► PreloadScheduler ──┴──► ConcurrentLoadQueue
//!
//! BlurPlaceholderCache (queried independently by the rendering layer)
//! ```
//!
//! [`engine::GalleryEngine`] wires every component together for the
//! rendering layer; each component can also be used on its own.

pub mod config;
pub mod device;
pub mod engine;
pub mod item;
pub mod loader;
pub mod logging;
pub mod monitor;
pub mod placeholder;
pub mod policy;
pub mod preload;
pub mod visibility;
pub mod window;

pub use engine::{GalleryConfig, GalleryEngine};
pub use item::ImageItem;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
