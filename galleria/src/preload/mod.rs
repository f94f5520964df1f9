//! Critical and look-ahead preloading.
//!
//! [`PreloadScheduler`] decides which images to request ahead of need and
//! submits them to the [`ConcurrentLoadQueue`](crate::loader::ConcurrentLoadQueue):
//!
//! - **Critical**: shortly after startup, the first few priority images at
//!   reduced quality, jumping the queue.
//! - **Ahead**: the items just past the current position at normal quality,
//!   so scrolling finds them already loaded.
//!
//! Both honour the connection-aware [`PreloadMode`] and never surface
//! individual failures.

mod mode;
mod scheduler;

pub use mode::PreloadMode;
pub use scheduler::{PreloadConfig, PreloadReport, PreloadScheduler};
