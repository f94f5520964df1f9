//! Bounded-concurrency image loading.
//!
//! [`ConcurrentLoadQueue`] admits load tasks while fewer than
//! `max_concurrent` are in flight and holds the rest in a backlog ordered
//! priority-first, then FIFO. Each completion frees a slot and admits the
//! next backlog entry.
//!
//! ```text
//! enqueue ──► in_flight < max? ──yes──► Loading ──► fetch ──► Done / Failed
//!                   │                                           │
//!                   no                                          ▼
//!                   └──► Backlog (priority, then FIFO) ◄── slot freed, admit next
//! ```
//!
//! Fetching goes through the [`ImageFetcher`] trait so the queue can be
//! driven by mocks in tests. Outcomes are reported to the caller through
//! the [`LoadHandle`] and to the [`PerformanceMonitor`](crate::monitor::PerformanceMonitor).
//! Loads are never retried and never time out.

mod backlog;
mod error;
mod fetcher;
mod queue;
mod task;

pub use error::LoadError;
pub use fetcher::{BoxFuture, HttpImageFetcher, ImageFetcher};
pub use queue::{ConcurrentLoadQueue, QueueStats};
pub use task::{LoadHandle, LoadState, LoadTask, LoadedImage};

#[cfg(test)]
pub(crate) use fetcher::testing;
