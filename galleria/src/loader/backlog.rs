//! Priority backlog for loads waiting on a free slot.
//!
//! Entries are ordered by priority (priority tasks first), then by enqueue
//! order (FIFO within the same priority level).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use tokio::sync::oneshot;

use super::task::{LoadResult, LoadTask, SharedState};

/// A load waiting for admission, plus everything needed to report back.
pub(crate) struct PendingLoad {
    pub task: LoadTask,
    pub state: SharedState,
    pub tx: oneshot::Sender<LoadResult>,
    pub enqueued_at: Instant,
}

impl PendingLoad {
    pub fn new(task: LoadTask, state: SharedState, tx: oneshot::Sender<LoadResult>) -> Self {
        Self {
            task,
            state,
            tx,
            enqueued_at: Instant::now(),
        }
    }
}

struct BacklogEntry {
    load: PendingLoad,
    sequence: u64,
}

// Ordering for BinaryHeap: priority first, then lower sequence (older) first
impl PartialEq for BacklogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.load.task.priority == other.load.task.priority && self.sequence == other.sequence
    }
}

impl Eq for BacklogEntry {}

impl PartialOrd for BacklogEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BacklogEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.load.task.priority.cmp(&other.load.task.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

/// Loads waiting for a slot.
///
/// Not thread-safe; the queue wraps it in its state mutex.
#[derive(Default)]
pub(crate) struct Backlog {
    heap: BinaryHeap<BacklogEntry>,
    next_sequence: u64,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, load: PendingLoad) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(BacklogEntry { load, sequence });
    }

    /// Remove the next load to admit.
    pub fn pop(&mut self) -> Option<PendingLoad> {
        self.heap.pop().map(|entry| entry.load)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Remove every waiting load, in no particular order.
    pub fn drain(&mut self) -> Vec<PendingLoad> {
        self.heap.drain().map(|entry| entry.load).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadState;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn pending(url: &str, priority: bool) -> PendingLoad {
        let (tx, _rx) = oneshot::channel();
        let task = LoadTask {
            url: url.to_string(),
            priority,
        };
        PendingLoad::new(task, Arc::new(Mutex::new(LoadState::Queued)), tx)
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut backlog = Backlog::new();
        backlog.push(pending("a", false));
        backlog.push(pending("b", false));
        backlog.push(pending("c", false));

        let order: Vec<String> = std::iter::from_fn(|| backlog.pop()).map(|l| l.task.url).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_priority_jumps_ahead() {
        let mut backlog = Backlog::new();
        backlog.push(pending("a", false));
        backlog.push(pending("b", false));
        backlog.push(pending("p1", true));
        backlog.push(pending("p2", true));

        let order: Vec<String> = std::iter::from_fn(|| backlog.pop()).map(|l| l.task.url).collect();
        assert_eq!(order, vec!["p1", "p2", "a", "b"]);
    }

    #[test]
    fn test_drain_empties() {
        let mut backlog = Backlog::new();
        backlog.push(pending("a", false));
        backlog.push(pending("b", true));

        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog.drain().len(), 2);
        assert_eq!(backlog.len(), 0);
        assert!(backlog.pop().is_none());
    }
}
