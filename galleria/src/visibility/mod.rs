//! One-shot visibility subscriptions.
//!
//! The rendering layer reports element bounds with [`VisibilityObserver::observe`]
//! and feeds viewport changes through [`VisibilityObserver::update_viewport`].
//! Each subscription fires at most once, when enough of the element enters
//! the viewport expanded by the root margin, and is then forgotten.
//!
//! Subscriptions can be cancelled at any time (for example when the element
//! unmounts). Dropping a subscription also unregisters it.
//!
//! When the platform cannot observe visibility at all, callers use
//! [`VisibilitySubscription::immediate`] so loading starts eagerly.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default share of the element that must be visible.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Default margin around the viewport, in pixels.
pub const DEFAULT_ROOT_MARGIN: f64 = 50.0;

/// An axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Create a rectangle.
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Rectangle area.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.top - margin,
            self.left - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Area shared with `other`, 0 when they do not overlap.
    pub fn intersection_area(&self, other: &Bounds) -> f64 {
        let width = self.right().min(other.right()) - self.left.max(other.left);
        let height = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        width * height
    }

    fn touches(&self, other: &Bounds) -> bool {
        self.left <= other.right()
            && other.left <= self.right()
            && self.top <= other.bottom()
            && other.top <= self.bottom()
    }
}

/// Observer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    /// Share of the element area that must intersect, in `[0, 1]`.
    pub threshold: f64,
    /// Pixels added around the viewport before testing intersection.
    pub root_margin: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            root_margin: DEFAULT_ROOT_MARGIN,
        }
    }
}

impl ObserverOptions {
    /// Set the intersection threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the root margin.
    pub fn with_root_margin(mut self, margin: f64) -> Self {
        self.root_margin = margin;
        self
    }

    fn is_visible(&self, target: &Bounds, viewport: &Bounds) -> bool {
        let root = viewport.expand(self.root_margin);
        let area = target.area();
        if area <= 0.0 {
            return root.touches(target);
        }
        let ratio = target.intersection_area(&root) / area;
        ratio > 0.0 && ratio >= self.threshold
    }
}

struct Target {
    bounds: Bounds,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    targets: HashMap<u64, Target>,
}

/// Tracks pending visibility subscriptions.
pub struct VisibilityObserver {
    options: ObserverOptions,
    registry: Arc<Mutex<Registry>>,
}

impl Default for VisibilityObserver {
    fn default() -> Self {
        Self::new(ObserverOptions::default())
    }
}

impl VisibilityObserver {
    /// Create an observer with the given options.
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            options,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Observer options.
    pub fn options(&self) -> ObserverOptions {
        self.options
    }

    /// Watch `bounds` until it becomes visible.
    pub fn observe(&self, bounds: Bounds) -> VisibilitySubscription {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.targets.insert(id, Target { bounds, tx });
            id
        };

        VisibilitySubscription {
            id: Some(id),
            registry: Arc::downgrade(&self.registry),
            rx: Some(rx),
            token: CancellationToken::new(),
            outcome: None,
        }
    }

    /// Report the current viewport and fire every subscription now visible.
    ///
    /// Returns how many subscriptions fired.
    pub fn update_viewport(&self, viewport: Bounds) -> usize {
        let fired: Vec<Target> = {
            let mut registry = self.registry.lock();
            let ids: Vec<u64> = registry
                .targets
                .iter()
                .filter(|(_, target)| self.options.is_visible(&target.bounds, &viewport))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| registry.targets.remove(id)).collect()
        };

        let count = fired.len();
        for target in fired {
            // Receiver may already be gone if the subscription was dropped
            let _ = target.tx.send(());
        }

        if count > 0 {
            trace!(fired = count, pending = self.pending(), "Visibility subscriptions fired");
        }
        count
    }

    /// Number of subscriptions still waiting.
    pub fn pending(&self) -> usize {
        self.registry.lock().targets.len()
    }

    /// Drop every pending subscription without firing it.
    pub fn disconnect(&self) {
        self.registry.lock().targets.clear();
    }
}

impl std::fmt::Debug for VisibilityObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityObserver")
            .field("options", &self.options)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Handle to a single pending visibility notification.
#[derive(Debug)]
pub struct VisibilitySubscription {
    id: Option<u64>,
    registry: Weak<Mutex<Registry>>,
    rx: Option<oneshot::Receiver<()>>,
    token: CancellationToken,
    outcome: Option<bool>,
}

impl VisibilitySubscription {
    /// A subscription that is already visible.
    ///
    /// Used for priority items and platforms without visibility support.
    pub fn immediate() -> Self {
        Self {
            id: None,
            registry: Weak::new(),
            rx: None,
            token: CancellationToken::new(),
            outcome: Some(true),
        }
    }

    /// Wait until the element becomes visible.
    ///
    /// Returns `false` if the subscription was cancelled or the observer
    /// disconnected before the element became visible.
    pub async fn visible(&mut self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };

        let outcome = tokio::select! {
            biased;

            _ = self.token.cancelled() => false,
            result = rx => result.is_ok(),
        };

        if !self.token.is_cancelled() {
            self.outcome = Some(outcome);
            self.rx = None;
        }
        outcome
    }

    /// Stop waiting. Any pending or future [`visible`](Self::visible) call returns `false`.
    pub fn cancel(&self) {
        self.token.cancel();
        self.unregister();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token that cancels this subscription from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    fn unregister(&self) {
        let (Some(id), Some(registry)) = (self.id, self.registry.upgrade()) else {
            return;
        };
        registry.lock().targets.remove(&id);
    }
}

impl Drop for VisibilitySubscription {
    fn drop(&mut self) {
        self.unregister();
    }
}
