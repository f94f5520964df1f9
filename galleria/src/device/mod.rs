//! Device and network signal probing.
//!
//! Ambient platform queries (user agent, connection hints, device memory,
//! pixel density) sit behind the [`PlatformSignals`] capability trait so the
//! policy logic can be exercised without a live rendering environment.
//!
//! # Variants
//!
//! - [`BrowserSignals`]: values reported by a real rendering environment
//! - [`NoopSignals`]: no platform at all (tests, headless use)
//! - [`ServerSignals`]: server-side stub, optionally carrying a request user agent
//!
//! [`DeviceSignalProbe`] turns whichever signals are available into a
//! [`DeviceProfile`], substituting deterministic defaults for anything missing.

mod probe;
mod signals;

pub use probe::{DeviceProfile, DeviceSignalProbe, MAX_PIXEL_RATIO};
pub use signals::{BrowserSignals, ConnectionHint, NoopSignals, PlatformSignals, ServerSignals};
