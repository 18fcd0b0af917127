//! Wrapping millisecond clock.
//!
//! All terminal timers are absolute instants on a 32-bit millisecond counter
//! that wraps roughly every 49.7 days. Instants are compared by signed
//! difference, so a deadline armed just before the wrap still fires just after
//! it.
//!
//! # Examples
//!
//! ```
//! use fpterm_core::clock::{Clock, ManualClock, Millis};
//!
//! let clock = ManualClock::new(u32::MAX - 10);
//! let deadline = clock.now().add(100);
//!
//! clock.advance(50);
//! assert!(!clock.now().has_reached(deadline));
//!
//! clock.advance(50);
//! assert!(clock.now().has_reached(deadline));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// An instant on the wrapping millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Millis(u32);

impl Millis {
    /// Create an instant from a raw counter value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The instant `ms` milliseconds after this one, wrapping.
    #[must_use]
    pub const fn add(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }

    /// Whether this instant is at or after `deadline`.
    ///
    /// Valid as long as the two instants are less than 2^31 ms apart.
    pub const fn has_reached(self, deadline: Millis) -> bool {
        (self.0.wrapping_sub(deadline.0) as i32) >= 0
    }

    /// Milliseconds elapsed from `earlier` to this instant.
    pub const fn since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// The later of two instants.
    #[must_use]
    pub const fn later(self, other: Millis) -> Millis {
        if self.has_reached(other) { self } else { other }
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Millis {
        (**self).now()
    }
}

/// Clock backed by [`Instant`], starting at zero when created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        // Truncation is the wrap.
        Millis((self.origin.elapsed().as_millis() & u128::from(u32::MAX)) as u32)
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same counter, so a test can keep one copy and hand the
/// other to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start)),
        }
    }

    /// Jump to an absolute counter value.
    pub fn set(&self, raw: u32) {
        self.now.store(raw, Ordering::SeqCst);
    }

    /// Move forward by `ms`, wrapping.
    pub fn advance(&self, ms: u32) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.wrapping_add(ms))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.now.load(Ordering::SeqCst))
    }
}
