//! Single-slot scan request with expiry.
//!
//! Producers (HTTP handler, console) call [`ScanRequestGate::request`] and
//! [`ScanRequestGate::cancel`]; the coordinator calls
//! [`ScanRequestGate::is_live`] on every poll. The whole request is one
//! `AtomicU64`, so a reader never observes a half-written expiry.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use fpterm_core::ManualClock;
//! use fpterm_terminal::ScanRequestGate;
//!
//! let clock = ManualClock::new(0);
//! let gate = ScanRequestGate::new(Arc::new(clock.clone()));
//!
//! gate.request(1_000);
//! assert!(gate.is_live());
//!
//! clock.advance(1_000);
//! assert!(!gate.is_live());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fpterm_core::constants::MAX_SCAN_REQUEST_MS;
use fpterm_core::{Clock, Millis};

const TAG_SHIFT: u32 = 32;
const TAG_NONE: u64 = 0;
const TAG_FOREVER: u64 = 1 << TAG_SHIFT;
const TAG_UNTIL: u64 = 2 << TAG_SHIFT;
const VALUE_MASK: u64 = u32::MAX as u64;

/// Decoded view of the outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRequest {
    None,
    /// Requested with no expiry; only `cancel` clears it.
    Forever,
    Until(Millis),
}

impl ScanRequest {
    fn encode(self) -> u64 {
        match self {
            ScanRequest::None => TAG_NONE,
            ScanRequest::Forever => TAG_FOREVER,
            ScanRequest::Until(at) => TAG_UNTIL | u64::from(at.as_u32()),
        }
    }

    fn decode(raw: u64) -> Self {
        match raw & !VALUE_MASK {
            TAG_FOREVER => ScanRequest::Forever,
            TAG_UNTIL => ScanRequest::Until(Millis::new((raw & VALUE_MASK) as u32)),
            _ => ScanRequest::None,
        }
    }
}

/// Last-write-wins holder of the "please scan" request.
pub struct ScanRequestGate {
    clock: Arc<dyn Clock>,
    slot: AtomicU64,
}

impl ScanRequestGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: AtomicU64::new(TAG_NONE),
        }
    }

    /// Request scanning for `timeout_ms`; `0` means until cancelled.
    ///
    /// Replaces whatever request was outstanding. Timeouts beyond
    /// [`MAX_SCAN_REQUEST_MS`] are clamped to it.
    pub fn request(&self, timeout_ms: u32) {
        let request = if timeout_ms == 0 {
            ScanRequest::Forever
        } else {
            let timeout_ms = timeout_ms.min(MAX_SCAN_REQUEST_MS);
            ScanRequest::Until(self.clock.now().add(timeout_ms))
        };
        self.slot.store(request.encode(), Ordering::Release);
        tracing::debug!(?request, "Scan requested");
    }

    /// Clear the request unconditionally.
    pub fn cancel(&self) {
        let previous = self.slot.swap(TAG_NONE, Ordering::AcqRel);
        if previous != TAG_NONE {
            tracing::debug!("Scan request cancelled");
        }
    }

    /// Whether a request is outstanding and unexpired.
    ///
    /// An expired request is cleared as a side effect. The clear only
    /// succeeds if nobody replaced the request in the meantime, so a fresh
    /// `request` racing with expiry is never lost.
    pub fn is_live(&self) -> bool {
        let raw = self.slot.load(Ordering::Acquire);
        match ScanRequest::decode(raw) {
            ScanRequest::None => false,
            ScanRequest::Forever => true,
            ScanRequest::Until(at) => {
                if !self.clock.now().has_reached(at) {
                    return true;
                }
                if self
                    .slot
                    .compare_exchange(raw, TAG_NONE, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    tracing::debug!(expired_at = %at, "Scan request expired");
                }
                false
            }
        }
    }

    /// Current request without evaluating expiry.
    pub fn snapshot(&self) -> ScanRequest {
        ScanRequest::decode(self.slot.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for ScanRequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanRequestGate")
            .field("request", &self.snapshot())
            .finish()
    }
}
