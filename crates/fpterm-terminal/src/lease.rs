//! Exclusive use of the sensor's image and feature buffers.
//!
//! A match attempt and an enrollment both drive the sensor through several
//! steps that share on-board buffers, so only one of them may run at a
//! time. Whoever holds a [`SensorLease`] owns the buffers until the lease
//! is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag guarding the sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorLock {
    busy: Arc<AtomicBool>,
}

impl SensorLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the sensor if nobody else holds it. Never waits.
    pub fn try_acquire(&self) -> Option<SensorLease> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SensorLease {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of exclusive sensor access; released on drop.
#[derive(Debug)]
pub struct SensorLease {
    busy: Arc<AtomicBool>,
}

impl Drop for SensorLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
