//! Timing and sizing constants for the fingerprint terminal.
//!
//! These values describe the physically-bounded human interaction at the
//! sensor: how long a scan may take, how long the animation must play before
//! a result is revealed, and how long a result stays on screen. They are the
//! defaults behind [`CoordinatorConfig`](crate::config::CoordinatorConfig)
//! and [`QueueConfig`](crate::config::QueueConfig).
//!
//! # Timeline of a successful scan
//!
//! ```text
//! request ──► finger ──► worker done ──► showResultAt ──► cooldown end
//!             │          (any time)      max(done, start+3900)   +1500ms
//!             └─ matchingDeadline = start + 15000
//! ```
//!
//! # Usage
//!
//! ```
//! use fpterm_core::constants::*;
//!
//! assert!(MIN_SCAN_MS < MATCHING_TIMEOUT_MS);
//! assert_eq!(QUEUE_CAPACITY, 16);
//! ```

// ============================================================================
// Match scoring
// ============================================================================

/// Minimum confidence a search hit must exceed to count as a successful match.
///
/// The comparison is strict: a score equal to the threshold is a failure.
pub const SCORE_MATCH_THRESHOLD: u16 = 90;

/// Highest template slot the sensor accepts (inclusive).
pub const MAX_TEMPLATE_ID: u16 = 999;

// ============================================================================
// Scan timing (milliseconds)
// ============================================================================

/// Overall matching deadline, measured from finger detection.
pub const MATCHING_TIMEOUT_MS: u32 = 15_000;

/// Minimum dwell of the scanning animation before a result may be shown.
pub const MIN_SCAN_MS: u32 = 3_900;

/// How long a result (success or failure) stays on screen.
pub const RESULT_MS: u32 = 1_500;

/// Fail-safe deadline after a result after which the coordinator forces idle.
pub const FORCED_RETURN_MS: u32 = 5_000;

/// Default lifetime of a scan request issued by the console or HTTP API.
pub const DEFAULT_SCAN_REQUEST_MS: u32 = 15_000;

/// Longest scan request the wrapping clock can represent.
pub const MAX_SCAN_REQUEST_MS: u32 = i32::MAX as u32;

/// Per-attempt ceiling the worker waits for a readable image.
pub const CAPTURE_TIMEOUT_MS: u32 = 15_000;

/// Interval between image polls inside the worker.
pub const CAPTURE_POLL_MS: u64 = 60;

/// Pause between the two captures of an enrollment.
pub const ENROLL_PAUSE_MS: u64 = 500;

// ============================================================================
// Animation
// ============================================================================

/// Cadence of the breathing fingerprint animation.
pub const PHASE_MS: u32 = 150;

/// Number of distinct fingerprint frames (ping-pong 0..=3).
pub const PHASE_COUNT: u8 = 4;

/// Cadence of the scan-bar overlay.
pub const SCANBAR_STEP_MS: u32 = 24;

/// Height of the scan bar in pixels, also its per-step displacement.
pub const SCANBAR_THICK: u8 = 4;

/// Side of the square fingerprint pane in pixels.
pub const FP_PANE_SIZE: u8 = 64;

// ============================================================================
// Notification queue
// ============================================================================

/// Number of events the notification queue retains.
pub const QUEUE_CAPACITY: usize = 16;

/// Maximum length of a serialized event payload, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Minimum interval between "transport unavailable" warnings.
pub const RATE_LIMIT_WARN_MS: u32 = 5_000;

// ============================================================================
// Host loop
// ============================================================================

/// Default period of the cooperative host loop.
pub const DEFAULT_TICK_MS: u64 = 10;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8080";

/// Default keep-alive interval of the event stream.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

/// Default SQLite database path.
pub const DEFAULT_DATABASE_PATH: &str = "fpterm.db";

/// Default size of the SQLite connection pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;

/// Default time a writer waits on a locked database.
pub const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dwell_fits_inside_deadline() {
        assert!(MIN_SCAN_MS < MATCHING_TIMEOUT_MS);
        assert!(RESULT_MS < FORCED_RETURN_MS);
    }

    #[test]
    fn test_scan_bar_fits_pane() {
        assert_eq!(FP_PANE_SIZE % SCANBAR_THICK, 0);
    }
}
