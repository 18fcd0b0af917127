//! Shared building blocks for the fingerprint terminal: errors, timing
//! constants, the wrapping millisecond clock, identifiers and configuration.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, Millis, MonotonicClock};
pub use config::{ScanTrigger, TerminalConfig};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
