//! Hardware abstraction for the fingerprint terminal's sensor.
//!
//! The sensor is an optical module with its own matcher and template flash
//! (R305 class). This crate exposes it through the [`FingerprintSensor`]
//! trait as capture/convert/search primitives plus template administration,
//! and provides a programmable [`MockSensor`](mock::MockSensor) for
//! development and tests.
//!
//! # Design
//!
//! - **Async-first**: operations return `Send` futures so they can run on a
//!   spawned task while the terminal's poll loop keeps going.
//! - **Shared by reference**: all methods take `&self`; wrap the sensor in an
//!   `Arc` to hand it to several tasks.
//! - **Presence is synchronous**: [`FingerprintSensor::finger_present`]
//!   never waits, so the coordinator can call it on every poll.
//!
//! # Example
//!
//! ```no_run
//! use fpterm_hardware::traits::FingerprintSensor;
//! use fpterm_hardware::types::CharBuffer;
//! use fpterm_hardware::{HardwareError, Result};
//!
//! async fn identify<S: FingerprintSensor>(sensor: &S) -> Result<Option<u16>> {
//!     sensor.capture_image().await?;
//!     sensor.image_to_template(CharBuffer::One).await?;
//!     match sensor.fast_search().await {
//!         Ok(hit) => Ok(Some(hit.id.as_u16())),
//!         Err(HardwareError::NoMatch) => Ok(None),
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnySensor;
pub use error::{HardwareError, Result};
pub use traits::FingerprintSensor;
pub use types::{CharBuffer, DeviceInfo, SearchHit, SensorParameters};
