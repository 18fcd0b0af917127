//! Fingerprint sensor trait definition.
//!
//! The sensor is exposed as the primitive operations an optical module such
//! as the R305 offers over its serial link: grab an image, convert it into a
//! feature buffer, search the on-board template database, and manage that
//! database. Matching itself happens inside the module.
//!
//! Methods take `&self` so a single sensor can be shared (behind an `Arc`)
//! by the match worker, the enrollment task and the admin API. Every future
//! is `Send` so callers can hand operations to `tokio::spawn`.

use std::future::Future;

use fpterm_core::TemplateId;

use crate::error::Result;
use crate::types::{CharBuffer, DeviceInfo, SearchHit, SensorParameters};

/// Fingerprint sensor with an on-board template database.
///
/// **NOTE**: This trait is NOT object-safe because its methods return
/// `impl Future`. Use generics, or [`AnySensor`](crate::devices::AnySensor)
/// for runtime selection.
///
/// # Examples
///
/// ```no_run
/// use fpterm_hardware::traits::FingerprintSensor;
/// use fpterm_hardware::types::{CharBuffer, SearchHit};
/// use fpterm_hardware::Result;
///
/// async fn identify<S: FingerprintSensor>(sensor: &S) -> Result<SearchHit> {
///     sensor.capture_image().await?;
///     sensor.image_to_template(CharBuffer::One).await?;
///     sensor.fast_search().await
/// }
/// ```
pub trait FingerprintSensor: Send + Sync {
    /// Non-blocking presence probe.
    ///
    /// Must return immediately; it is called from the coordinator's poll
    /// step. Implementations answer from a touch line or a cached reading.
    fn finger_present(&self) -> bool;

    /// Acquire one image into the image buffer.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoFinger`](crate::HardwareError::NoFinger)
    /// when the window is empty. Callers poll until they get an image or
    /// their own deadline passes.
    fn capture_image(&self) -> impl Future<Output = Result<()>> + Send;

    /// Convert the last captured image into a feature template.
    fn image_to_template(&self, buffer: CharBuffer) -> impl Future<Output = Result<()>> + Send;

    /// Search the database for the template in [`CharBuffer::One`].
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoMatch`](crate::HardwareError::NoMatch) if
    /// nothing matches.
    fn fast_search(&self) -> impl Future<Output = Result<SearchHit>> + Send;

    /// Combine both feature buffers into a model.
    fn create_model(&self) -> impl Future<Output = Result<()>> + Send;

    /// Persist the model into the given slot.
    fn store_model(&self, id: TemplateId) -> impl Future<Output = Result<()>> + Send;

    /// Delete the template in the given slot.
    fn delete_model(&self, id: TemplateId) -> impl Future<Output = Result<()>> + Send;

    /// Number of stored templates.
    fn template_count(&self) -> impl Future<Output = Result<u16>> + Send;

    /// Delete every stored template.
    fn empty_database(&self) -> impl Future<Output = Result<()>> + Send;

    /// Read the sensor's system parameters.
    fn parameters(&self) -> impl Future<Output = Result<SensorParameters>> + Send;

    /// Get device information.
    fn device_info(&self) -> impl Future<Output = Result<DeviceInfo>> + Send;
}
