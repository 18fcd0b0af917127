//! Enum wrapper for sensor dispatch.
//!
//! Native `async fn` in traits (RPITIT) are not object-safe, so
//! `Box<dyn FingerprintSensor>` is not available. [`AnySensor`] provides
//! concrete dispatch instead, and is what the terminal shares between its
//! worker, enrollment task and admin API.
//!
//! # Examples
//!
//! ```
//! use fpterm_hardware::devices::AnySensor;
//! use fpterm_hardware::mock::MockSensor;
//! use fpterm_hardware::traits::FingerprintSensor;
//!
//! let (sensor, handle) = MockSensor::new();
//! let any_sensor = AnySensor::Mock(sensor);
//!
//! handle.place_finger(1, 90);
//! assert!(any_sensor.finger_present());
//! ```

use fpterm_core::TemplateId;

use crate::mock::MockSensor;
use crate::traits::FingerprintSensor;
use crate::types::{CharBuffer, DeviceInfo, SearchHit, SensorParameters};
use crate::Result;

/// Enum wrapper for fingerprint sensor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySensor {
    /// Mock sensor for development and testing.
    Mock(MockSensor),
    // TODO: Add an R305 serial driver behind the `hardware-serial` feature
}

impl FingerprintSensor for AnySensor {
    fn finger_present(&self) -> bool {
        match self {
            Self::Mock(device) => device.finger_present(),
        }
    }

    async fn capture_image(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.capture_image().await,
        }
    }

    async fn image_to_template(&self, buffer: CharBuffer) -> Result<()> {
        match self {
            Self::Mock(device) => device.image_to_template(buffer).await,
        }
    }

    async fn fast_search(&self) -> Result<SearchHit> {
        match self {
            Self::Mock(device) => device.fast_search().await,
        }
    }

    async fn create_model(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.create_model().await,
        }
    }

    async fn store_model(&self, id: TemplateId) -> Result<()> {
        match self {
            Self::Mock(device) => device.store_model(id).await,
        }
    }

    async fn delete_model(&self, id: TemplateId) -> Result<()> {
        match self {
            Self::Mock(device) => device.delete_model(id).await,
        }
    }

    async fn template_count(&self) -> Result<u16> {
        match self {
            Self::Mock(device) => device.template_count().await,
        }
    }

    async fn empty_database(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.empty_database().await,
        }
    }

    async fn parameters(&self) -> Result<SensorParameters> {
        match self {
            Self::Mock(device) => device.parameters().await,
        }
    }

    async fn device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.device_info().await,
        }
    }
}
