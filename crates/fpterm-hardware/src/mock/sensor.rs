//! Mock fingerprint sensor for testing and development.
//!
//! A finger is modelled as an opaque pattern plus the confidence the sensor
//! would report for it. Enrolled templates map slots to patterns, so a search
//! succeeds when the captured pattern was stored earlier.

use crate::{
    HardwareError, Result,
    traits::FingerprintSensor,
    types::{CharBuffer, DeviceInfo, SearchHit, SensorParameters},
};
use fpterm_core::TemplateId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Default number of template slots, as on the R305.
const DEFAULT_CAPACITY: u16 = 1000;

/// A finger placed on the mock sensor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finger {
    /// Identity of the finger; equal patterns are the same finger.
    pub pattern: u32,

    /// Confidence reported when this finger matches a stored template.
    pub confidence: u16,
}

impl Finger {
    pub fn new(pattern: u32, confidence: u16) -> Self {
        Self {
            pattern,
            confidence,
        }
    }
}

#[derive(Debug)]
struct MockState {
    finger: Option<Finger>,
    lift_after_capture: bool,
    image: Option<Finger>,
    buffers: [Option<Finger>; 2],
    model: Option<u32>,
    templates: BTreeMap<TemplateId, u32>,
    fail_next_conversion: bool,
    connected: bool,
    capture_delay: Duration,
    capacity: u16,
}

impl MockState {
    fn new(capacity: u16) -> Self {
        Self {
            finger: None,
            lift_after_capture: false,
            image: None,
            buffers: [None, None],
            model: None,
            templates: BTreeMap::new(),
            fail_next_conversion: false,
            connected: true,
            capture_delay: Duration::ZERO,
            capacity,
        }
    }

    fn ensure_connected(&self, name: &str) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(HardwareError::disconnected(name))
        }
    }
}

/// Mock fingerprint sensor for testing and development.
///
/// # Examples
///
/// ```
/// use fpterm_core::TemplateId;
/// use fpterm_hardware::mock::MockSensor;
/// use fpterm_hardware::traits::FingerprintSensor;
/// use fpterm_hardware::types::CharBuffer;
///
/// #[tokio::main]
/// async fn main() -> fpterm_hardware::Result<()> {
///     let (sensor, handle) = MockSensor::new();
///     let id = TemplateId::new(7).unwrap();
///
///     handle.add_template(id, 0xBEEF);
///     handle.place_finger(0xBEEF, 95);
///
///     sensor.capture_image().await?;
///     sensor.image_to_template(CharBuffer::One).await?;
///     let hit = sensor.fast_search().await?;
///     assert_eq!(hit.id, id);
///     assert_eq!(hit.confidence, 95);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    state: Arc<Mutex<MockState>>,

    /// Device name
    name: String,
}

impl MockSensor {
    /// Create a new mock sensor with the default name.
    ///
    /// Returns a tuple of (MockSensor, MockSensorHandle) where the handle
    /// can be used to place fingers and manage the template database.
    pub fn new() -> (Self, MockSensorHandle) {
        Self::with_name("Mock Fingerprint Sensor".to_string())
    }

    /// Create a new mock sensor with a custom name.
    pub fn with_name(name: String) -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(MockState::new(DEFAULT_CAPACITY)));

        let sensor = Self {
            state: Arc::clone(&state),
            name: name.clone(),
        };

        let handle = MockSensorHandle { state, name };

        (sensor, handle)
    }

    fn lock_connected(&self) -> Result<parking_lot::MutexGuard<'_, MockState>> {
        let state = self.state.lock();
        state.ensure_connected(&self.name)?;
        Ok(state)
    }
}

impl FingerprintSensor for MockSensor {
    fn finger_present(&self) -> bool {
        let state = self.state.lock();
        state.connected && state.finger.is_some()
    }

    async fn capture_image(&self) -> Result<()> {
        let delay = self.lock_connected()?.capture_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock_connected()?;
        let finger = state.finger.ok_or(HardwareError::NoFinger)?;
        state.image = Some(finger);
        if state.lift_after_capture {
            state.finger = None;
            state.lift_after_capture = false;
        }
        trace!(pattern = finger.pattern, "mock image captured");
        Ok(())
    }

    async fn image_to_template(&self, buffer: CharBuffer) -> Result<()> {
        let mut state = self.lock_connected()?;
        if state.fail_next_conversion {
            state.fail_next_conversion = false;
            return Err(HardwareError::image_conversion("feature_fail"));
        }
        let image = state
            .image
            .ok_or_else(|| HardwareError::image_conversion("invalid_image"))?;
        state.buffers[usize::from(buffer.as_u8() - 1)] = Some(image);
        Ok(())
    }

    async fn fast_search(&self) -> Result<SearchHit> {
        let state = self.lock_connected()?;
        let probe = state.buffers[0].ok_or(HardwareError::NoMatch)?;
        state
            .templates
            .iter()
            .find(|(_, pattern)| **pattern == probe.pattern)
            .map(|(id, _)| SearchHit {
                id: *id,
                confidence: probe.confidence,
            })
            .ok_or(HardwareError::NoMatch)
    }

    async fn create_model(&self) -> Result<()> {
        let mut state = self.lock_connected()?;
        match state.buffers {
            [Some(a), Some(b)] if a.pattern == b.pattern => {
                state.model = Some(a.pattern);
                Ok(())
            }
            _ => Err(HardwareError::EnrollMismatch),
        }
    }

    async fn store_model(&self, id: TemplateId) -> Result<()> {
        let mut state = self.lock_connected()?;
        if id.as_u16() >= state.capacity {
            return Err(HardwareError::store_failed("bad_location"));
        }
        let model = state
            .model
            .take()
            .ok_or_else(|| HardwareError::store_failed("no model"))?;
        state.templates.insert(id, model);
        Ok(())
    }

    async fn delete_model(&self, id: TemplateId) -> Result<()> {
        let mut state = self.lock_connected()?;
        state
            .templates
            .remove(&id)
            .map(|_| ())
            .ok_or(HardwareError::EmptySlot { id })
    }

    async fn template_count(&self) -> Result<u16> {
        let state = self.lock_connected()?;
        Ok(u16::try_from(state.templates.len()).unwrap_or(u16::MAX))
    }

    async fn empty_database(&self) -> Result<()> {
        self.lock_connected()?.templates.clear();
        Ok(())
    }

    async fn parameters(&self) -> Result<SensorParameters> {
        let state = self.lock_connected()?;
        Ok(SensorParameters {
            capacity: state.capacity,
            security_level: 3,
            system_id: 0,
            baud_rate: 57_600,
            packet_len: 32,
        })
    }

    async fn device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Fingerprint Sensor v1.0")
            .with_firmware_version("1.0.0"))
    }
}

/// Handle for controlling a mock sensor.
///
/// Clones share the sensor's state.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<Mutex<MockState>>,

    /// Device name
    name: String,
}

impl MockSensorHandle {
    /// Put a finger on the window until [`lift_finger`](Self::lift_finger).
    pub fn place_finger(&self, pattern: u32, confidence: u16) {
        let mut state = self.state.lock();
        state.finger = Some(Finger::new(pattern, confidence));
        state.lift_after_capture = false;
    }

    /// Put a finger on the window and lift it once an image was taken.
    pub fn tap_finger(&self, pattern: u32, confidence: u16) {
        let mut state = self.state.lock();
        state.finger = Some(Finger::new(pattern, confidence));
        state.lift_after_capture = true;
    }

    /// Place the finger enrolled in `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::EmptySlot`] if nothing is enrolled there.
    pub fn tap_enrolled(&self, id: TemplateId, confidence: u16) -> Result<()> {
        let pattern = self
            .state
            .lock()
            .templates
            .get(&id)
            .copied()
            .ok_or(HardwareError::EmptySlot { id })?;
        self.tap_finger(pattern, confidence);
        Ok(())
    }

    /// Remove the finger from the window.
    pub fn lift_finger(&self) {
        let mut state = self.state.lock();
        state.finger = None;
        state.lift_after_capture = false;
    }

    pub fn finger_present(&self) -> bool {
        self.state.lock().finger.is_some()
    }

    /// Store a template directly, bypassing enrollment.
    pub fn add_template(&self, id: TemplateId, pattern: u32) {
        self.state.lock().templates.insert(id, pattern);
    }

    /// Get the pattern stored in a slot.
    pub fn get_template(&self, id: TemplateId) -> Option<u32> {
        self.state.lock().templates.get(&id).copied()
    }

    /// Get the number of templates in the database.
    pub fn template_count(&self) -> usize {
        self.state.lock().templates.len()
    }

    /// Delay every image capture, simulating a slow sensor link.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.state.lock().capture_delay = delay;
    }

    /// Make the next image conversion fail.
    pub fn fail_next_conversion(&self) {
        self.state.lock().fail_next_conversion = true;
    }

    /// Simulate unplugging or replugging the sensor.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
