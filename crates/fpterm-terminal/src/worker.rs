//! Background capture-and-match attempts.
//!
//! [`MatchWorker`] runs one attempt per launch on its own Tokio task:
//! capture an image, convert it into feature buffer one, and search the
//! sensor's database. Whatever goes wrong is classified, logged and folded
//! into a failed [`MatchOutcome`]; the coordinator only ever sees the
//! outcome published through the job.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use fpterm_core::constants::{CAPTURE_POLL_MS, CAPTURE_TIMEOUT_MS};
use fpterm_hardware::{CharBuffer, FingerprintSensor, HardwareError, SearchHit};

use crate::job::{JobWriter, MatchOutcome};
use crate::lease::SensorLease;

/// Why an attempt did not produce a hit.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("no usable image within {ms} ms")]
    CaptureTimeout { ms: u64 },

    #[error("image conversion failed: {0}")]
    ConversionFailure(#[source] HardwareError),

    #[error("no template matched")]
    NoMatch,

    #[error("sensor fault: {0}")]
    Sensor(#[from] HardwareError),
}

impl WorkerError {
    /// Whether this is a hardware problem rather than a bad read.
    pub fn is_fault(&self) -> bool {
        matches!(self, WorkerError::Sensor(_))
    }
}

/// Capture window and polling cadence for image acquisition.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(u64::from(CAPTURE_TIMEOUT_MS)),
            poll_interval: Duration::from_millis(CAPTURE_POLL_MS),
        }
    }
}

/// Poll the sensor until it yields an image or the window closes.
///
/// Empty-window and unreadable-image replies are retried; anything else is
/// returned as a sensor fault.
pub async fn capture_image<S: FingerprintSensor>(
    sensor: &S,
    settings: CaptureSettings,
) -> Result<(), WorkerError> {
    let deadline = Instant::now() + settings.timeout;
    loop {
        match sensor.capture_image().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_user_error() => {}
            Err(e) => return Err(WorkerError::Sensor(e)),
        }
        if Instant::now() + settings.poll_interval > deadline {
            return Err(WorkerError::CaptureTimeout {
                ms: settings.timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(settings.poll_interval).await;
    }
}

/// Convert the captured image into `buffer`.
pub async fn convert_image<S: FingerprintSensor>(
    sensor: &S,
    buffer: CharBuffer,
) -> Result<(), WorkerError> {
    sensor.image_to_template(buffer).await.map_err(|e| {
        if e.is_user_error() {
            WorkerError::ConversionFailure(e)
        } else {
            WorkerError::Sensor(e)
        }
    })
}

/// One full identification attempt.
pub async fn identify<S: FingerprintSensor>(
    sensor: &S,
    settings: CaptureSettings,
) -> Result<SearchHit, WorkerError> {
    capture_image(sensor, settings).await?;
    convert_image(sensor, CharBuffer::One).await?;
    match sensor.fast_search().await {
        Ok(hit) => Ok(hit),
        Err(HardwareError::NoMatch) => Err(WorkerError::NoMatch),
        Err(e) => Err(WorkerError::Sensor(e)),
    }
}

/// Starts match attempts on behalf of the coordinator.
///
/// `launch` must return immediately; the attempt runs elsewhere and reports
/// only through `writer`.
pub trait MatchLauncher: Send + Sync {
    fn launch(&self, writer: JobWriter, lease: SensorLease);
}

/// Runs attempts against a real (or mock) sensor on the Tokio runtime.
#[derive(Debug)]
pub struct MatchWorker<S> {
    sensor: Arc<S>,
    settings: CaptureSettings,
}

impl<S: FingerprintSensor + 'static> MatchWorker<S> {
    pub fn new(sensor: Arc<S>) -> Self {
        Self {
            sensor,
            settings: CaptureSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl<S: FingerprintSensor + 'static> MatchLauncher for MatchWorker<S> {
    fn launch(&self, writer: JobWriter, lease: SensorLease) {
        let sensor = Arc::clone(&self.sensor);
        let settings = self.settings;
        tokio::spawn(async move {
            let generation = writer.generation();
            let outcome = match identify(sensor.as_ref(), settings).await {
                Ok(hit) => {
                    debug!(generation, id = %hit.id, score = hit.confidence, "Template hit");
                    MatchOutcome::hit(hit.id, hit.confidence)
                }
                Err(e) if e.is_fault() => {
                    warn!(generation, error = %e, "Sensor fault during match");
                    MatchOutcome::failed()
                }
                Err(e) => {
                    debug!(generation, error = %e, "Match attempt unsuccessful");
                    MatchOutcome::failed()
                }
            };
            drop(lease);
            writer.publish(outcome);
        });
    }
}
