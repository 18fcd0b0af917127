//! Two-take template enrollment.
//!
//! An enrollment captures the same finger twice into the two feature
//! buffers, asks the sensor to merge them into a model, and stores the
//! model in the requested slot. It runs on its own task while holding the
//! sensor lease, so the coordinator cannot start a match meanwhile. Progress
//! goes to the coordinator (which owns the display) over a channel, and the
//! outcome is published as `enroll` events.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use fpterm_core::TemplateId;
use fpterm_core::constants::ENROLL_PAUSE_MS;
use fpterm_hardware::{CharBuffer, FingerprintSensor};

use crate::events::FpEvent;
use crate::lease::{SensorLease, SensorLock};
use crate::queue::NotificationQueue;
use crate::worker::{CaptureSettings, WorkerError, capture_image, convert_image};

/// Progress reports consumed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollProgress {
    /// Waiting for take 1 or 2.
    Step(u8),
    Finished { id: TemplateId, ok: bool },
    Aborted,
}

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("sensor busy")]
    Busy,

    #[error("enrollment already running")]
    AlreadyRunning,
}

/// Starts and aborts enrollments.
pub struct Enroller<S> {
    sensor: Arc<S>,
    lock: SensorLock,
    queue: Arc<NotificationQueue>,
    progress: mpsc::UnboundedSender<EnrollProgress>,
    settings: CaptureSettings,
    pause: Duration,
    task: Mutex<Option<AbortHandle>>,
}

impl<S: FingerprintSensor + 'static> Enroller<S> {
    pub fn new(
        sensor: Arc<S>,
        lock: SensorLock,
        queue: Arc<NotificationQueue>,
        progress: mpsc::UnboundedSender<EnrollProgress>,
    ) -> Self {
        Self {
            sensor,
            lock,
            queue,
            progress,
            settings: CaptureSettings::default(),
            pause: Duration::from_millis(ENROLL_PAUSE_MS),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Begin enrolling into `id`. Returns immediately.
    ///
    /// # Errors
    ///
    /// Fails if an enrollment is already running or a match holds the sensor.
    pub fn start(&self, id: TemplateId) -> Result<(), EnrollError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(EnrollError::AlreadyRunning);
        }
        let lease = self.lock.try_acquire().ok_or(EnrollError::Busy)?;

        info!(%id, "Enrollment started");
        self.queue.emit(&FpEvent::enroll_start(Some(id)));

        let run = EnrollRun {
            sensor: Arc::clone(&self.sensor),
            queue: Arc::clone(&self.queue),
            progress: self.progress.clone(),
            settings: self.settings,
            pause: self.pause,
        };
        let handle = tokio::spawn(run.execute(id, lease));
        *task = Some(handle.abort_handle());
        Ok(())
    }

    /// Cancel the running enrollment, if any.
    ///
    /// Returns whether something was aborted.
    pub fn abort(&self) -> bool {
        let Some(task) = self.task.lock().take() else {
            return false;
        };
        if task.is_finished() {
            return false;
        }
        task.abort();
        info!("Enrollment aborted");
        self.queue.emit(&FpEvent::enroll_abort());
        let _ = self.progress.send(EnrollProgress::Aborted);
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<S> std::fmt::Debug for Enroller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enroller")
            .field("settings", &self.settings)
            .field("pause", &self.pause)
            .finish_non_exhaustive()
    }
}

struct EnrollRun<S> {
    sensor: Arc<S>,
    queue: Arc<NotificationQueue>,
    progress: mpsc::UnboundedSender<EnrollProgress>,
    settings: CaptureSettings,
    pause: Duration,
}

impl<S: FingerprintSensor> EnrollRun<S> {
    async fn execute(self, id: TemplateId, lease: SensorLease) {
        let ok = match self.takes(id).await {
            Ok(()) => {
                info!(%id, "Template stored");
                true
            }
            Err(e) if e.is_fault() => {
                warn!(%id, error = %e, "Enrollment failed");
                false
            }
            Err(e) => {
                debug!(%id, error = %e, "Enrollment unsuccessful");
                false
            }
        };
        drop(lease);
        self.queue.emit(&FpEvent::enroll_result(ok, id));
        let _ = self.progress.send(EnrollProgress::Finished { id, ok });
    }

    async fn takes(&self, id: TemplateId) -> Result<(), WorkerError> {
        let sensor = self.sensor.as_ref();

        let _ = self.progress.send(EnrollProgress::Step(1));
        capture_image(sensor, self.settings).await?;
        convert_image(sensor, CharBuffer::One).await?;

        tokio::time::sleep(self.pause).await;

        let _ = self.progress.send(EnrollProgress::Step(2));
        capture_image(sensor, self.settings).await?;
        convert_image(sensor, CharBuffer::Two).await?;

        sensor.create_model().await?;
        sensor.store_model(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use fpterm_core::ManualClock;
    use fpterm_core::config::QueueConfig;
    use fpterm_hardware::mock::{MockSensor, MockSensorHandle};

    struct Fixture {
        enroller: Enroller<MockSensor>,
        handle: MockSensorHandle,
        lock: SensorLock,
        queue: Arc<NotificationQueue>,
        rx: mpsc::UnboundedReceiver<EnrollProgress>,
    }

    fn fixture() -> Fixture {
        let (sensor, handle) = MockSensor::new();
        let lock = SensorLock::new();
        let queue = Arc::new(NotificationQueue::new(
            &QueueConfig::default(),
            Arc::new(ManualClock::new(0)),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let enroller = Enroller::new(Arc::new(sensor), lock.clone(), Arc::clone(&queue), tx);
        Fixture {
            enroller,
            handle,
            lock,
            queue,
            rx,
        }
    }

    async fn finished(rx: &mut mpsc::UnboundedReceiver<EnrollProgress>) -> Vec<EnrollProgress> {
        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p);
            if matches!(p, EnrollProgress::Finished { .. } | EnrollProgress::Aborted) {
                break;
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_enroll_stores_template() {
        let mut fx = fixture();
        let id = TemplateId::new(12).unwrap();
        fx.handle.place_finger(0x55, 97);

        fx.enroller.start(id).unwrap();
        assert!(fx.lock.is_busy());

        let progress = finished(&mut fx.rx).await;
        assert_eq!(
            progress,
            vec![
                EnrollProgress::Step(1),
                EnrollProgress::Step(2),
                EnrollProgress::Finished { id, ok: true },
            ]
        );
        assert_eq!(fx.handle.get_template(id), Some(0x55));
        assert!(!fx.lock.is_busy());

        let kinds: Vec<_> = fx.queue.snapshot().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::EnrollStart, EventKind::EnrollResult]);
        assert_eq!(
            fx.queue.snapshot()[1].payload,
            r#"{"event":"enroll","stage":"result","ok":true,"id":12}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enroll_without_finger_fails() {
        let mut fx = fixture();
        let id = TemplateId::new(1).unwrap();

        fx.enroller.start(id).unwrap();
        let progress = finished(&mut fx.rx).await;

        assert_eq!(
            progress.last(),
            Some(&EnrollProgress::Finished { id, ok: false })
        );
        assert_eq!(fx.handle.template_count(), 0);
        assert!(!fx.lock.is_busy());
    }

    #[tokio::test]
    async fn test_enroll_rejected_while_sensor_busy() {
        let fx = fixture();
        let _lease = fx.lock.try_acquire().unwrap();

        let result = fx.enroller.start(TemplateId::new(1).unwrap());
        assert!(matches!(result, Err(EnrollError::Busy)));
        assert!(fx.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_releases_sensor() {
        let mut fx = fixture();
        fx.enroller.start(TemplateId::new(2).unwrap()).unwrap();
        assert_eq!(fx.rx.recv().await, Some(EnrollProgress::Step(1)));

        assert!(fx.enroller.abort());
        assert_eq!(fx.rx.recv().await, Some(EnrollProgress::Aborted));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!fx.lock.is_busy());
        assert!(!fx.enroller.is_running());
        assert!(!fx.enroller.abort());
    }
}
