//! Handles shared by the HTTP routes and the console.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use fpterm_core::TemplateId;
use fpterm_hardware::{AnySensor, FingerprintSensor, HardwareError};
use fpterm_storage::NameDirectory;
use fpterm_terminal::{Enroller, FpEvent, NotificationQueue, ScanRequestGate, ScanState};

use crate::sse::EventHub;

/// Everything a command needs to act on the terminal.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<ScanRequestGate>,
    pub queue: Arc<NotificationQueue>,
    pub hub: EventHub,
    pub sensor: Arc<AnySensor>,
    pub enroller: Arc<Enroller<AnySensor>>,
    pub names: Arc<NameDirectory>,
    pub scan_state: watch::Receiver<ScanState>,
    /// Request window opened by a scan command.
    pub scan_timeout_ms: u32,
    /// SSE keep-alive interval.
    pub keep_alive: Duration,
}

impl AppState {
    pub fn current_state(&self) -> ScanState {
        *self.scan_state.borrow()
    }

    /// Same path for every entry point.
    pub fn request_scan(&self) {
        fpterm_terminal::request_scan(&self.gate, &self.queue, self.scan_timeout_ms);
    }

    /// Delete a template and its name, publishing an erase result.
    ///
    /// Returns `Ok(false)` when the slot was already empty.
    pub async fn delete_template(&self, id: TemplateId) -> Result<bool, HardwareError> {
        let outcome = match self.sensor.delete_model(id).await {
            Ok(()) => Ok(true),
            Err(HardwareError::EmptySlot { .. }) => Ok(false),
            Err(e) => Err(e),
        };

        let deleted = matches!(outcome, Ok(true));
        if deleted {
            if let Err(e) = self.names.remove(id).await {
                warn!(%id, error = %e, "Failed to remove subject name");
            }
            info!(%id, "Template deleted");
        }
        self.queue.emit(&FpEvent::erase_result(id, deleted));
        outcome
    }

    /// Wipe every template and every stored name.
    pub async fn empty_database(&self) -> Result<(), HardwareError> {
        self.sensor.empty_database().await?;
        if let Err(e) = self.names.clear().await {
            warn!(error = %e, "Failed to clear subject names");
        }
        info!("Template database emptied");
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("scan_timeout_ms", &self.scan_timeout_ms)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}
