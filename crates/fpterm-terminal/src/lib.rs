//! Scan coordination core of the fingerprint terminal.
//!
//! - [`ScanRequestGate`]: last-write-wins "please scan" request with expiry
//! - [`JobSlot`] / [`JobWriter`]: generation-tagged result handoff
//! - [`MatchWorker`]: one capture-and-search attempt per launch, on its own task
//! - [`NotificationQueue`]: bounded drop-oldest event ring and its [`Transport`]
//! - [`ScanCoordinator`]: the non-blocking scan state machine
//! - [`Enroller`]: two-take enrollment that shares the sensor lease
//! - [`display`]: the rendering contract and a virtual OLED
//!
//! The host loop owns the coordinator and calls
//! [`ScanCoordinator::poll`] and [`NotificationQueue::drain_and_deliver`]
//! on every tick; everything that may wait runs on spawned tasks.

pub mod coordinator;
pub mod display;
pub mod enroll;
pub mod events;
pub mod gate;
pub mod job;
pub mod lease;
pub mod queue;
pub mod worker;

pub use coordinator::{
    FingerProbe, ScanCoordinator, ScanCoordinatorBuilder, ScanState, StateTransition, Timers,
};
pub use display::{Display, Screen, VirtualDisplay};
pub use enroll::{EnrollError, EnrollProgress, Enroller};
pub use events::{EventKind, FpEvent, PROMPT_MESSAGE};
pub use gate::{ScanRequest, ScanRequestGate};
pub use job::{JobSlot, JobWriter, MatchOutcome};
pub use lease::{SensorLease, SensorLock};
pub use queue::{NotificationQueue, PendingEvent, Transport, TransportError};
pub use worker::{CaptureSettings, MatchLauncher, MatchWorker, WorkerError};

/// Ask for a scan the way every entry point does: announce the prompt, then
/// open the request window.
///
/// `timeout_ms == 0` keeps the request open until cancelled.
pub fn request_scan(gate: &ScanRequestGate, queue: &NotificationQueue, timeout_ms: u32) {
    queue.emit(&FpEvent::prompt());
    gate.request(timeout_ms);
}
