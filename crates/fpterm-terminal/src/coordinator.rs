//! Scan coordinator state machine.
//!
//! The coordinator drives the visible scan lifecycle from a cooperative
//! host loop: every call to [`ScanCoordinator::poll`] reads the clock,
//! compares it against absolute deadlines, and returns without waiting.
//! Capture and matching run elsewhere (see [`MatchLauncher`]); their outcome
//! comes back through the coordinator's [`JobSlot`].
//!
//! # States
//!
//! - `WaitFinger`: idle or prompting; arms a match when a finger shows up
//! - `Matching`: animation running, waiting for the job or the deadline
//! - `Cooldown`: result on screen, nothing else is processed
//!
//! # Valid Transitions
//!
//! - WaitFinger → Matching → Cooldown → WaitFinger
//! - any state → WaitFinger (forced return)
//!
//! # Examples
//!
//! ```
//! use fpterm_terminal::ScanState;
//!
//! assert!(ScanState::WaitFinger.can_transition_to(&ScanState::Matching));
//! assert!(!ScanState::WaitFinger.can_transition_to(&ScanState::Cooldown));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use fpterm_core::config::CoordinatorConfig;
use fpterm_core::constants::{FP_PANE_SIZE, PHASE_COUNT};
use fpterm_core::{Clock, Error, Millis, NameLookup, Result, ScanTrigger, TemplateId};
use fpterm_hardware::FingerprintSensor;

use crate::display::Display;
use crate::enroll::EnrollProgress;
use crate::events::FpEvent;
use crate::gate::ScanRequestGate;
use crate::job::{JobSlot, MatchOutcome};
use crate::lease::SensorLock;
use crate::queue::NotificationQueue;
use crate::worker::MatchLauncher;

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

const MSG_NO_MATCH: &str = "Sin coincidencia";
const MSG_TIMEOUT: &str = "Tiempo agotado";
const MSG_ENROLLED: &str = "Huella guardada";
const MSG_ENROLL_FAILED: &str = "Enrolamiento fallido";
const MSG_ENROLL_ABORTED: &str = "Cancelado";

/// Phases of the scan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Idle or prompting, waiting for a finger.
    WaitFinger,

    /// A match attempt is in flight.
    Matching,

    /// Showing a result; time-gated.
    Cooldown,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ScanState::WaitFinger => "WaitFinger",
            ScanState::Matching => "Matching",
            ScanState::Cooldown => "Cooldown",
        };
        write!(f, "{}", state_str)
    }
}

impl ScanState {
    /// Check if the regular flow allows moving to `target`.
    ///
    /// The forced return to `WaitFinger` bypasses this check.
    pub fn can_transition_to(&self, target: &ScanState) -> bool {
        matches!(
            (self, target),
            (ScanState::WaitFinger, ScanState::Matching)
                | (ScanState::Matching, ScanState::Cooldown)
                | (ScanState::Cooldown, ScanState::WaitFinger)
        )
    }

    /// Lowercase name used by the status API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::WaitFinger => "wait_finger",
            ScanState::Matching => "matching",
            ScanState::Cooldown => "cooldown",
        }
    }
}

/// A single state change with the clock reading at which it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ScanState,
    pub to: ScanState,
    pub at: Millis,
}

/// Non-blocking finger presence check.
pub trait FingerProbe: Send + Sync {
    fn finger_present(&self) -> bool;
}

impl<S: FingerprintSensor> FingerProbe for S {
    fn finger_present(&self) -> bool {
        FingerprintSensor::finger_present(self)
    }
}

/// Absolute deadlines of the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timers {
    pub scan_start: Millis,
    pub matching_deadline: Millis,
    pub show_result_at: Option<Millis>,
    pub cooldown_until: Millis,
    pub forced_return_at: Option<Millis>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Animation {
    phase: u8,
    phase_rising: bool,
    next_phase_at: Millis,
    bar_y: u8,
    bar_rising: bool,
    next_bar_at: Millis,
}

impl Animation {
    fn restart(&mut self, now: Millis) {
        *self = Animation {
            phase: 0,
            phase_rising: true,
            next_phase_at: now,
            bar_y: 0,
            bar_rising: true,
            next_bar_at: now,
        };
    }
}

/// Advance a value bouncing between 0 and `max`.
fn ping_pong(value: u8, rising: &mut bool, max: u8) -> u8 {
    if max == 0 {
        return 0;
    }
    if value >= max {
        *rising = false;
    } else if value == 0 {
        *rising = true;
    }
    if *rising {
        value.saturating_add(1).min(max)
    } else {
        value.saturating_sub(1)
    }
}

struct NoNames;

impl NameLookup for NoNames {
    fn name_for(&self, _id: TemplateId) -> Option<String> {
        None
    }
}

/// The scan state machine.
///
/// Owned by the host loop; [`poll`](Self::poll) must be called frequently
/// (every few milliseconds). Other tasks observe it through
/// [`subscribe`](Self::subscribe).
pub struct ScanCoordinator {
    state: ScanState,
    history: VecDeque<StateTransition>,
    config: CoordinatorConfig,

    clock: Arc<dyn Clock>,
    gate: Arc<ScanRequestGate>,
    queue: Arc<NotificationQueue>,
    display: Box<dyn Display>,
    launcher: Arc<dyn MatchLauncher>,
    names: Arc<dyn NameLookup>,
    probe: Arc<dyn FingerProbe>,
    lock: SensorLock,
    enroll_progress: Option<mpsc::UnboundedReceiver<EnrollProgress>>,
    state_tx: watch::Sender<ScanState>,

    job: JobSlot,
    timers: Timers,
    animation: Animation,
    pending: Option<MatchOutcome>,

    idle_drawn: bool,
    prompt_drawn: bool,
    enrolling: bool,
    notice_until: Option<Millis>,
}

impl ScanCoordinator {
    /// Create a builder; clock, gate, queue, display, launcher and probe
    /// are required.
    pub fn builder() -> ScanCoordinatorBuilder {
        ScanCoordinatorBuilder::default()
    }

    pub fn current_state(&self) -> ScanState {
        self.state
    }

    /// Watch channel that follows every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Generation of the most recent match launch.
    pub fn generation(&self) -> u64 {
        self.job.generation()
    }

    /// Whether a launched job has not been consumed or abandoned.
    pub fn job_active(&self) -> bool {
        self.job.is_active()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N state transitions.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .copied()
            .collect()
    }

    /// Run one non-blocking step of the state machine.
    pub fn poll(&mut self) {
        let now = self.clock.now();

        if let Some(at) = self.timers.forced_return_at
            && now.has_reached(at)
        {
            self.force_return(now);
            return;
        }

        match self.state {
            ScanState::WaitFinger => self.poll_wait_finger(now),
            ScanState::Matching => self.poll_matching(now),
            ScanState::Cooldown => self.poll_cooldown(now),
        }
    }

    fn poll_wait_finger(&mut self, now: Millis) {
        self.drain_enroll_progress(now);
        if self.enrolling {
            return;
        }
        if let Some(until) = self.notice_until {
            if !now.has_reached(until) {
                return;
            }
            self.notice_until = None;
            self.idle_drawn = false;
            self.prompt_drawn = false;
        }

        let requested = self.gate.is_live();
        if requested {
            if !self.prompt_drawn {
                self.display.prompt();
                self.prompt_drawn = true;
                self.idle_drawn = false;
            }
        } else if !self.idle_drawn {
            self.display.idle();
            self.idle_drawn = true;
            self.prompt_drawn = false;
        }

        let armed = requested || self.config.trigger == ScanTrigger::Always;
        if armed && self.probe.finger_present() {
            self.start_matching(now);
        }
    }

    fn start_matching(&mut self, now: Millis) {
        let Some(lease) = self.lock.try_acquire() else {
            trace!("Finger present but sensor is busy");
            return;
        };

        self.job.abandon();
        let writer = match self.job.launch() {
            Ok(writer) => writer,
            Err(e) => {
                error!(error = %e, "Refusing to launch match");
                return;
            }
        };

        self.timers.scan_start = now;
        self.timers.matching_deadline = now.add(self.config.matching_timeout_ms);
        self.timers.show_result_at = None;
        self.timers.forced_return_at = None;
        self.pending = None;

        self.display.scanning();
        self.animation.restart(now);
        self.display.draw_fp_phase(0);
        self.animation.next_phase_at = now.add(self.config.phase_ms);

        if let Err(e) = self.transition_to(ScanState::Matching, now) {
            error!(error = %e, "Unexpected transition failure");
            self.job.abandon();
            return;
        }
        info!(
            generation = writer.generation(),
            deadline = %self.timers.matching_deadline,
            "Finger detected, matching"
        );
        self.launcher.launch(writer, lease);
        self.idle_drawn = false;
        self.prompt_drawn = false;
    }

    fn poll_matching(&mut self, now: Millis) {
        self.animate(now);

        if let Some(outcome) = self.pending {
            if self
                .timers
                .show_result_at
                .is_none_or(|at| now.has_reached(at))
            {
                self.show_result(now, outcome);
            }
            return;
        }

        if now.has_reached(self.timers.matching_deadline) {
            self.time_out(now);
            return;
        }

        if let Some(outcome) = self.job.take_result() {
            let show_at = now.later(self.timers.scan_start.add(self.config.min_scan_ms));
            debug!(
                matched = outcome.matched,
                score = outcome.score,
                show_at = %show_at,
                "Match result ready"
            );
            self.pending = Some(outcome);
            self.timers.show_result_at = Some(show_at);
            if now.has_reached(show_at) {
                self.show_result(now, outcome);
            }
        }
    }

    fn animate(&mut self, now: Millis) {
        let anim = &mut self.animation;
        if now.has_reached(anim.next_phase_at) {
            anim.phase = ping_pong(anim.phase, &mut anim.phase_rising, PHASE_COUNT - 1);
            anim.next_phase_at = now.add(self.config.phase_ms);
            self.display.draw_fp_phase(anim.phase);
        }
        if now.has_reached(anim.next_bar_at) {
            let max = FP_PANE_SIZE.saturating_sub(self.config.scanbar_thick);
            anim.bar_y = ping_pong(anim.bar_y, &mut anim.bar_rising, max);
            anim.next_bar_at = now.add(self.config.scanbar_step_ms);
            self.display.draw_fp_phase(anim.phase);
            self.display.draw_scan_bar(anim.bar_y);
        }
    }

    fn show_result(&mut self, now: Millis, outcome: MatchOutcome) {
        let accepted = outcome.is_accepted(self.config.score_threshold);
        let subject = outcome.subject.filter(|_| accepted);

        match subject {
            Some(id) => {
                let name = self.names.name_for(id);
                info!(
                    %id,
                    score = outcome.score,
                    name = name.as_deref().unwrap_or("-"),
                    "Access granted"
                );
                self.display.welcome(name.as_deref(), id, outcome.score);
            }
            None => {
                info!(score = outcome.score, "No match");
                self.display.error_msg(MSG_NO_MATCH);
            }
        }

        let id = subject.map_or(-1, |id| i32::from(id.as_u16()));
        self.queue
            .emit(&FpEvent::result(accepted, id, outcome.score));
        self.gate.cancel();
        self.pending = None;
        self.enter_cooldown(now);
    }

    fn time_out(&mut self, now: Millis) {
        warn!(generation = self.job.generation(), "Matching deadline reached");
        self.display.error_msg(MSG_TIMEOUT);
        self.job.abandon();
        self.queue.emit(&FpEvent::result(false, -1, 0));
        self.enter_cooldown(now);
    }

    fn enter_cooldown(&mut self, now: Millis) {
        self.timers.cooldown_until = now.add(self.config.result_ms);
        self.timers.forced_return_at = Some(now.add(self.config.forced_return_ms));
        self.timers.show_result_at = None;
        if let Err(e) = self.transition_to(ScanState::Cooldown, now) {
            error!(error = %e, "Unexpected transition failure");
        }
    }

    fn poll_cooldown(&mut self, now: Millis) {
        if !now.has_reached(self.timers.cooldown_until) {
            return;
        }
        // Clears an expired request; a live one survives until the forced return.
        if !self.gate.is_live() {
            self.timers.forced_return_at = None;
        }
        if let Err(e) = self.transition_to(ScanState::WaitFinger, now) {
            error!(error = %e, "Unexpected transition failure");
        }
        self.reset_screen();
    }

    fn force_return(&mut self, now: Millis) {
        debug!(state = %self.state, "Forced return to idle");
        self.timers.forced_return_at = None;
        self.gate.cancel();
        self.job.abandon();
        self.pending = None;
        if self.state != ScanState::WaitFinger {
            let transition = StateTransition {
                from: self.state,
                to: ScanState::WaitFinger,
                at: now,
            };
            self.perform_state_change(transition);
        }
        self.reset_screen();
    }

    fn reset_screen(&mut self) {
        self.animation = Animation::default();
        self.display.idle();
        self.idle_drawn = true;
        self.prompt_drawn = false;
    }

    fn drain_enroll_progress(&mut self, now: Millis) {
        let Some(rx) = self.enroll_progress.as_mut() else {
            return;
        };
        while let Ok(progress) = rx.try_recv() {
            match progress {
                EnrollProgress::Step(step) => {
                    self.enrolling = true;
                    self.display.enroll_step(step);
                }
                EnrollProgress::Finished { ok, .. } => {
                    self.enrolling = false;
                    if ok {
                        self.display.ok_msg(MSG_ENROLLED);
                    } else {
                        self.display.error_msg(MSG_ENROLL_FAILED);
                    }
                    self.notice_until = Some(now.add(self.config.result_ms));
                }
                EnrollProgress::Aborted => {
                    self.enrolling = false;
                    self.display.error_msg(MSG_ENROLL_ABORTED);
                    self.notice_until = Some(now.add(self.config.result_ms));
                }
            }
            self.idle_drawn = false;
            self.prompt_drawn = false;
        }
    }

    /// Move to `new_state`, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the regular flow does not
    /// allow it.
    pub fn transition_to(&mut self, new_state: ScanState, now: Millis) -> Result<StateTransition> {
        if !self.state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }
        let transition = StateTransition {
            from: self.state,
            to: new_state,
            at: now,
        };
        self.perform_state_change(transition);
        Ok(transition)
    }

    fn perform_state_change(&mut self, transition: StateTransition) {
        debug!(
            from = %transition.from,
            to = %transition.to,
            at = %transition.at,
            "State transition"
        );
        self.state = transition.to;
        self.state_tx.send_replace(transition.to);

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("state", &self.state)
            .field("generation", &self.job.generation())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ScanCoordinator`].
#[derive(Default)]
pub struct ScanCoordinatorBuilder {
    config: CoordinatorConfig,
    clock: Option<Arc<dyn Clock>>,
    gate: Option<Arc<ScanRequestGate>>,
    queue: Option<Arc<NotificationQueue>>,
    display: Option<Box<dyn Display>>,
    launcher: Option<Arc<dyn MatchLauncher>>,
    names: Option<Arc<dyn NameLookup>>,
    probe: Option<Arc<dyn FingerProbe>>,
    lock: Option<SensorLock>,
    enroll_progress: Option<mpsc::UnboundedReceiver<EnrollProgress>>,
}

impl ScanCoordinatorBuilder {
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_gate(mut self, gate: Arc<ScanRequestGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_queue(mut self, queue: Arc<NotificationQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn MatchLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_names(mut self, names: Arc<dyn NameLookup>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn FingerProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share the lock that enrollment uses.
    pub fn with_sensor_lock(mut self, lock: SensorLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_enroll_progress(mut self, rx: mpsc::UnboundedReceiver<EnrollProgress>) -> Self {
        self.enroll_progress = Some(rx);
        self
    }

    /// Build the coordinator in `WaitFinger`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a required collaborator is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<ScanCoordinator> {
        self.config.validate()?;
        let missing = |what: &str| Error::Config(format!("scan coordinator needs a {what}"));
        let (state_tx, _) = watch::channel(ScanState::WaitFinger);

        Ok(ScanCoordinator {
            state: ScanState::WaitFinger,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            config: self.config,
            clock: self.clock.ok_or_else(|| missing("clock"))?,
            gate: self.gate.ok_or_else(|| missing("request gate"))?,
            queue: self.queue.ok_or_else(|| missing("notification queue"))?,
            display: self.display.ok_or_else(|| missing("display"))?,
            launcher: self.launcher.ok_or_else(|| missing("match launcher"))?,
            names: self.names.unwrap_or_else(|| Arc::new(NoNames)),
            probe: self.probe.ok_or_else(|| missing("finger probe"))?,
            lock: self.lock.unwrap_or_default(),
            enroll_progress: self.enroll_progress,
            state_tx,
            job: JobSlot::new(),
            timers: Timers::default(),
            animation: Animation::default(),
            pending: None,
            idle_drawn: false,
            prompt_drawn: false,
            enrolling: false,
            notice_until: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobWriter;
    use crate::lease::SensorLease;
    use fpterm_core::ManualClock;
    use fpterm_core::config::QueueConfig;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<String>>>);

    impl Recording {
        fn screens(&self) -> Vec<String> {
            self.0
                .lock()
                .iter()
                .filter(|s| !s.starts_with("phase:") && !s.starts_with("bar:"))
                .cloned()
                .collect()
        }

        fn last_screen(&self) -> Option<String> {
            self.screens().pop()
        }

        fn values(&self, prefix: &str) -> Vec<u8> {
            let mut out: Vec<u8> = self
                .0
                .lock()
                .iter()
                .filter_map(|s| s.strip_prefix(prefix))
                .map(|v| v.parse().unwrap())
                .collect();
            out.dedup();
            out
        }
    }

    impl Display for Recording {
        fn idle(&mut self) {
            self.0.lock().push("idle".into());
        }
        fn prompt(&mut self) {
            self.0.lock().push("prompt".into());
        }
        fn scanning(&mut self) {
            self.0.lock().push("scanning".into());
        }
        fn draw_fp_phase(&mut self, phase: u8) {
            self.0.lock().push(format!("phase:{phase}"));
        }
        fn draw_scan_bar(&mut self, y: u8) {
            self.0.lock().push(format!("bar:{y}"));
        }
        fn welcome(&mut self, name: Option<&str>, id: TemplateId, score: u16) {
            self.0
                .lock()
                .push(format!("welcome:{}:{id}:{score}", name.unwrap_or("-")));
        }
        fn error_msg(&mut self, msg: &str) {
            self.0.lock().push(format!("error:{msg}"));
        }
        fn ok_msg(&mut self, msg: &str) {
            self.0.lock().push(format!("ok:{msg}"));
        }
        fn enroll_step(&mut self, step: u8) {
            self.0.lock().push(format!("enroll:{step}"));
        }
    }

    #[derive(Default)]
    struct Launcher {
        jobs: Mutex<Vec<(JobWriter, SensorLease)>>,
        launches: Mutex<usize>,
    }

    impl Launcher {
        fn publish(&self, outcome: MatchOutcome) {
            let (writer, lease) = self.jobs.lock().remove(0);
            drop(lease);
            writer.publish(outcome);
        }
    }

    impl MatchLauncher for Launcher {
        fn launch(&self, writer: JobWriter, lease: SensorLease) {
            *self.launches.lock() += 1;
            self.jobs.lock().push((writer, lease));
        }
    }

    #[derive(Default)]
    struct Probe(AtomicBool);

    impl FingerProbe for Probe {
        fn finger_present(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct Names(HashMap<TemplateId, String>);

    impl NameLookup for Names {
        fn name_for(&self, id: TemplateId) -> Option<String> {
            self.0.get(&id).cloned()
        }
    }

    struct Harness {
        coordinator: ScanCoordinator,
        clock: ManualClock,
        gate: Arc<ScanRequestGate>,
        queue: Arc<NotificationQueue>,
        display: Recording,
        launcher: Arc<Launcher>,
        probe: Arc<Probe>,
        lock: SensorLock,
    }

    impl Harness {
        fn at(&mut self, t: u32) {
            self.clock.set(t);
            self.coordinator.poll();
        }

        fn finger(&self, present: bool) {
            self.probe.0.store(present, Ordering::SeqCst);
        }

        fn payloads(&self) -> Vec<String> {
            self.queue.snapshot().into_iter().map(|e| e.payload).collect()
        }
    }

    fn harness(config: CoordinatorConfig) -> Harness {
        harness_with(config, None)
    }

    fn harness_with(
        config: CoordinatorConfig,
        progress: Option<mpsc::UnboundedReceiver<EnrollProgress>>,
    ) -> Harness {
        let clock = ManualClock::new(0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let gate = Arc::new(ScanRequestGate::new(Arc::clone(&shared)));
        let queue = Arc::new(NotificationQueue::new(
            &QueueConfig::default(),
            Arc::clone(&shared),
        ));
        let display = Recording::default();
        let launcher = Arc::new(Launcher::default());
        let probe = Arc::new(Probe::default());
        let lock = SensorLock::new();
        let names = Names(HashMap::from([(TemplateId::new(7).unwrap(), "Ana".to_string())]));

        let mut builder = ScanCoordinator::builder()
            .with_config(config)
            .with_clock(shared)
            .with_gate(Arc::clone(&gate))
            .with_queue(Arc::clone(&queue))
            .with_display(Box::new(display.clone()))
            .with_launcher(launcher.clone())
            .with_names(Arc::new(names))
            .with_probe(probe.clone())
            .with_sensor_lock(lock.clone());
        if let Some(rx) = progress {
            builder = builder.with_enroll_progress(rx);
        }

        Harness {
            coordinator: builder.build().unwrap(),
            clock,
            gate,
            queue,
            display,
            launcher,
            probe,
            lock,
        }
    }

    fn id(raw: u16) -> TemplateId {
        TemplateId::new(raw).unwrap()
    }

    #[test]
    fn test_transition_rules() {
        use ScanState::*;
        assert!(WaitFinger.can_transition_to(&Matching));
        assert!(Matching.can_transition_to(&Cooldown));
        assert!(Cooldown.can_transition_to(&WaitFinger));
        assert!(!Matching.can_transition_to(&WaitFinger));
        assert!(!Cooldown.can_transition_to(&Matching));
        assert!(!WaitFinger.can_transition_to(&WaitFinger));
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = ScanCoordinator::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_successful_scan_scenario() {
        let mut h = harness(CoordinatorConfig::default());
        let mut states = h.coordinator.subscribe();

        h.gate.request(15_000);
        h.at(0);
        assert_eq!(h.display.screens(), vec!["prompt"]);

        h.finger(true);
        h.at(2_000);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert_eq!(h.coordinator.timers().matching_deadline, Millis::new(17_000));
        assert_eq!(*states.borrow_and_update(), ScanState::Matching);
        assert_eq!(h.display.last_screen().as_deref(), Some("scanning"));

        // Dwell runs from finger detection: 2000 + 3900.
        h.clock.set(3_000);
        h.launcher.publish(MatchOutcome::hit(id(7), 95));
        h.coordinator.poll();
        assert_eq!(h.coordinator.timers().show_result_at, Some(Millis::new(5_900)));
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);

        h.at(5_899);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert!(h.payloads().is_empty());

        h.at(6_000);
        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);
        assert_eq!(h.display.last_screen().as_deref(), Some("welcome:Ana:7:95"));
        assert_eq!(
            h.payloads(),
            vec![r#"{"event":"result","ok":true,"id":7,"score":95}"#]
        );
        assert!(!h.gate.is_live());

        h.at(7_499);
        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);
        h.at(7_500);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        assert_eq!(h.display.last_screen().as_deref(), Some("idle"));
        assert_eq!(*h.launcher.launches.lock(), 1);
    }

    #[test]
    fn test_result_after_dwell_is_shown_immediately() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);

        h.clock.set(5_000);
        h.launcher.publish(MatchOutcome::hit(id(8), 99));
        h.coordinator.poll();

        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);
        assert_eq!(h.display.last_screen().as_deref(), Some("welcome:-:8:99"));
    }

    #[test]
    fn test_hard_timeout_without_result() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(15_000);
        h.at(0);
        h.finger(true);
        h.at(2_000);

        h.at(16_999);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);

        h.at(17_000);
        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);
        assert_eq!(h.display.last_screen().as_deref(), Some("error:Tiempo agotado"));
        assert_eq!(
            h.payloads(),
            vec![r#"{"event":"result","ok":false,"id":-1,"score":0}"#]
        );
        assert!(!h.coordinator.job_active());
        assert_eq!(h.launcher.jobs.lock().len(), 1);
    }

    #[test]
    fn test_late_result_is_never_reused() {
        let mut config = CoordinatorConfig::default();
        config.trigger = ScanTrigger::Always;
        let mut h = harness(config);
        h.finger(true);
        h.at(0);
        h.at(15_000);
        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);

        // Still holding the sensor: no new attempt may start.
        h.at(16_500);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        h.at(16_510);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        assert!(h.lock.is_busy());

        h.launcher.publish(MatchOutcome::hit(id(7), 99));
        h.at(16_520);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert_eq!(h.coordinator.generation(), 2);

        h.at(16_530);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert_eq!(h.payloads().len(), 1);

        h.launcher.publish(MatchOutcome::failed());
        h.at(21_000);
        assert_eq!(h.display.last_screen().as_deref(), Some("error:Sin coincidencia"));
    }

    #[rstest]
    #[case(91, true, r#"{"event":"result","ok":true,"id":7,"score":91}"#)]
    #[case(90, false, r#"{"event":"result","ok":false,"id":-1,"score":90}"#)]
    #[case(12, false, r#"{"event":"result","ok":false,"id":-1,"score":12}"#)]
    fn test_score_threshold(#[case] score: u16, #[case] ok: bool, #[case] expected: &str) {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::hit(id(7), score));
        h.at(3_900);

        assert_eq!(h.payloads(), vec![expected]);
        let screen = h.display.last_screen().unwrap();
        assert_eq!(screen.starts_with("welcome:"), ok);
    }

    #[test]
    fn test_failed_capture_renders_no_match() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::failed());
        h.at(4_000);

        assert_eq!(h.display.last_screen().as_deref(), Some("error:Sin coincidencia"));
        assert_eq!(
            h.payloads(),
            vec![r#"{"event":"result","ok":false,"id":-1,"score":0}"#]
        );
    }

    #[test]
    fn test_request_expiry_redraws_idle() {
        let mut h = harness(CoordinatorConfig::default());
        h.at(0);
        assert_eq!(h.display.screens(), vec!["idle"]);

        h.gate.request(1_000);
        h.at(10);
        h.at(20);
        assert_eq!(h.display.screens(), vec!["idle", "prompt"]);

        h.at(1_010);
        assert_eq!(h.display.screens(), vec!["idle", "prompt", "idle"]);
        h.at(1_020);
        assert_eq!(h.display.screens().len(), 3);
    }

    #[test]
    fn test_finger_without_request_is_ignored() {
        let mut h = harness(CoordinatorConfig::default());
        h.finger(true);
        h.at(0);
        h.at(100);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        assert_eq!(*h.launcher.launches.lock(), 0);
    }

    #[test]
    fn test_always_trigger_starts_without_request() {
        let mut config = CoordinatorConfig::default();
        config.trigger = ScanTrigger::Always;
        let mut h = harness(config);
        h.finger(true);
        h.at(0);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
    }

    #[test]
    fn test_single_launch_per_attempt() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        for t in (0..3_000).step_by(10) {
            h.at(t);
        }
        assert_eq!(*h.launcher.launches.lock(), 1);
        assert!(h.coordinator.job_active());
    }

    #[test]
    fn test_busy_sensor_blocks_launch() {
        let mut h = harness(CoordinatorConfig::default());
        let lease = h.lock.try_acquire().unwrap();
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);

        drop(lease);
        h.at(10);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
    }

    #[test]
    fn test_breathing_animation_ping_pongs() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        for t in (0..=1_200).step_by(10) {
            h.at(t);
        }
        assert_eq!(h.display.values("phase:"), vec![0, 1, 2, 3, 2, 1, 0, 1, 2]);
    }

    #[test]
    fn test_scan_bar_bounces_inside_pane() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        for t in (0..=3_800).step_by(4) {
            h.at(t);
        }
        let bars = h.display.values("bar:");
        let max = FP_PANE_SIZE - CoordinatorConfig::default().scanbar_thick;
        assert_eq!(bars.iter().copied().max(), Some(max));
        let top = bars.iter().position(|&y| y == max).unwrap();
        assert_eq!(bars[top + 1], max - 1);
        assert!(bars.windows(2).all(|w| w[0].abs_diff(w[1]) == 1));
    }

    #[test]
    fn test_forced_return_overrides_rerequest() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::hit(id(7), 95));
        h.at(3_900);
        h.finger(false);
        assert_eq!(h.coordinator.timers().forced_return_at, Some(Millis::new(8_900)));

        // Re-asserted while the result is on screen.
        h.gate.request(0);
        h.at(5_400);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        h.at(5_410);
        assert_eq!(h.display.last_screen().as_deref(), Some("prompt"));

        h.at(8_900);
        assert!(!h.gate.is_live());
        assert_eq!(h.display.last_screen().as_deref(), Some("idle"));
        assert_eq!(h.coordinator.timers().forced_return_at, None);
    }

    #[test]
    fn test_new_attempt_disarms_forced_return() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::failed());
        h.at(3_900);
        assert_eq!(h.coordinator.timers().forced_return_at, Some(Millis::new(8_900)));

        h.gate.request(15_000);
        h.at(5_400);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        h.at(6_000);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert_eq!(h.coordinator.timers().forced_return_at, None);

        h.at(8_900);
        assert_eq!(h.coordinator.current_state(), ScanState::Matching);
        assert!(h.coordinator.job_active());

        h.launcher.publish(MatchOutcome::hit(id(7), 95));
        h.at(9_900);
        assert_eq!(h.coordinator.current_state(), ScanState::Cooldown);
        assert_eq!(*h.launcher.launches.lock(), 2);
        assert_eq!(
            h.payloads(),
            vec![
                r#"{"event":"result","ok":false,"id":-1,"score":0}"#,
                r#"{"event":"result","ok":true,"id":7,"score":95}"#,
            ]
        );
    }

    #[test]
    fn test_forced_return_cleared_without_request() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::failed());
        h.at(3_900);
        h.at(5_400);
        assert_eq!(h.coordinator.current_state(), ScanState::WaitFinger);
        assert_eq!(h.coordinator.timers().forced_return_at, None);
    }

    #[test]
    fn test_enroll_progress_takes_over_screen() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut h = harness_with(CoordinatorConfig::default(), Some(rx));
        h.at(0);

        tx.send(EnrollProgress::Step(1)).unwrap();
        h.gate.request(0);
        h.at(10);
        tx.send(EnrollProgress::Step(2)).unwrap();
        h.at(20);
        tx.send(EnrollProgress::Finished { id: id(4), ok: true }).unwrap();
        h.at(30);
        h.at(1_529);
        h.at(1_530);

        assert_eq!(
            h.display.screens(),
            vec!["idle", "enroll:1", "enroll:2", "ok:Huella guardada", "prompt"]
        );
    }

    #[test]
    fn test_history_records_cycle() {
        let mut h = harness(CoordinatorConfig::default());
        h.gate.request(0);
        h.finger(true);
        h.at(0);
        h.launcher.publish(MatchOutcome::failed());
        h.at(3_900);
        h.at(5_400);

        let states: Vec<_> = h
            .coordinator
            .last_transitions(3)
            .into_iter()
            .map(|t| t.to)
            .collect();
        assert_eq!(
            states,
            vec![ScanState::Matching, ScanState::Cooldown, ScanState::WaitFinger]
        );
    }

    #[rstest]
    #[case(0, true, 1)]
    #[case(3, true, 2)]
    #[case(3, false, 2)]
    #[case(0, false, 1)]
    fn test_ping_pong(#[case] value: u8, #[case] rising: bool, #[case] expected: u8) {
        let mut rising = rising;
        assert_eq!(ping_pong(value, &mut rising, 3), expected);
    }
}
