//! Component wiring and the host loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use fpterm_core::config::TerminalConfig;
use fpterm_core::{Clock, MonotonicClock, TemplateId};
use fpterm_hardware::AnySensor;
use fpterm_hardware::mock::{MockSensor, MockSensorHandle};
use fpterm_network::{AppState, Console, EventHub};
use fpterm_storage::{Database, DatabaseConfig, NameDirectory, SqliteNameRepository};
use fpterm_terminal::{
    Enroller, MatchLauncher, MatchWorker, NotificationQueue, ScanCoordinator, ScanRequestGate,
    SensorLock, VirtualDisplay,
};

/// Pattern given to the finger seeded into slot `id`.
pub fn seed_pattern(id: TemplateId) -> u32 {
    0xF1_0000 | u32::from(id.as_u16())
}

/// Enroll synthetic fingers into slots `1..=count` of the mock sensor.
pub fn seed_templates(handle: &MockSensorHandle, count: u16) -> anyhow::Result<()> {
    for raw in 1..=count {
        let id = TemplateId::new(raw).context("--mock-templates exceeds the slot range")?;
        handle.add_template(id, seed_pattern(id));
    }
    if count > 0 {
        info!(count, "Mock sensor seeded");
    }
    Ok(())
}

/// A fully wired terminal, ready to run.
pub struct Terminal {
    coordinator: ScanCoordinator,
    queue: Arc<NotificationQueue>,
    hub: EventHub,
    state: AppState,
    mock: MockSensorHandle,
    db: Database,
    bind: String,
    tick: Duration,
}

impl Terminal {
    pub async fn build(config: &TerminalConfig, mock_templates: u16) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

        let (sensor, mock) = MockSensor::new();
        seed_templates(&mock, mock_templates)?;
        let sensor = Arc::new(AnySensor::Mock(sensor));

        let db = Database::new(DatabaseConfig::from(&config.storage))
            .await
            .with_context(|| format!("opening {}", config.storage.database_path))?;
        let repo = SqliteNameRepository::new(db.pool().clone());
        let names = Arc::new(NameDirectory::load(repo).await?);

        let queue = Arc::new(NotificationQueue::new(&config.queue, Arc::clone(&clock)));
        let gate = Arc::new(ScanRequestGate::new(Arc::clone(&clock)));
        let lock = SensorLock::new();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let enroller = Arc::new(Enroller::new(
            Arc::clone(&sensor),
            lock.clone(),
            Arc::clone(&queue),
            progress_tx,
        ));
        let launcher: Arc<dyn MatchLauncher> = Arc::new(MatchWorker::new(Arc::clone(&sensor)));

        let coordinator = ScanCoordinator::builder()
            .with_config(config.coordinator.clone())
            .with_clock(clock)
            .with_gate(Arc::clone(&gate))
            .with_queue(Arc::clone(&queue))
            .with_display(Box::new(VirtualDisplay::default()))
            .with_launcher(launcher)
            .with_names(names.clone())
            .with_probe(sensor.clone())
            .with_sensor_lock(lock)
            .with_enroll_progress(progress_rx)
            .build()?;

        let hub = EventHub::new(config.queue.capacity);
        let state = AppState {
            gate,
            queue: Arc::clone(&queue),
            hub: hub.clone(),
            sensor,
            enroller,
            names,
            scan_state: coordinator.subscribe(),
            scan_timeout_ms: config.console.scan_timeout_ms,
            keep_alive: Duration::from_secs(config.http.keep_alive_secs),
        };

        Ok(Self {
            coordinator,
            queue,
            hub,
            state,
            mock,
            db,
            bind: config.http.bind.clone(),
            tick: Duration::from_millis(config.host.tick_ms),
        })
    }

    /// Run until Ctrl-C or until the HTTP server stops.
    pub async fn run(mut self, console: bool) -> anyhow::Result<()> {
        let bind = self.bind.clone();
        let http_state = self.state.clone();
        let mut server =
            tokio::spawn(async move { fpterm_network::serve(&bind, http_state).await });

        if console {
            let console = Console::new(self.state.clone()).with_mock(self.mock.clone());
            tokio::spawn(async move {
                if let Err(e) = console.run(tokio::io::stdin(), tokio::io::stdout()).await {
                    warn!(error = %e, "Console stopped");
                }
            });
        }

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick = ?self.tick, "Host loop running");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.coordinator.poll();
                    self.queue.drain_and_deliver(&self.hub).await;
                }
                joined = &mut server => {
                    break match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.into()),
                        Err(e) => Err(anyhow::anyhow!("HTTP task failed: {e}")),
                    };
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    server.abort();
                    break Ok(());
                }
            }
        };

        if let Err(e) = &outcome {
            error!(error = %e, "Terminal stopped");
        }
        self.state.enroller.abort();
        self.db.close().await;
        outcome
    }
}
