//! `fpterm` - fingerprint access terminal.
//!
//! Loads the TOML configuration, opens the name database, wires the scan
//! coordinator to the (mock) sensor and serves the HTTP and console
//! surfaces until interrupted.

mod app;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fpterm_core::config::TerminalConfig;

use crate::app::Terminal;

#[derive(Parser, Debug)]
#[command(name = "fpterm")]
#[command(version, about = "Fingerprint access terminal")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address, overrides [http].bind
    #[arg(long)]
    bind: Option<String>,

    /// SQLite file for subject names, overrides [storage].database_path
    #[arg(long)]
    database: Option<String>,

    /// Log filter; RUST_LOG is used when absent
    #[arg(long)]
    log_level: Option<String>,

    /// Seed the mock sensor with templates in slots 1..=N
    #[arg(long, default_value_t = 0)]
    mock_templates: u16,

    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<TerminalConfig> {
        let mut config = match &self.config {
            Some(path) => TerminalConfig::from_file(path)?,
            None => TerminalConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.http.bind.clone_from(bind);
        }
        if let Some(database) = &self.database {
            config.storage.database_path.clone_from(database);
        }
        config.validate()?;
        Ok(config)
    }

    fn log_filter(&self) -> tracing_subscriber::EnvFilter {
        match &self.log_level {
            Some(level) => tracing_subscriber::EnvFilter::new(level),
            None => tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(args.log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fpterm v{}", env!("CARGO_PKG_VERSION"));

    let config = args.load_config()?;
    info!(
        bind = %config.http.bind,
        database = %config.storage.database_path,
        trigger = ?config.coordinator.trigger,
        "Configuration loaded"
    );

    let terminal = Terminal::build(&config, args.mock_templates).await?;
    terminal.run(!args.no_console).await
}
