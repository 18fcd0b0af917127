//! Line-based operator console.
//!
//! Reads one command per line (stdin in production) and writes a short
//! reply per command. `s` goes through the same scan request path as the
//! HTTP `scan` action.

use std::str::FromStr;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{info, warn};

use fpterm_core::TemplateId;
use fpterm_hardware::FingerprintSensor;
use fpterm_hardware::mock::MockSensorHandle;

use crate::state::AppState;

const MAX_LINE: usize = 256;

pub const USAGE: &str = "\
Comandos:
  s                Escanear (match 1:N)
  e <id>           Enrolar en ID (0..999)
  d <id>           Borrar ID
  c                Contar plantillas
  x                Vaciar base
  i                Info del sensor
  n <id> <nombre>  Setear nombre para ID
  h                Esta ayuda
  f <id> <score>   Apoyar dedo simulado (sensor mock)
  l                Levantar dedo simulado (sensor mock)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    Enroll(TemplateId),
    Delete(TemplateId),
    Count,
    Empty,
    Info,
    Name(TemplateId, String),
    Help,
    Finger { id: TemplateId, score: u16 },
    Lift,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Comando no reconocido: {0}")]
    Unknown(String),

    #[error("Uso: {0}")]
    Usage(&'static str),

    #[error("ID fuera de rango: {0}")]
    InvalidId(String),
}

fn parse_id(raw: Option<&str>, usage: &'static str) -> Result<TemplateId, CommandError> {
    let raw = raw.ok_or(CommandError::Usage(usage))?;
    raw.parse()
        .map_err(|_| CommandError::InvalidId(raw.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        match verb {
            "s" => Ok(Command::Scan),
            "e" => parse_id(args.next(), "e <id>").map(Command::Enroll),
            "d" => parse_id(args.next(), "d <id>").map(Command::Delete),
            "c" => Ok(Command::Count),
            "x" => Ok(Command::Empty),
            "i" => Ok(Command::Info),
            "h" | "?" => Ok(Command::Help),
            "l" => Ok(Command::Lift),
            "n" => {
                const USAGE_N: &str = "n <id> <nombre>";
                let (raw_id, name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage(USAGE_N))?;
                let id = parse_id(Some(raw_id), USAGE_N)?;
                Ok(Command::Name(id, name.trim().to_string()))
            }
            "f" => {
                const USAGE_F: &str = "f <id> <score>";
                let id = parse_id(args.next(), USAGE_F)?;
                let score = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or(CommandError::Usage(USAGE_F))?;
                Ok(Command::Finger { id, score })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Command interpreter bound to the running terminal.
#[derive(Debug)]
pub struct Console {
    state: AppState,
    mock: Option<MockSensorHandle>,
}

impl Console {
    pub fn new(state: AppState) -> Self {
        Self { state, mock: None }
    }

    /// Enable the simulated-finger commands.
    #[must_use]
    pub fn with_mock(mut self, handle: MockSensorHandle) -> Self {
        self.mock = Some(handle);
        self
    }

    /// Run one command and return its reply.
    pub async fn execute(&self, command: Command) -> String {
        info!(?command, "Console command");
        let state = &self.state;

        match command {
            Command::Scan => {
                state.request_scan();
                "Ponga su huella...".to_string()
            }
            Command::Enroll(id) => match state.enroller.start(id) {
                Ok(()) => format!("Enrolando ID {id}"),
                Err(e) => format!("Enrolamiento no iniciado: {e}"),
            },
            Command::Delete(id) => match state.delete_template(id).await {
                Ok(true) => "OK".to_string(),
                Ok(false) => format!("ID {id} vacio"),
                Err(e) => format!("ERR: {e}"),
            },
            Command::Count => match state.sensor.template_count().await {
                Ok(count) => count.to_string(),
                Err(e) => format!("ERR: {e}"),
            },
            Command::Empty => match state.empty_database().await {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR: {e}"),
            },
            Command::Info => match state.sensor.parameters().await {
                Ok(p) => format!(
                    "capacity={}\nsecurity={}\nsystem_id=0x{:X}\nbaud={}\npacket_len={}",
                    p.capacity, p.security_level, p.system_id, p.baud_rate, p.packet_len
                ),
                Err(e) => format!("ERR: {e}"),
            },
            Command::Name(id, name) => match state.names.set(id, &name).await {
                Ok(stored) => format!("Nombre guardado: {stored}"),
                Err(e) => format!("ERR: {e}"),
            },
            Command::Help => USAGE.to_string(),
            Command::Finger { id, score } => {
                let Some(mock) = &self.mock else {
                    return "Solo con sensor simulado".to_string();
                };
                match mock.get_template(id) {
                    Some(pattern) => {
                        mock.place_finger(pattern, score);
                        format!("Dedo de ID {id} apoyado (score {score})")
                    }
                    None => format!("ID {id} vacio"),
                }
            }
            Command::Lift => {
                let Some(mock) = &self.mock else {
                    return "Solo con sensor simulado".to_string();
                };
                mock.lift_finger();
                "Dedo levantado".to_string()
            }
        }
    }

    /// Serve commands from `input` until it closes.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE));

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max = MAX_LINE, "Console line too long");
                    continue;
                }
                Err(LinesCodecError::Io(e)) => return Err(e),
            };
            if line.trim().is_empty() {
                continue;
            }

            let reply = match line.parse::<Command>() {
                Ok(command) => self.execute(command).await,
                Err(e) => format!("{e}\n{USAGE}"),
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }

        info!("Console input closed");
        Ok(())
    }
}
