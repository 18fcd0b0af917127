use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Match job already active (generation {generation})")]
    JobActive { generation: u64 },

    // Identifier errors
    #[error("Invalid template id: {0}")]
    InvalidTemplateId(String),

    // Display errors
    #[error("Invalid display line {line} (max {max})")]
    InvalidLine { line: usize, max: usize },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file: {0}")]
    ConfigRead(String),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
