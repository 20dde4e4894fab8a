use glam::IVec2;
use thiserror::Error;

/// Errors that can occur while building or running a simulation
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Rule {rule} of atom `{atom}` reaches {reach} cells but tiles are {tile_size} cells wide")]
    RuleTooLarge {
        atom: String,
        rule: u32,
        reach: u32,
        tile_size: u32,
    },

    #[error("Cell {0} is outside the locked region")]
    Unlocked(IVec2),

    #[error("Evaluation failed: {0}")]
    Eval(#[from] script::EvalError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
