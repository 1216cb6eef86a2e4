//! ACES Core - Error Types
//!
//! Crate-wide error taxonomy. Simulation step failures (precondition misses,
//! failed rolls, prevented techniques) are recorded trace outcomes, not errors,
//! and never surface through this type.

use thiserror::Error;

/// Errors surfaced by configuration, genome construction, topology IO and the
/// evolution loop.
#[derive(Debug, Error)]
pub enum AcesError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Unknown technique id: {0}")]
    UnknownTechnique(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run cancelled after generation {0}")]
    Cancelled(u32),
}

/// Crate-wide result alias
pub type AcesResult<T> = Result<T, AcesError>;
