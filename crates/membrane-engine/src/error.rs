use thiserror::Error;

use membrane_core::{CoreError, FormatError, RegionId};

/// Errors surfaced by the simulation engines.
///
/// `Format` wraps recoverable user-input errors (malformed structure or rule
/// strings, bad documents); the caller re-prompts. A `Core` error escaping a
/// rule application means an applicability check let something through — an
/// engine invariant violation, propagated and never recovered.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("region not found: {0}")]
    RegionNotFound(RegionId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
