//! Engine error kinds, per §7: a small closed enum classifying failures by
//! how the engine should react, rendered with `thiserror` rather than a
//! hand-written `Display`/`Error` impl.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Not enough candles for the requested indicator/setup. Recovered
    /// locally: the caller should treat this as "no setup", not a failure.
    #[error("insufficient history: need {needed} bars, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    /// Risk factor F <= 0 or SL distance <= 0. No position is opened.
    #[error("sizing failed: {reason}")]
    SizingFailure { reason: String },

    /// Breach of a §3 position invariant. Fatal: the engine must not
    /// silently continue trading with a corrupt position.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Treated as transient by the engine: the intended decision is
    /// recomputed next tick.
    #[error("broker failure: {0}")]
    BrokerFailure(String),
}
