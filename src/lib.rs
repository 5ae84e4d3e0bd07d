//! Two-strategy (TCL/SMOG) decision engine for BTC perpetual futures.
//! Given a rolling candle window and account balance, detects setups,
//! computes risk-bounded stacked order plans, and manages the resulting
//! positions through fills, stop-loss migration, scale-in gating,
//! trailing, and exit triggers.

pub mod broker;
pub mod candle;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod indicators;
pub mod position;
pub mod strategies;
pub mod types;

pub use engine::Engine;
pub use error::EngineError;
