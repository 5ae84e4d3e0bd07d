//! Structured events emitted by the engine (§6), and the observer seam that
//! receives them. Generalizes a Telegram-bot's `notify_trade_open`-style
//! call sites and ad hoc `log::info!` diagnostics into a single typed
//! contract: implementers choose whether to forward events to Telegram, a
//! metrics sink, a trade log, or nowhere at all.

use crate::types::{ExitReason, OrderType, SetupKind, Side, Strategy};

#[derive(Clone, Copy, Debug)]
pub enum SlMoveReason {
    Breakeven,
    FvgTrail,
}

#[derive(Clone, Debug)]
pub enum EngineEvent {
    SetupDetected {
        strategy: Strategy,
        direction: Side,
        setup: SetupKind,
    },
    OrderSubmitted {
        strategy: Strategy,
        order_type: OrderType,
        entry_price: f64,
        size_usd: f64,
    },
    OrderFilled {
        strategy: Strategy,
        order_type: OrderType,
        price: f64,
        new_avg_entry: f64,
        new_total_size: f64,
    },
    SlMoved {
        strategy: Strategy,
        old_sl: f64,
        new_sl: f64,
        reason: SlMoveReason,
    },
    ScaleInCancelled {
        strategy: Strategy,
        cancelled_count: usize,
        current_r: f64,
    },
    PositionClosed {
        strategy: Strategy,
        reason: ExitReason,
        realized_pnl: f64,
        r_multiple: f64,
    },
}

/// Receives engine events. Object-safe so callers can box a concrete
/// observer (Telegram, metrics, trade log, test spy) behind this trait.
pub trait EngineObserver {
    fn on_event(&mut self, event: &EngineEvent);
}

/// Default observer: logs every event via `tracing` at each decision point.
#[derive(Default)]
pub struct LoggingObserver;

impl EngineObserver for LoggingObserver {
    fn on_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::SetupDetected { strategy, direction, .. } => {
                tracing::info!(?strategy, ?direction, "setup detected");
            }
            EngineEvent::OrderSubmitted { strategy, order_type, entry_price, size_usd } => {
                tracing::info!(?strategy, ?order_type, entry_price, size_usd, "order submitted");
            }
            EngineEvent::OrderFilled { strategy, order_type, price, new_avg_entry, new_total_size } => {
                tracing::info!(?strategy, ?order_type, price, new_avg_entry, new_total_size, "order filled");
            }
            EngineEvent::SlMoved { strategy, old_sl, new_sl, reason } => {
                tracing::info!(?strategy, old_sl, new_sl, reason = ?reason, "stop-loss moved");
            }
            EngineEvent::ScaleInCancelled { strategy, cancelled_count, current_r } => {
                tracing::warn!(?strategy, cancelled_count, current_r, "scale-in cancelled");
            }
            EngineEvent::PositionClosed { strategy, reason, realized_pnl, r_multiple } => {
                tracing::info!(?strategy, reason = ?reason, realized_pnl, r_multiple, "position closed");
            }
        }
    }
}

/// Discards every event. Useful in tests that only care about position state.
#[derive(Default)]
pub struct NullObserver;

impl EngineObserver for NullObserver {
    fn on_event(&mut self, _event: &EngineEvent) {}
}

/// Test/inspection observer that records every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<EngineEvent>,
}

impl EngineObserver for RecordingObserver {
    fn on_event(&mut self, event: &EngineEvent) {
        self.events.push(event.clone());
    }
}
