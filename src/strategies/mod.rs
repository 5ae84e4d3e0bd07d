//! The two strategies, as stateless structs over their parameter sets
//! (§4.3, §4.4). Each exposes the same four-operation contract the engine
//! drives: `detect_setup`, `calculate_entries`, `manage_position`,
//! `should_exit`.

pub mod smog;
pub mod tcl;

use crate::events::SlMoveReason;
use crate::types::OrderType;

/// What happened during a `manage_position` call, reported back to the
/// engine for translation into `EngineEvent`s (§6). Strategies never touch
/// the observer directly — they return data, the engine emits events.
#[derive(Clone, Debug)]
pub enum ManagementAction {
    OrderFilled { order_type: OrderType, price: f64 },
    ScaleInCancelled { cancelled_count: usize, current_r: f64 },
    SlMoved { old_sl: f64, new_sl: f64, reason: SlMoveReason },
}

pub use smog::SmogStrategy;
pub use tcl::TclStrategy;
