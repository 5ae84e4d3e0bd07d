//! Core data types: candles, sides, orders, and per-strategy setup snapshots.

use serde::{Deserialize, Serialize};

/// A single OHLC(V) bar. `volume`/`timestamp` are carried through from the
/// candle source even though indicator math only reads open/high/low/close.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Position/order direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Which of the two strategies a position or setup belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Tcl,
    Smog,
}

/// Role of an order within a position's stacked plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Entry,
    Limit1,
    Limit2,
}

/// Order lifecycle state. Transitions: Pending -> Filled, Pending -> Cancelled.
/// Terminal once non-pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

/// A single stacked order. `entry_price`, `size_usd`, `tp`, `sl`, `order_type`
/// are immutable once constructed; `status` and `order_id` mutate (the
/// latter once, when the broker accepts the submission).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub side: Side,
    pub entry_price: f64,
    pub size_usd: f64,
    pub tp: f64,
    pub sl: f64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Exchange-assigned id, set once `BrokerAdapter::submit_order` accepts it.
    pub order_id: Option<String>,
}

impl Order {
    pub fn new(side: Side, entry_price: f64, size_usd: f64, tp: f64, sl: f64, order_type: OrderType) -> Self {
        Order {
            side,
            entry_price,
            size_usd,
            tp,
            sl,
            order_type,
            status: OrderStatus::Pending,
            order_id: None,
        }
    }
}

/// Diagnostics captured by TCL's `detect_setup`, carried into `Position::metadata`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TclSetup {
    pub direction: Side,
    pub trend_high: f64,
    pub trend_low: f64,
    pub trend_pct: f64,
    pub adx: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema200: f64,
}

/// Diagnostics captured by SMOG's `detect_setup`, carried into `Position::metadata`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmogSetup {
    pub direction: Side,
    pub adx: f64,
    pub rsi: f64,
    pub divergence: DivergenceType,
    pub choch: ChochType,
    pub fvg: Fvg,
}

/// Tagged union replacing the source's opaque setup dict (Design Notes §9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SetupKind {
    Tcl(TclSetup),
    Smog(SmogSetup),
}

/// A detected Fair Value Gap (3-bar pattern).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fvg {
    pub fvg_type: FvgType,
    pub bottom: f64,
    pub top: f64,
    pub midpoint: f64,
    /// Index of the middle (impulse) bar within the window it was detected in.
    pub impulse_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgType {
    Bullish,
    Bearish,
}

impl FvgType {
    pub fn matches_side(self, side: Side) -> bool {
        matches!((self, side), (FvgType::Bullish, Side::Long) | (FvgType::Bearish, Side::Short))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceType {
    Bullish,
    Bearish,
}

impl DivergenceType {
    pub fn to_side(self) -> Side {
        match self {
            DivergenceType::Bullish => Side::Long,
            DivergenceType::Bearish => Side::Short,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChochType {
    Bullish,
    Bearish,
}

impl ChochType {
    pub fn matches_divergence(self, d: DivergenceType) -> bool {
        matches!(
            (self, d),
            (ChochType::Bullish, DivergenceType::Bullish) | (ChochType::Bearish, DivergenceType::Bearish)
        )
    }
}

/// Position lifecycle state. Terminal once closed (§3 invariant 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Reason a position was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Tp,
    Sl,
}
