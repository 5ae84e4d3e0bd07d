//! Position lifecycle (§3, §4.2). Methods are inherent on `Position` rather
//! than kept as free functions over a position struct, since `Position`
//! here carries its own invariants and Rust idiom puts those operations on
//! the type they protect.

use crate::error::EngineError;
use crate::types::{ExitReason, Order, OrderStatus, PositionStatus, SetupKind, Side, Strategy};

#[derive(Clone, Debug)]
pub struct Position {
    pub strategy: Strategy,
    pub side: Side,
    pub orders: Vec<Order>,
    pub avg_entry: f64,
    pub total_size: f64,
    pub tp: f64,
    pub sl: f64,
    pub original_sl: f64,
    pub sl_moved_to_be: bool,
    pub opened_at: i64,
    pub pnl: f64,
    pub status: PositionStatus,
    pub metadata: SetupKind,
}

impl Position {
    /// `orders` must be non-empty and ordered (entry first). `original_sl`
    /// is captured from the first order and never mutated afterward (§3
    /// invariant 3). `tp`/`sl` start at the entry order's levels and are
    /// updated as fills and management occur.
    pub fn new(strategy: Strategy, side: Side, orders: Vec<Order>, opened_at: i64, metadata: SetupKind) -> Self {
        let first = &orders[0];
        Position {
            strategy,
            side,
            tp: first.tp,
            sl: first.sl,
            original_sl: first.sl,
            avg_entry: 0.0,
            total_size: 0.0,
            sl_moved_to_be: false,
            opened_at,
            pnl: 0.0,
            status: PositionStatus::Open,
            metadata,
            orders,
        }
    }

    /// Fills the order at `order_index`, recomputing `avg_entry`/`total_size`
    /// as the notional-weighted mean over all filled orders (§3 invariant
    /// 1). The order's own `entry_price` — not `fill_price` — feeds that
    /// average, matching §4.2's literal invariant formula; `fill_price` is
    /// accepted for callers that want to record slippage separately.
    pub fn fill_order(&mut self, order_index: usize, _fill_price: f64) -> Result<(), EngineError> {
        if self.status == PositionStatus::Closed {
            return Err(EngineError::InvariantViolation("fill_order called on a closed position".into()));
        }
        let order = self
            .orders
            .get_mut(order_index)
            .ok_or_else(|| EngineError::InvariantViolation("fill_order: order index out of range".into()))?;
        if order.status != OrderStatus::Pending {
            return Err(EngineError::InvariantViolation("fill_order: order is not pending".into()));
        }
        order.status = OrderStatus::Filled;

        let mut weighted_sum = 0.0;
        let mut total = 0.0;
        for o in &self.orders {
            if o.status == OrderStatus::Filled {
                weighted_sum += o.size_usd * o.entry_price;
                total += o.size_usd;
            }
        }
        self.total_size = total;
        self.avg_entry = if total > 0.0 { weighted_sum / total } else { 0.0 };
        Ok(())
    }

    /// `(price - avg_entry) / avg_entry * total_size` for longs, negated
    /// for shorts; 0 when nothing has filled yet.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.total_size == 0.0 {
            return 0.0;
        }
        let pct = (price - self.avg_entry) / self.avg_entry;
        match self.side {
            Side::Long => pct * self.total_size,
            Side::Short => -pct * self.total_size,
        }
    }

    /// The risk amount implied by `original_sl`, used to express realized
    /// pnl as an R-multiple. 0 when nothing has filled yet.
    pub fn original_risk_usd(&self) -> f64 {
        if self.total_size == 0.0 || self.avg_entry == 0.0 {
            return 0.0;
        }
        (self.avg_entry - self.original_sl).abs() / self.avg_entry * self.total_size
    }

    /// Marks the position closed at `price`, recording final pnl. Returns
    /// the realized pnl. No field may change after this (§3 invariant 4).
    pub fn close(&mut self, price: f64, _reason: ExitReason) -> f64 {
        let realized = self.unrealized_pnl(price);
        self.pnl = realized;
        self.status = PositionStatus::Closed;
        realized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderType, TclSetup};
    use approx::assert_relative_eq;

    fn setup() -> SetupKind {
        SetupKind::Tcl(TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 105.0,
            ema21: 104.0,
            ema50: 103.0,
            ema200: 101.0,
        })
    }

    fn stacked_orders() -> Vec<Order> {
        vec![
            Order::new(Side::Long, 100.0, 600.0, 120.0, 90.0, OrderType::Entry),
            Order::new(Side::Long, 95.0, 1800.0, 120.0, 90.0, OrderType::Limit1),
            Order::new(Side::Long, 90.0, 1200.0, 120.0, 90.0, OrderType::Limit2),
        ]
    }

    #[test]
    fn fill_order_recomputes_weighted_average() {
        let mut pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        pos.fill_order(0, 100.0).unwrap();
        assert_relative_eq!(pos.avg_entry, 100.0, epsilon = 1e-9);
        assert_relative_eq!(pos.total_size, 600.0, epsilon = 1e-9);

        pos.fill_order(1, 95.0).unwrap();
        let expected = (600.0 * 100.0 + 1800.0 * 95.0) / (600.0 + 1800.0);
        assert_relative_eq!(pos.avg_entry, expected, epsilon = 1e-9);
        assert_relative_eq!(pos.total_size, 2400.0, epsilon = 1e-9);
    }

    #[test]
    fn fill_order_rejects_already_filled_order() {
        let mut pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        pos.fill_order(0, 100.0).unwrap();
        assert!(pos.fill_order(0, 100.0).is_err());
    }

    #[test]
    fn fill_order_rejects_closed_position() {
        let mut pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        pos.fill_order(0, 100.0).unwrap();
        pos.close(120.0, ExitReason::Tp);
        assert!(pos.fill_order(1, 95.0).is_err());
    }

    #[test]
    fn unrealized_pnl_is_zero_before_any_fill() {
        let pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        assert_eq!(pos.unrealized_pnl(150.0), 0.0);
    }

    #[test]
    fn unrealized_pnl_long_vs_short_sign() {
        let mut long_pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        long_pos.fill_order(0, 100.0).unwrap();
        assert!(long_pos.unrealized_pnl(110.0) > 0.0);

        let short_orders = vec![Order::new(Side::Short, 100.0, 600.0, 80.0, 110.0, OrderType::Entry)];
        let mut short_pos = Position::new(Strategy::Tcl, Side::Short, short_orders, 0, setup());
        short_pos.fill_order(0, 100.0).unwrap();
        assert!(short_pos.unrealized_pnl(110.0) < 0.0);
    }

    #[test]
    fn original_sl_is_immutable_after_sl_updates() {
        let mut pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        let original = pos.original_sl;
        pos.sl = 101.0;
        pos.sl_moved_to_be = true;
        assert_eq!(pos.original_sl, original);
    }

    #[test]
    fn close_marks_status_and_records_pnl() {
        let mut pos = Position::new(Strategy::Tcl, Side::Long, stacked_orders(), 0, setup());
        pos.fill_order(0, 100.0).unwrap();
        let pnl = pos.close(110.0, ExitReason::Tp);
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_relative_eq!(pos.pnl, pnl, epsilon = 1e-12);
    }
}
