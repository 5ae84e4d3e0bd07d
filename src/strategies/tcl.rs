//! TCL (Trend Continuation Line): trend-following with a fib-staggered
//! 3-order stack. One struct holding its params, exposing the engine's
//! `detect_setup` / `calculate_entries` / `manage_position` / `should_exit`
//! contract.

use crate::candle::CandleWindow;
use crate::config::TclParams;
use crate::events::SlMoveReason;
use crate::indicators;
use crate::position::Position;
use crate::strategies::ManagementAction;
use crate::types::{ExitReason, Order, OrderStatus, OrderType, Side, TclSetup};

const MIN_BARS: usize = 200;
const CONTINUATION_LOOKBACK: usize = 20;
const TREND_EXTREMES_LOOKBACK: usize = 100;
const BREAKEVEN_LOOKBACK: usize = 5;
const BREAKEVEN_TRIGGER_PCT: f64 = 0.0025;
const SCALE_IN_GATE_R: f64 = -0.20;

pub struct TclStrategy {
    pub params: TclParams,
}

impl TclStrategy {
    pub fn new(params: TclParams) -> Self {
        TclStrategy { params }
    }

    /// Requires >= 200 bars. EMA alignment, ADX >= min_adx, trend magnitude
    /// >= min_trend_pct, not parabolic, and a continuation break (last 20
    /// bars' extreme beyond the prior 20 bars').
    pub fn detect_setup(&self, candles: &CandleWindow) -> Option<TclSetup> {
        let len = candles.len();
        if len < MIN_BARS {
            return None;
        }
        let closes = candles.closes();
        let highs = candles.highs();
        let lows = candles.lows();

        let ema9 = indicators::ema(&closes, 9);
        let ema21 = indicators::ema(&closes, 21);
        let ema50 = indicators::ema(&closes, 50);
        let ema200 = indicators::ema(&closes, 200);
        let last = len - 1;

        let direction = indicators::detect_trend(closes[last], ema9[last], ema21[last], ema50[last], ema200[last])?;

        let adx_values = indicators::adx(&highs, &lows, &closes, self.params.adx_period);
        let adx_last = adx_values[last]?;
        if adx_last < self.params.min_adx {
            return None;
        }

        let (trend_high, trend_low) = indicators::find_trend_extremes(&highs, &lows, direction, TREND_EXTREMES_LOOKBACK);
        let trend_pct = indicators::trend_magnitude(trend_high, trend_low);
        if trend_pct < self.params.min_trend_pct {
            return None;
        }

        if indicators::is_parabolic(&closes) {
            return None;
        }

        if len < 2 * CONTINUATION_LOOKBACK {
            return None;
        }
        let recent = &highs[len - CONTINUATION_LOOKBACK..];
        let prior = &highs[len - 2 * CONTINUATION_LOOKBACK..len - CONTINUATION_LOOKBACK];
        let continuation_ok = match direction {
            Side::Long => {
                let recent_high = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let prior_high = prior.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                recent_high > prior_high
            }
            Side::Short => {
                let recent_low = lows[len - CONTINUATION_LOOKBACK..].iter().cloned().fold(f64::INFINITY, f64::min);
                let prior_low = lows[len - 2 * CONTINUATION_LOOKBACK..len - CONTINUATION_LOOKBACK]
                    .iter()
                    .cloned()
                    .fold(f64::INFINITY, f64::min);
                recent_low < prior_low
            }
        };
        if !continuation_ok {
            return None;
        }

        Some(TclSetup {
            direction,
            trend_high,
            trend_low,
            trend_pct,
            adx: adx_last,
            ema9: ema9[last]?,
            ema21: ema21[last]?,
            ema50: ema50[last]?,
            ema200: ema200[last]?,
        })
    }

    /// Risk cap `R = min(balance * risk_pct, balance * max_risk_pct)`.
    /// `base_size = R / F` where `F` is the multiplier-weighted sum of each
    /// order's SL distance fraction; `None` (a sizing failure, §7) when
    /// `F <= 0`.
    pub fn calculate_entries(&self, setup: &TclSetup, balance: f64) -> Option<Vec<Order>> {
        let fib = indicators::fibonacci_retracement(
            setup.trend_high,
            setup.trend_low,
            setup.direction,
            self.params.entry_fib,
            self.params.limit1_fib,
            self.params.limit2_fib,
        );
        let delta = setup.trend_high - setup.trend_low;

        let (sl, tp_entry) = match setup.direction {
            Side::Long => (setup.trend_low * 0.998, setup.trend_high),
            Side::Short => (setup.trend_high * 1.002, setup.trend_low),
        };
        let sign = match setup.direction {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        let tp_limit1 = fib.limit1 + sign * delta / self.params.manage1;
        let tp_limit2 = fib.limit2 + sign * delta / self.params.manage2;

        let r_entry = (fib.entry - sl).abs() / fib.entry;
        let r_limit1 = (fib.limit1 - sl).abs() / fib.limit1;
        let r_limit2 = (fib.limit2 - sl).abs() / fib.limit2;

        let factor = self.params.entry_mult * r_entry + self.params.limit1_mult * r_limit1 + self.params.limit2_mult * r_limit2;
        if factor <= 0.0 {
            tracing::warn!(factor, "TCL sizing failure: risk factor <= 0");
            return None;
        }

        let risk_cap = (balance * self.params.risk_per_trade_pct / 100.0).min(balance * self.params.max_risk_pct / 100.0);
        let base_size = risk_cap / factor;

        Some(vec![
            Order::new(setup.direction, fib.entry, base_size * self.params.entry_mult, tp_entry, sl, OrderType::Entry),
            Order::new(setup.direction, fib.limit1, base_size * self.params.limit1_mult, tp_limit1, sl, OrderType::Limit1),
            Order::new(setup.direction, fib.limit2, base_size * self.params.limit2_mult, tp_limit2, sl, OrderType::Limit2),
        ])
    }

    pub fn manage_position(&self, position: &mut Position, candles: &CandleWindow) -> Vec<ManagementAction> {
        let mut actions = Vec::new();
        let current_price = match candles.last() {
            Some(c) => c.close,
            None => return actions,
        };

        if position.total_size > 0.0 {
            let unrealized_pct = match position.side {
                Side::Long => (current_price - position.avg_entry) / position.avg_entry * 100.0,
                Side::Short => (position.avg_entry - current_price) / position.avg_entry * 100.0,
            };
            let current_r = unrealized_pct / self.params.risk_per_trade_pct;
            if current_r < SCALE_IN_GATE_R {
                let mut cancelled_count = 0;
                for order in position.orders.iter_mut() {
                    if order.status == OrderStatus::Pending {
                        order.status = OrderStatus::Cancelled;
                        cancelled_count += 1;
                    }
                }
                if cancelled_count > 0 {
                    actions.push(ManagementAction::ScaleInCancelled { cancelled_count, current_r });
                }
                return actions;
            }
        }

        for idx in 0..position.orders.len() {
            let (should_fill, order_type, entry_price, tp) = {
                let order = &position.orders[idx];
                if order.status != OrderStatus::Pending {
                    continue;
                }
                let crossed = match position.side {
                    Side::Long => current_price <= order.entry_price,
                    Side::Short => current_price >= order.entry_price,
                };
                (crossed, order.order_type, order.entry_price, order.tp)
            };
            if should_fill {
                if position.fill_order(idx, entry_price).is_ok() {
                    position.tp = tp;
                    actions.push(ManagementAction::OrderFilled { order_type, price: entry_price });
                }
            }
        }

        if !position.sl_moved_to_be && position.total_size > 0.0 {
            let bars = candles.as_slice();
            let window_start = bars.len().saturating_sub(BREAKEVEN_LOOKBACK);
            let touched = match position.side {
                Side::Long => bars[window_start..].iter().any(|c| c.high >= position.avg_entry * (1.0 + BREAKEVEN_TRIGGER_PCT)),
                Side::Short => bars[window_start..].iter().any(|c| c.low <= position.avg_entry * (1.0 - BREAKEVEN_TRIGGER_PCT)),
            };
            if touched {
                let new_sl = match position.side {
                    Side::Long => position.avg_entry * 1.001,
                    Side::Short => position.avg_entry * 0.999,
                };
                actions.push(ManagementAction::SlMoved { old_sl: position.sl, new_sl, reason: SlMoveReason::Breakeven });
                position.sl = new_sl;
                position.sl_moved_to_be = true;
            }
        }

        actions
    }

    pub fn should_exit(&self, position: &Position, candles: &CandleWindow) -> Option<ExitReason> {
        if position.total_size <= 0.0 {
            return None;
        }
        let price = candles.last()?.close;
        match position.side {
            Side::Long => {
                if price >= position.tp {
                    Some(ExitReason::Tp)
                } else if price <= position.sl {
                    Some(ExitReason::Sl)
                } else {
                    None
                }
            }
            Side::Short => {
                if price <= position.tp {
                    Some(ExitReason::Tp)
                } else if price >= position.sl {
                    Some(ExitReason::Sl)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use approx::assert_relative_eq;

    fn candle(ts: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle { timestamp: ts, open, high, low, close, volume: 100.0 }
    }

    /// 250-bar steady uptrend, ~3% trend magnitude, strong ADX, no parabolic
    /// spikes, with a clean higher-high continuation break in the final 20
    /// bars.
    fn uptrend_window(bars: usize) -> CandleWindow {
        let mut w = CandleWindow::new();
        let mut price = 100.0;
        for i in 0..bars {
            let step = if i >= bars - 20 { 0.35 } else { 0.15 };
            price += step;
            let high = price + 0.3;
            let low = price - 0.3;
            w.push(candle(i as i64, price - step, high, low, price));
        }
        w
    }

    fn downtrend_window(bars: usize) -> CandleWindow {
        let mut w = CandleWindow::new();
        let mut price = 300.0;
        for i in 0..bars {
            let step = if i >= bars - 20 { 0.35 } else { 0.15 };
            price -= step;
            let high = price + 0.3;
            let low = price - 0.3;
            w.push(candle(i as i64, price + step, high, low, price));
        }
        w
    }

    #[test]
    fn detect_setup_requires_minimum_history() {
        let strat = TclStrategy::new(TclParams::default());
        let w = uptrend_window(150);
        assert!(strat.detect_setup(&w).is_none());
    }

    #[test]
    fn detect_setup_finds_long_continuation() {
        let strat = TclStrategy::new(TclParams::default());
        let w = uptrend_window(250);
        let setup = strat.detect_setup(&w);
        assert!(setup.is_some());
        assert_eq!(setup.unwrap().direction, Side::Long);
    }

    #[test]
    fn detect_setup_finds_short_continuation() {
        let strat = TclStrategy::new(TclParams::default());
        let w = downtrend_window(250);
        let setup = strat.detect_setup(&w);
        assert!(setup.is_some());
        assert_eq!(setup.unwrap().direction, Side::Short);
    }

    #[test]
    fn calculate_entries_sizes_stack_to_risk_cap() {
        let strat = TclStrategy::new(TclParams::default());
        let setup = TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 106.0,
            ema21: 105.0,
            ema50: 104.0,
            ema200: 102.0,
        };
        let orders = strat.calculate_entries(&setup, 10_000.0).unwrap();
        assert_eq!(orders.len(), 3);

        let risk_cap: f64 = 10_000.0 * 2.0 / 100.0;
        let mut worst_case_loss = 0.0;
        for order in &orders {
            let r = (order.entry_price - order.sl).abs() / order.entry_price;
            worst_case_loss += order.size_usd * r;
        }
        assert_relative_eq!(worst_case_loss, risk_cap, epsilon = 1e-6);
    }

    #[test]
    fn entry_only_fill_reaches_take_profit() {
        let strat = TclStrategy::new(TclParams::default());
        let setup = TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 106.0,
            ema21: 105.0,
            ema50: 104.0,
            ema200: 102.0,
        };
        let orders = strat.calculate_entries(&setup, 10_000.0).unwrap();
        let mut position = Position::new(
            crate::types::Strategy::Tcl,
            Side::Long,
            orders,
            0,
            crate::types::SetupKind::Tcl(setup.clone()),
        );

        let mut w = CandleWindow::new();
        w.push(candle(0, 104.0, 104.0, 102.0, 102.5)); // drifts toward entry fib
        let entry_fib_price = position.orders[0].entry_price;
        w.push(candle(1, 102.5, 103.0, entry_fib_price - 0.1, entry_fib_price));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[0].status, OrderStatus::Filled);
        assert_eq!(position.orders[1].status, OrderStatus::Pending);

        w.push(candle(2, entry_fib_price, 110.5, entry_fib_price, 110.5));
        strat.manage_position(&mut position, &w);
        let exit = strat.should_exit(&position, &w);
        assert_eq!(exit, Some(ExitReason::Tp));
    }

    #[test]
    fn scale_in_gate_cancels_remaining_orders() {
        // Built with explicit prices (rather than via calculate_entries)
        // so the percentage moves relative to `risk_per_trade_pct` land
        // precisely on either side of the -0.20R gate: limit1 fills at
        // about -0.19R on the entry leg (spec §4.3's calibration), and a
        // further drift to -0.25R (still short of limit2) cancels it.
        let strat = TclStrategy::new(TclParams::default());
        let setup = TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 106.0,
            ema21: 105.0,
            ema50: 104.0,
            ema200: 102.0,
        };
        let orders = vec![
            crate::types::Order::new(Side::Long, 100.0, 1000.0, 120.0, 90.0, OrderType::Entry),
            crate::types::Order::new(Side::Long, 99.62, 1000.0, 120.0, 90.0, OrderType::Limit1),
            crate::types::Order::new(Side::Long, 90.0, 1000.0, 120.0, 90.0, OrderType::Limit2),
        ];
        let mut position = Position::new(
            crate::types::Strategy::Tcl,
            Side::Long,
            orders,
            0,
            crate::types::SetupKind::Tcl(setup.clone()),
        );

        let mut w = CandleWindow::new();
        w.push(candle(0, 101.0, 101.0, 99.9, 100.0));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[0].status, OrderStatus::Filled);

        w.push(candle(1, 100.0, 100.0, 99.5, 99.62));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[1].status, OrderStatus::Filled);

        // avg_entry ~= 99.81; drift to current_r ~= -0.25 without
        // reaching limit2's price (90.0).
        let deep_price = position.avg_entry * (1.0 - 0.005);
        assert!(deep_price > 90.0);
        w.push(candle(2, 99.62, 99.62, deep_price, deep_price));
        let actions = strat.manage_position(&mut position, &w);

        assert_eq!(position.orders[2].status, OrderStatus::Cancelled);
        assert!(actions.iter().any(|a| matches!(a, ManagementAction::ScaleInCancelled { cancelled_count: 1, .. })));
    }

    #[test]
    fn all_three_fills_then_stop_loss_exit() {
        // Each leg's retreat stays under the -0.20R scale-in gate relative to
        // the avg_entry at that point, so all three orders fill before the
        // price finally breaks the shared SL.
        let strat = TclStrategy::new(TclParams::default());
        let setup = TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 106.0,
            ema21: 105.0,
            ema50: 104.0,
            ema200: 102.0,
        };
        let orders = vec![
            crate::types::Order::new(Side::Long, 100.0, 1000.0, 120.0, 90.0, OrderType::Entry),
            crate::types::Order::new(Side::Long, 99.7, 1000.0, 120.0, 90.0, OrderType::Limit1),
            crate::types::Order::new(Side::Long, 99.5, 1000.0, 120.0, 90.0, OrderType::Limit2),
        ];
        let mut position = Position::new(
            crate::types::Strategy::Tcl,
            Side::Long,
            orders,
            0,
            crate::types::SetupKind::Tcl(setup.clone()),
        );

        let mut w = CandleWindow::new();
        w.push(candle(0, 101.0, 101.0, 99.9, 100.0));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[0].status, OrderStatus::Filled);

        w.push(candle(1, 100.0, 100.0, 99.6, 99.7));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[1].status, OrderStatus::Filled);

        w.push(candle(2, 99.7, 99.7, 99.4, 99.5));
        strat.manage_position(&mut position, &w);
        assert_eq!(position.orders[2].status, OrderStatus::Filled);
        assert_relative_eq!(position.total_size, 3000.0, epsilon = 1e-9);

        w.push(candle(3, 99.5, 99.5, 89.0, 89.0));
        strat.manage_position(&mut position, &w);
        let exit = strat.should_exit(&position, &w);
        assert_eq!(exit, Some(ExitReason::Sl));
    }

    #[test]
    fn breakeven_migration_moves_sl_and_flags_applied() {
        let strat = TclStrategy::new(TclParams::default());
        let setup = TclSetup {
            direction: Side::Long,
            trend_high: 110.0,
            trend_low: 100.0,
            trend_pct: 3.0,
            adx: 30.0,
            ema9: 106.0,
            ema21: 105.0,
            ema50: 104.0,
            ema200: 102.0,
        };
        let orders = strat.calculate_entries(&setup, 10_000.0).unwrap();
        let entry_price = orders[0].entry_price;
        let mut position = Position::new(
            crate::types::Strategy::Tcl,
            Side::Long,
            orders,
            0,
            crate::types::SetupKind::Tcl(setup.clone()),
        );

        let mut w = CandleWindow::new();
        w.push(candle(0, entry_price + 1.0, entry_price + 1.0, entry_price - 0.1, entry_price));
        strat.manage_position(&mut position, &w);
        assert!(position.total_size > 0.0);

        let touch_price = position.avg_entry * 1.003;
        w.push(candle(1, entry_price, touch_price, entry_price, touch_price));
        let actions = strat.manage_position(&mut position, &w);
        assert!(actions.iter().any(|a| matches!(a, ManagementAction::SlMoved { reason: SlMoveReason::Breakeven, .. })));
        assert!(position.sl_moved_to_be);
        assert_relative_eq!(position.sl, position.avg_entry * 1.001, epsilon = 1e-9);
    }
}
