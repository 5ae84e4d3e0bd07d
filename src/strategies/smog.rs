//! SMOG (Smart Money OG): reversal strategy trading divergence + ChoCH +
//! FVG confluence in ranging markets. Single-order plan, FVG-trailed stop.

use crate::candle::CandleWindow;
use crate::config::SmogParams;
use crate::events::SlMoveReason;
use crate::indicators;
use crate::position::Position;
use crate::strategies::ManagementAction;
use crate::types::{ExitReason, Fvg, FvgType, Order, OrderStatus, OrderType, Side, SmogSetup};

const MIN_BARS: usize = 50;
const FVG_LOOKBACK: usize = 20;
const TRAIL_LOOKBACK: usize = 10;

pub struct SmogStrategy {
    pub params: SmogParams,
}

impl SmogStrategy {
    pub fn new(params: SmogParams) -> Self {
        SmogStrategy { params }
    }

    /// Requires >= 50 bars. ADX below threshold (ranging), a defined RSI
    /// divergence, a ChoCH whose polarity matches the divergence, and a
    /// matching-polarity FVG in the lookback window (most recent used).
    pub fn detect_setup(&self, candles: &CandleWindow) -> Option<SmogSetup> {
        let len = candles.len();
        if len < MIN_BARS {
            return None;
        }
        let closes = candles.closes();
        let highs = candles.highs();
        let lows = candles.lows();
        let last = len - 1;

        let adx_values = indicators::adx(&highs, &lows, &closes, self.params.adx_period);
        let adx_last = adx_values[last]?;
        if adx_last >= self.params.adx_threshold {
            return None;
        }

        let rsi_values = indicators::rsi(&closes, self.params.rsi_period);
        let rsi_last = rsi_values[last]?;

        let divergence = indicators::detect_rsi_divergence(&closes, &rsi_values)?;

        let choch = indicators::detect_choch(&highs, &lows, &closes)?;
        if !choch.matches_divergence(divergence) {
            return None;
        }

        let direction = divergence.to_side();
        let fvg_type = if direction == Side::Long { FvgType::Bullish } else { FvgType::Bearish };
        let fvg = indicators::detect_fvgs(&highs, &lows, FVG_LOOKBACK)
            .into_iter()
            .filter(|f| f.fvg_type == fvg_type)
            .last()?;

        Some(SmogSetup { direction, adx: adx_last, rsi: rsi_last, divergence, choch, fvg })
    }

    /// `entry = fvg.midpoint`; `tp` set for reward:risk = `min_rr`. Single
    /// order; sizing is `risk_usd / sl_distance_fraction`.
    pub fn calculate_entries(&self, setup: &SmogSetup, balance: f64) -> Option<Vec<Order>> {
        let entry = setup.fvg.midpoint;
        let sl = match setup.direction {
            Side::Long => setup.fvg.bottom * 0.999,
            Side::Short => setup.fvg.top * 1.001,
        };
        let sl_distance = (entry - sl).abs();
        if sl_distance <= 0.0 || entry <= 0.0 {
            tracing::warn!("SMOG sizing failure: non-positive SL distance");
            return None;
        }
        let tp = match setup.direction {
            Side::Long => entry + self.params.min_rr * sl_distance,
            Side::Short => entry - self.params.min_rr * sl_distance,
        };

        let risk_usd = balance * self.params.risk_per_trade_pct / 100.0;
        let size_usd = risk_usd / (sl_distance / entry);

        Some(vec![Order::new(setup.direction, entry, size_usd, tp, sl, OrderType::Entry)])
    }

    pub fn manage_position(&self, position: &mut Position, candles: &CandleWindow) -> Vec<ManagementAction> {
        let mut actions = Vec::new();
        let current_price = match candles.last() {
            Some(c) => c.close,
            None => return actions,
        };

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

        if position.total_size > 0.0 {
            let highs = candles.highs();
            let lows = candles.lows();
            let fvgs: Vec<Fvg> = indicators::detect_fvgs(&highs, &lows, TRAIL_LOOKBACK);
            let matching_type = match position.side {
                Side::Long => FvgType::Bullish,
                Side::Short => FvgType::Bearish,
            };
            if let Some(fvg) = fvgs.into_iter().filter(|f| f.fvg_type == matching_type).last() {
                let candidate = match position.side {
                    Side::Long => fvg.bottom,
                    Side::Short => fvg.top,
                };
                let improves = match position.side {
                    Side::Long => candidate > position.sl,
                    Side::Short => candidate < position.sl,
                };
                if improves {
                    actions.push(ManagementAction::SlMoved { old_sl: position.sl, new_sl: candidate, reason: SlMoveReason::FvgTrail });
                    position.sl = candidate;
                }
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
