//! Pure indicator functions over candle arrays (§4.1). Every indicator is a
//! function of its input slices only — no internal state, no I/O. Sequence
//! indicators return one `Option<f64>` per input bar, `None` until enough
//! history exists, rather than a NaN sentinel, since Rust has no implicit-
//! NaN-as-absent idiom.

use crate::types::{ChochType, DivergenceType, Fvg, FvgType, Side};

/// Last-bar % change above which a move is considered parabolic.
pub const PARABOLIC_SINGLE_BAR_PCT: f64 = 5.0;
/// Cumulative % change over `PARABOLIC_CUMULATIVE_BARS` bars above which a
/// move is considered parabolic.
pub const PARABOLIC_CUMULATIVE_PCT: f64 = 8.0;
pub const PARABOLIC_CUMULATIVE_BARS: usize = 3;

/// Bounded lookback used by `detect_choch` and `detect_rsi_divergence` to
/// find the most recent confirmed swing-point pair (Open Question, §9).
pub const SWING_LOOKBACK: usize = 20;

/// Exponential moving average, smoothing factor 2/(n+1), seeded with the
/// simple mean of the first `n` values.
pub fn ema(values: &[f64], n: usize) -> Vec<Option<f64>> {
    let len = values.len();
    let mut out = vec![None; len];
    if n == 0 || len < n {
        return out;
    }
    let alpha = 2.0 / (n as f64 + 1.0);
    let seed = values[..n].iter().sum::<f64>() / n as f64;
    out[n - 1] = Some(seed);
    let mut prev = seed;
    for (i, &v) in values.iter().enumerate().skip(n) {
        let next = (v - prev) * alpha + prev;
        out[i] = Some(next);
        prev = next;
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Wilder's RSI. Gains/losses averaged with Wilder smoothing (alpha = 1/n).
/// Defined from index n onward.
pub fn rsi(values: &[f64], n: usize) -> Vec<Option<f64>> {
    let len = values.len();
    let mut out = vec![None; len];
    if n == 0 || len < n + 1 {
        return out;
    }
    let mut gains = vec![0.0; len];
    let mut losses = vec![0.0; len];
    for i in 1..len {
        let diff = values[i] - values[i - 1];
        gains[i] = diff.max(0.0);
        losses[i] = (-diff).max(0.0);
    }
    let mut avg_gain = gains[1..=n].iter().sum::<f64>() / n as f64;
    let mut avg_loss = losses[1..=n].iter().sum::<f64>() / n as f64;
    out[n] = Some(rsi_from_averages(avg_gain, avg_loss));
    for i in (n + 1)..len {
        avg_gain = (avg_gain * (n as f64 - 1.0) + gains[i]) / n as f64;
        avg_loss = (avg_loss * (n as f64 - 1.0) + losses[i]) / n as f64;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let len = high.len();
    let mut tr = vec![0.0; len];
    for i in 0..len {
        tr[i] = if i == 0 {
            high[i] - low[i]
        } else {
            (high[i] - low[i])
                .max((high[i] - close[i - 1]).abs())
                .max((low[i] - close[i - 1]).abs())
        };
    }
    tr
}

fn directional_moves(high: &[f64], low: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let len = high.len();
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }
    (plus_dm, minus_dm)
}

/// Wilder running-sum smoothing: seeded with the sum of the first `n`
/// values starting at index 1 (index 0 carries no prior-bar information),
/// defined from index n onward.
fn wilder_smooth_sum(values: &[f64], n: usize) -> Vec<Option<f64>> {
    let len = values.len();
    let mut out = vec![None; len];
    if n == 0 || len <= n {
        return out;
    }
    let seed: f64 = values[1..=n].iter().sum();
    out[n] = Some(seed);
    let mut prev = seed;
    for (i, &v) in values.iter().enumerate().skip(n + 1) {
        let next = prev - prev / n as f64 + v;
        out[i] = Some(next);
        prev = next;
    }
    out
}

/// Wilder's directional index: +DM/-DM/TR smoothed over n, DI derived, ADX
/// as the Wilder-smoothed average of DX = |+DI - -DI| / (+DI + -DI) * 100.
/// Defined from roughly index 2n onward (exactly index 2n-1 here: n bars to
/// seed the DM/TR sums, then n more DX values to seed the ADX average).
pub fn adx(high: &[f64], low: &[f64], close: &[f64], n: usize) -> Vec<Option<f64>> {
    let len = high.len();
    let mut out = vec![None; len];
    if n == 0 || len < 2 * n {
        return out;
    }

    let tr = true_range(high, low, close);
    let (plus_dm, minus_dm) = directional_moves(high, low);

    let smoothed_tr = wilder_smooth_sum(&tr, n);
    let smoothed_plus = wilder_smooth_sum(&plus_dm, n);
    let smoothed_minus = wilder_smooth_sum(&minus_dm, n);

    let mut dx = vec![None; len];
    for i in n..len {
        if let (Some(str_), Some(spl), Some(smi)) = (smoothed_tr[i], smoothed_plus[i], smoothed_minus[i]) {
            if str_ > 0.0 {
                let plus_di = 100.0 * spl / str_;
                let minus_di = 100.0 * smi / str_;
                let sum = plus_di + minus_di;
                dx[i] = Some(if sum > 0.0 { (plus_di - minus_di).abs() / sum * 100.0 } else { 0.0 });
            }
        }
    }

    let first_adx = 2 * n - 1;
    if len <= first_adx {
        return out;
    }
    let seed_slice: Vec<f64> = dx[n..=first_adx].iter().filter_map(|v| *v).collect();
    if seed_slice.len() < n {
        return out;
    }
    let mut prev = seed_slice.iter().sum::<f64>() / n as f64;
    out[first_adx] = Some(prev);
    for i in (first_adx + 1)..len {
        if let Some(dx_val) = dx[i] {
            let next = (prev * (n as f64 - 1.0) + dx_val) / n as f64;
            out[i] = Some(next);
            prev = next;
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FibLevels {
    pub entry: f64,
    pub limit1: f64,
    pub limit2: f64,
}

/// Fibonacci retracement levels at caller-supplied ratios of the high->low
/// range (defaults 0.236/0.382/0.618). For longs these are pullback prices
/// below `high`; for shorts, pullup prices above `low`.
pub fn fibonacci_retracement(
    high: f64,
    low: f64,
    direction: Side,
    entry_fib: f64,
    limit1_fib: f64,
    limit2_fib: f64,
) -> FibLevels {
    let range = high - low;
    match direction {
        Side::Long => FibLevels {
            entry: high - entry_fib * range,
            limit1: high - limit1_fib * range,
            limit2: high - limit2_fib * range,
        },
        Side::Short => FibLevels {
            entry: low + entry_fib * range,
            limit1: low + limit1_fib * range,
            limit2: low + limit2_fib * range,
        },
    }
}

/// EMA alignment trend classifier on the latest bar.
pub fn detect_trend(
    close: f64,
    ema9: Option<f64>,
    ema21: Option<f64>,
    ema50: Option<f64>,
    ema200: Option<f64>,
) -> Option<Side> {
    let (e9, e21, e50, e200) = (ema9?, ema21?, ema50?, ema200?);
    if e9 > e21 && e21 > e50 && e50 > e200 && close > e9 {
        Some(Side::Long)
    } else if e9 < e21 && e21 < e50 && e50 < e200 && close < e9 {
        Some(Side::Short)
    } else {
        None
    }
}

/// Max high / min low over the last `lookback` bars. `direction` is
/// accepted for symmetry with the call sites; both extrema are always
/// returned.
pub fn find_trend_extremes(high: &[f64], low: &[f64], _direction: Side, lookback: usize) -> (f64, f64) {
    let n = high.len().min(low.len());
    let start = n.saturating_sub(lookback);
    let max_high = high[start..n].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_low = low[start..n].iter().cloned().fold(f64::INFINITY, f64::min);
    (max_high, min_low)
}

pub fn trend_magnitude(high: f64, low: f64) -> f64 {
    (high - low) / low * 100.0
}

/// True iff the latest bar's % change exceeds `PARABOLIC_SINGLE_BAR_PCT`, or
/// the cumulative % change over the last `PARABOLIC_CUMULATIVE_BARS` bars
/// exceeds `PARABOLIC_CUMULATIVE_PCT`.
pub fn is_parabolic(close: &[f64]) -> bool {
    let n = close.len();
    if n < 2 {
        return false;
    }
    let last_change_pct = (close[n - 1] - close[n - 2]).abs() / close[n - 2] * 100.0;
    if last_change_pct > PARABOLIC_SINGLE_BAR_PCT {
        return true;
    }
    if n > PARABOLIC_CUMULATIVE_BARS {
        let base = close[n - 1 - PARABOLIC_CUMULATIVE_BARS];
        let cumulative_pct = (close[n - 1] - base).abs() / base * 100.0;
        if cumulative_pct > PARABOLIC_CUMULATIVE_PCT {
            return true;
        }
    }
    false
}

/// Every Fair Value Gap within the last `lookback` bars, oldest first.
/// Bullish FVG at bar i (2 <= i < len): `low[i] > high[i-2]`, zone
/// `[high[i-2], low[i]]`. Bearish: `high[i] < low[i-2]`, zone
/// `[high[i], low[i-2]]`.
pub fn detect_fvgs(high: &[f64], low: &[f64], lookback: usize) -> Vec<Fvg> {
    let len = high.len().min(low.len());
    if len < 3 {
        return Vec::new();
    }
    let start = len.saturating_sub(lookback).max(2);
    let mut out = Vec::new();
    for i in start..len {
        if low[i] > high[i - 2] {
            let bottom = high[i - 2];
            let top = low[i];
            out.push(Fvg {
                fvg_type: FvgType::Bullish,
                bottom,
                top,
                midpoint: (bottom + top) / 2.0,
                impulse_index: i - 1,
            });
        } else if high[i] < low[i - 2] {
            let bottom = high[i];
            let top = low[i - 2];
            out.push(Fvg {
                fvg_type: FvgType::Bearish,
                bottom,
                top,
                midpoint: (bottom + top) / 2.0,
                impulse_index: i - 1,
            });
        }
    }
    out
}

fn swing_highs(high: &[f64], start: usize, end: usize) -> Vec<(usize, f64)> {
    let mut out = Vec::new();
    for i in start.max(1)..end.saturating_sub(1) {
        if high[i] > high[i - 1] && high[i] > high[i + 1] {
            out.push((i, high[i]));
        }
    }
    out
}

fn swing_lows(low: &[f64], start: usize, end: usize) -> Vec<(usize, f64)> {
    let mut out = Vec::new();
    for i in start.max(1)..end.saturating_sub(1) {
        if low[i] < low[i - 1] && low[i] < low[i + 1] {
            out.push((i, low[i]));
        }
    }
    out
}

/// Change of Character: a break of the prior opposite swing point against
/// the prevailing micro-trend, scanned over the last `SWING_LOOKBACK` bars.
/// Micro-trend is read off the two most recent swing highs and swing lows
/// (both rising = bullish, both falling = bearish, otherwise undefined).
pub fn detect_choch(high: &[f64], low: &[f64], close: &[f64]) -> Option<ChochType> {
    let len = high.len().min(low.len()).min(close.len());
    if len < 5 {
        return None;
    }
    let start = len.saturating_sub(SWING_LOOKBACK);
    let highs = swing_highs(high, start, len);
    let lows = swing_lows(low, start, len);
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }
    let (_, h_prev) = highs[highs.len() - 2];
    let (_, h_last) = highs[highs.len() - 1];
    let (l_prev_idx, l_prev) = lows[lows.len() - 2];
    let (l_last_idx, l_last) = lows[lows.len() - 1];

    let micro_trend_bullish = h_last > h_prev && l_last > l_prev;
    let micro_trend_bearish = h_last < h_prev && l_last < l_prev;

    let current_close = close[len - 1];
    if micro_trend_bullish {
        let recent_swing_low = if l_last_idx > l_prev_idx { l_last } else { l_prev };
        if current_close < recent_swing_low {
            return Some(ChochType::Bearish);
        }
    } else if micro_trend_bearish {
        let (h_prev_idx, _) = highs[highs.len() - 2];
        let (h_last_idx, _) = highs[highs.len() - 1];
        let recent_swing_high = if h_last_idx > h_prev_idx { h_last } else { h_prev };
        if current_close > recent_swing_high {
            return Some(ChochType::Bullish);
        }
    }
    None
}

/// Bullish divergence: price makes a lower low while RSI makes a higher
/// low, across the two most recent swing lows within `SWING_LOOKBACK`
/// bars. Bearish: symmetric on swing highs.
pub fn detect_rsi_divergence(close: &[f64], rsi_values: &[Option<f64>]) -> Option<DivergenceType> {
    let len = close.len().min(rsi_values.len());
    if len < 5 {
        return None;
    }
    let start = len.saturating_sub(SWING_LOOKBACK);

    let lows: Vec<(usize, f64)> = swing_lows(close, start, len)
        .into_iter()
        .filter(|(i, _)| rsi_values[*i].is_some())
        .collect();
    if lows.len() >= 2 {
        let (i1, p1) = lows[lows.len() - 2];
        let (i2, p2) = lows[lows.len() - 1];
        let (r1, r2) = (rsi_values[i1].unwrap(), rsi_values[i2].unwrap());
        if p2 < p1 && r2 > r1 {
            return Some(DivergenceType::Bullish);
        }
    }

    let highs: Vec<(usize, f64)> = swing_highs(close, start, len)
        .into_iter()
        .filter(|(i, _)| rsi_values[*i].is_some())
        .collect();
    if highs.len() >= 2 {
        let (i1, p1) = highs[highs.len() - 2];
        let (i2, p2) = highs[highs.len() - 1];
        let (r1, r2) = (rsi_values[i1].unwrap(), rsi_values[i2].unwrap());
        if p2 > p1 && r2 < r1 {
            return Some(DivergenceType::Bearish);
        }
    }

    None
}
