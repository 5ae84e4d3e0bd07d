//! Append-only candle window with the same duplicate-timestamp replacement
//! rule as a live-updating WS candle buffer, generalized to an unbounded
//! window since indicators here read back hundreds of bars (TCL needs 200+)
//! rather than a fixed-depth buffer.

use crate::types::Candle;

/// Ordered, oldest-first sequence of candles. Pushing a candle whose
/// timestamp matches the current last candle replaces it in place (a
/// live-updating bar), matching §6 "Duplicate timestamps must be
/// deduplicated by the source".
#[derive(Clone, Debug, Default)]
pub struct CandleWindow {
    candles: Vec<Candle>,
}

impl CandleWindow {
    pub fn new() -> Self {
        CandleWindow { candles: Vec::new() }
    }

    pub fn push(&mut self, candle: Candle) {
        if let Some(last) = self.candles.last_mut() {
            if last.timestamp == candle.timestamp {
                *last = candle;
                return;
            }
        }
        self.candles.push(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.open).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}
