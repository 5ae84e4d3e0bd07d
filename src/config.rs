//! Strategy parameter sets with the §4.3/§4.4 defaults, generalized from a
//! hardcoded per-symbol const table into serde-friendly structs an external
//! config loader (out of scope, §1) can populate from TOML/JSON/env — no
//! file format is mandated here.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TclParams {
    pub min_trend_pct: f64,
    pub min_adx: f64,
    pub adx_period: usize,
    pub risk_per_trade_pct: f64,
    pub max_risk_pct: f64,
    pub entry_mult: f64,
    pub limit1_mult: f64,
    pub limit2_mult: f64,
    pub entry_fib: f64,
    pub limit1_fib: f64,
    pub limit2_fib: f64,
    pub manage1: f64,
    pub manage2: f64,
}

impl Default for TclParams {
    fn default() -> Self {
        TclParams {
            min_trend_pct: 2.0,
            min_adx: 20.0,
            adx_period: 14,
            risk_per_trade_pct: 2.0,
            max_risk_pct: 50.0,
            entry_mult: 1.0,
            limit1_mult: 3.0,
            limit2_mult: 2.0,
            entry_fib: 0.236,
            limit1_fib: 0.382,
            limit2_fib: 0.618,
            manage1: 4.0,
            manage2: 7.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmogParams {
    pub adx_threshold: f64,
    pub adx_period: usize,
    pub rsi_period: usize,
    pub min_rr: f64,
    pub risk_per_trade_pct: f64,
    pub fib_min_level: f64,
}

impl Default for SmogParams {
    fn default() -> Self {
        SmogParams {
            adx_threshold: 25.0,
            adx_period: 14,
            rsi_period: 14,
            min_rr: 4.0,
            risk_per_trade_pct: 1.5,
            fib_min_level: 0.5,
        }
    }
}
