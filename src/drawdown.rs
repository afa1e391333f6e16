//! # Drawdown Tracker
//! Pure logic that maps a stream of price samples to at most one
//! "newly crossed drawdown bucket" event per observation.
//!
//! A bucket is a fixed 1-point-wide drop interval past the start threshold,
//! half-open: `[start + k*step, start + (k+1)*step)`. Each bucket fires at
//! most once per episode; a strict new all-time high starts a new episode
//! and re-arms every bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert thresholds. The original bot alerted from 5% off the all-time
/// high in 1-point steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DrawdownParams {
    pub start_pct: f64,
    pub step_pct: f64,
}

impl Default for DrawdownParams {
    fn default() -> Self {
        Self {
            start_pct: 5.0,
            step_pct: 1.0,
        }
    }
}

/// Per-instrument running state. `peak` only increases; `last_bucket` never
/// decreases within an episode and resets to `None` on a strict new high.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DrawdownState {
    pub peak: f64,
    pub last_bucket: Option<u32>,
    pub peak_at: Option<DateTime<Utc>>,
}

/// A newly reached bucket, with the figures needed to render the alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownEvent {
    pub bucket: u32,
    pub drop_pct: f64,
    pub price: f64,
    pub peak: f64,
}

/// Fold one price sample into the state.
///
/// Fast drops may skip intermediate buckets silently; only the highest
/// newly reached bucket fires. Oscillation within an already-notified
/// bucket produces nothing.
pub fn observe(
    state: &mut DrawdownState,
    price: f64,
    now: DateTime<Utc>,
    params: &DrawdownParams,
) -> Option<DrawdownEvent> {
    if !price.is_finite() || price <= 0.0 {
        tracing::warn!(price, "ignoring non-positive price sample");
        return None;
    }

    if price > state.peak {
        // New episode: 0% drawdown right now, every bucket re-armed.
        state.peak = price;
        state.peak_at = Some(now);
        state.last_bucket = None;
        return None;
    }

    let drop_pct = ((state.peak - price) / state.peak * 100.0).max(0.0);
    if drop_pct < params.start_pct {
        return None;
    }

    let current = ((drop_pct - params.start_pct) / params.step_pct).floor() as u32;
    let already = state.last_bucket.map(|b| b as i64).unwrap_or(-1);
    if (current as i64) <= already {
        return None;
    }

    state.last_bucket = Some(current);
    Some(DrawdownEvent {
        bucket: current,
        drop_pct,
        price,
        peak: state.peak,
    })
}

impl DrawdownEvent {
    /// Absolute drop level in whole percent, the way the original bot
    /// labelled alerts ("N% off the all-time high").
    pub fn level_pct(&self, params: &DrawdownParams) -> f64 {
        params.start_pct + self.bucket as f64 * params.step_pct
    }
}
