//! # Quiet-Hours Gate
//! Classifies each outbound payload as "deliver now" or "queue until the
//! window closes". The gate is a plain state machine driven by synthetic
//! `now` values, so it is testable without any timer.
//!
//! Delivery-failure requeues re-enter the same queue, so a failed payload
//! shows up again in the next flush instead of vanishing.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::notify::NotificationPayload;

/// Wall-clock do-not-disturb window at hour granularity.
/// `start_hour > end_hour` means the window wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuietWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
        }
    }

    /// Membership in `[start, end)` on a 24h clock, wrapping at midnight.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let h = now.hour();
        if self.start_hour == self.end_hour {
            // Degenerate zero-length window: never quiet.
            return false;
        }
        if self.start_hour < self.end_hour {
            self.start_hour <= h && h < self.end_hour
        } else {
            h >= self.start_hour || h < self.end_hour
        }
    }
}

/// What `submit` decided for a payload.
#[derive(Debug, PartialEq, Eq)]
pub enum GateAction {
    DeliverNow,
    Queued,
}

/// Gate state plus the pending queue; serialized as a whole so queued
/// payloads survive restarts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuietGate {
    window: Option<QuietWindow>,
    pending: VecDeque<NotificationPayload>,
    was_quiet: bool,
}

impl QuietGate {
    pub fn new(window: Option<QuietWindow>) -> Self {
        Self {
            window,
            pending: VecDeque::new(),
            was_quiet: false,
        }
    }

    /// Reconfiguring hours never reorders or drops already-queued items.
    pub fn set_window(&mut self, window: Option<QuietWindow>) {
        self.window = window;
    }

    pub fn window(&self) -> Option<QuietWindow> {
        self.window
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        self.window.map(|w| w.contains(now)).unwrap_or(false)
    }

    /// Queue the payload if inside the window, otherwise hand it back for
    /// immediate delivery. Manual checks skip the gate entirely and never
    /// call this.
    pub fn submit(&mut self, payload: NotificationPayload, now: DateTime<Utc>) -> GateAction {
        if self.is_quiet(now) {
            self.pending.push_back(payload);
            GateAction::Queued
        } else {
            GateAction::DeliverNow
        }
    }

    /// Put a payload whose delivery failed back at the end of the queue.
    pub fn requeue(&mut self, payload: NotificationPayload) {
        self.pending.push_back(payload);
    }

    /// Front-load requeue preserving the original relative order of a
    /// partially delivered flush.
    pub fn requeue_front(&mut self, payloads: Vec<NotificationPayload>) {
        for p in payloads.into_iter().rev() {
            self.pending.push_front(p);
        }
    }

    /// Called once per scheduler cycle. Drains the queue, in insertion
    /// order, whenever the current time is outside the window. The edge
    /// case this covers beyond the plain true-to-false transition: requeued
    /// delivery failures and a restart after the window already closed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<NotificationPayload> {
        let quiet = self.is_quiet(now);
        let flushed = if !quiet && !self.pending.is_empty() {
            self.pending.drain(..).collect()
        } else {
            Vec::new()
        };
        if self.was_quiet != quiet {
            tracing::info!(quiet, flushed = flushed.len(), "quiet window edge");
        }
        self.was_quiet = quiet;
        flushed
    }
}
