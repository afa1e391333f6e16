// src/scheduler.rs
//! Periodic check loops. Each loop awaits its own cycle to completion, so a
//! slow provider call delays the next tick instead of overlapping it; the
//! coordinator's lock serializes against manual checks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::coordinator::Coordinator;

pub fn spawn_news_loop(coordinator: Arc<Coordinator>) -> JoinHandle<()> {
    let period = std::time::Duration::from_secs(coordinator.config().news_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = coordinator.run_news_cycle(false).await;
            tracing::info!(
                target: "scheduler",
                kept = report.kept_items,
                delivered = report.delivered,
                queued = report.queued,
                flushed = report.flushed,
                "news cycle"
            );
        }
    })
}

pub fn spawn_stock_loop(coordinator: Arc<Coordinator>) -> JoinHandle<()> {
    let period = std::time::Duration::from_secs(coordinator.config().stock_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = coordinator.run_stock_cycle(false).await;
            tracing::info!(
                target: "scheduler",
                buckets = report.buckets_fired,
                delivered = report.delivered,
                queued = report.queued,
                flushed = report.flushed,
                "stock cycle"
            );
        }
    })
}
