//! # Notification Coordinator
//! Per-cycle orchestration: providers -> dedup/tracker -> quiet gate ->
//! transport, with state persisted after every cycle.
//!
//! The coordinator owns the single mutable engine state behind one async
//! lock; scheduled and manual cycles both go through it, so there is no
//! hidden global and no concurrent writer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::dedup::{Deduplicator, SeenHistory};
use crate::drawdown::{observe, DrawdownState};
use crate::notify::{
    render_drop_alert, render_news_digest, NotificationPayload, Notifier, PayloadKind,
};
use crate::providers::{NewsProvider, PriceProvider};
use crate::quiet::{GateAction, QuietGate};
use crate::similarity::TokenSetScorer;
use crate::store::{self, StateStore, KEY_DRAWDOWN, KEY_QUIET_GATE, KEY_SEEN_HISTORY};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notifier_cycles_total", "Check cycles run, by kind.");
        describe_counter!("news_candidates_total", "Raw items returned by the news provider.");
        describe_counter!("news_kept_total", "Items that survived deduplication.");
        describe_counter!("drawdown_events_total", "Newly crossed drawdown buckets.");
        describe_counter!("provider_errors_total", "News/price provider failures.");
        describe_counter!("gate_queued_total", "Payloads queued by the quiet gate.");
        describe_counter!("gate_flushed_total", "Payloads flushed after a quiet window.");
        describe_counter!("delivery_failures_total", "Transport rejections (requeued).");
        describe_gauge!("gate_pending", "Payloads currently waiting in the gate.");
        describe_gauge!("notifier_last_cycle_ts", "Unix ts of the last finished cycle.");
    });
}

/// Mutable engine state, threaded through each cycle and persisted whole.
#[derive(Debug, Default)]
pub struct EngineState {
    pub histories: HashMap<String, SeenHistory>,
    pub drawdown: DrawdownState,
    pub gate: QuietGate,
    pub last_news_cycle: Option<DateTime<Utc>>,
    pub last_stock_cycle: Option<DateTime<Utc>>,
}

/// What one cycle did; returned to manual callers and asserted in tests.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct CycleReport {
    pub kept_items: usize,
    pub buckets_fired: usize,
    pub delivered: usize,
    pub queued: usize,
    pub flushed: usize,
}

/// Read-only snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub keywords: Vec<String>,
    pub instrument: String,
    pub pending: usize,
    pub drawdown: DrawdownState,
    pub last_news_cycle: Option<DateTime<Utc>>,
    pub last_stock_cycle: Option<DateTime<Utc>>,
}

pub struct Coordinator {
    cfg: AppConfig,
    news: Arc<dyn NewsProvider>,
    price: Arc<dyn PriceProvider>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    dedup: Deduplicator,
    state: Mutex<EngineState>,
}

impl Coordinator {
    pub fn new(
        cfg: AppConfig,
        news: Arc<dyn NewsProvider>,
        price: Arc<dyn PriceProvider>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        ensure_metrics_described();
        let dedup = Deduplicator::new(Box::new(TokenSetScorer), cfg.similarity_cutoff);
        let gate = QuietGate::new(cfg.quiet);
        Self {
            cfg,
            news,
            price,
            notifier,
            store,
            dedup,
            state: Mutex::new(EngineState {
                gate,
                ..EngineState::default()
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Restore persisted state; missing or corrupt keys keep their fresh
    /// defaults. Configured values win over persisted ones so a config edit
    /// takes effect on restart: the quiet window replaces the stored hours
    /// (queued payloads survive) and history bounds are re-applied to every
    /// restored keyword.
    pub async fn restore(&self) {
        let mut st = self.state.lock().await;
        if let Some(mut h) =
            store::load_json::<HashMap<String, SeenHistory>>(self.store.as_ref(), KEY_SEEN_HISTORY)
                .await
        {
            for history in h.values_mut() {
                history.set_bounds(self.cfg.history_cap, self.cfg.history_max_age_secs);
            }
            st.histories = h;
        }
        if let Some(d) = store::load_json::<DrawdownState>(self.store.as_ref(), KEY_DRAWDOWN).await
        {
            st.drawdown = d;
        }
        if let Some(g) = store::load_json::<QuietGate>(self.store.as_ref(), KEY_QUIET_GATE).await {
            st.gate = g;
            st.gate.set_window(self.cfg.quiet);
        }
        tracing::info!(
            keywords = st.histories.len(),
            pending = st.gate.pending_len(),
            "engine state restored"
        );
    }

    /// One news check cycle. Manual cycles bypass the quiet gate.
    pub async fn run_news_cycle(&self, manual: bool) -> CycleReport {
        let now = Utc::now();
        let mut report = CycleReport::default();
        let mut st = self.state.lock().await;

        for keyword in &self.cfg.keywords {
            let candidates = match self.news.search(keyword).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(keyword, error = ?e, "news provider failed, empty result");
                    counter!("provider_errors_total").increment(1);
                    continue;
                }
            };
            counter!("news_candidates_total").increment(candidates.len() as u64);

            let history = st
                .histories
                .entry(keyword.clone())
                .or_insert_with(|| SeenHistory::new(self.cfg.history_cap, self.cfg.history_max_age_secs));
            let kept = self.dedup.filter_new(now, candidates, history);
            if kept.is_empty() {
                continue;
            }
            counter!("news_kept_total").increment(kept.len() as u64);
            report.kept_items += kept.len();

            let payload = NotificationPayload {
                kind: PayloadKind::News,
                text: render_news_digest(keyword, &kept),
                ts: now,
            };
            self.dispatch(&mut st, payload, manual, now, &mut report).await;
        }

        self.flush_pending(&mut st, now, &mut report).await;
        st.last_news_cycle = Some(now);
        self.persist(&st).await;
        self.finish_cycle("news", &st, now);
        report
    }

    /// One price check cycle. A provider failure skips the observation and
    /// leaves tracker state untouched.
    pub async fn run_stock_cycle(&self, manual: bool) -> CycleReport {
        let now = Utc::now();
        let mut report = CycleReport::default();
        let mut st = self.state.lock().await;

        match self.price.quote(&self.cfg.instrument).await {
            Ok(price) => {
                if let Some(event) = observe(&mut st.drawdown, price, now, &self.cfg.drawdown) {
                    counter!("drawdown_events_total").increment(1);
                    report.buckets_fired += 1;
                    tracing::info!(
                        bucket = event.bucket,
                        drop_pct = event.drop_pct,
                        "drawdown bucket crossed"
                    );
                    let payload = NotificationPayload {
                        kind: PayloadKind::Stock,
                        text: render_drop_alert(&event, &self.cfg.instrument, &self.cfg.drawdown),
                        ts: now,
                    };
                    self.dispatch(&mut st, payload, manual, now, &mut report).await;
                }
            }
            Err(e) => {
                tracing::warn!(instrument = %self.cfg.instrument, error = ?e, "price provider failed, observation skipped");
                counter!("provider_errors_total").increment(1);
            }
        }

        self.flush_pending(&mut st, now, &mut report).await;
        st.last_stock_cycle = Some(now);
        self.persist(&st).await;
        self.finish_cycle("stock", &st, now);
        report
    }

    pub async fn status(&self) -> StatusSnapshot {
        let st = self.state.lock().await;
        StatusSnapshot {
            keywords: self.cfg.keywords.clone(),
            instrument: self.cfg.instrument.clone(),
            pending: st.gate.pending_len(),
            drawdown: st.drawdown.clone(),
            last_news_cycle: st.last_news_cycle,
            last_stock_cycle: st.last_stock_cycle,
        }
    }

    /// Route one payload: manual cycles deliver directly; scheduled cycles
    /// ask the gate first. A transport rejection requeues the payload, it
    /// is never dropped.
    async fn dispatch(
        &self,
        st: &mut EngineState,
        payload: NotificationPayload,
        manual: bool,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        if !manual {
            match st.gate.submit(payload.clone(), now) {
                GateAction::Queued => {
                    counter!("gate_queued_total").increment(1);
                    report.queued += 1;
                    return;
                }
                GateAction::DeliverNow => {}
            }
        }
        match self.notifier.deliver(&payload).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(via = self.notifier.name(), error = ?e, "delivery failed, requeued");
                counter!("delivery_failures_total").increment(1);
                st.gate.requeue(payload);
            }
        }
    }

    /// Edge-triggered replay: deliver everything the gate releases, in
    /// order. On the first failure the failed payload and the rest go back
    /// to the front of the queue so order is preserved for the next flush.
    async fn flush_pending(
        &self,
        st: &mut EngineState,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let flushed = st.gate.tick(now);
        if flushed.is_empty() {
            return;
        }
        counter!("gate_flushed_total").increment(flushed.len() as u64);
        report.flushed += flushed.len();

        let mut iter = flushed.into_iter();
        while let Some(payload) = iter.next() {
            if let Err(e) = self.notifier.deliver(&payload).await {
                tracing::warn!(via = self.notifier.name(), error = ?e, "flush delivery failed, remainder requeued");
                counter!("delivery_failures_total").increment(1);
                let mut rest = vec![payload];
                rest.extend(iter);
                st.gate.requeue_front(rest);
                return;
            }
            report.delivered += 1;
        }
    }

    /// Best-effort persistence; a store failure is recovered by retrying
    /// next cycle with the in-memory state.
    async fn persist(&self, st: &EngineState) {
        if let Err(e) = store::save_json(self.store.as_ref(), KEY_SEEN_HISTORY, &st.histories).await
        {
            tracing::warn!(error = ?e, "persisting seen history failed");
        }
        if let Err(e) = store::save_json(self.store.as_ref(), KEY_DRAWDOWN, &st.drawdown).await {
            tracing::warn!(error = ?e, "persisting drawdown state failed");
        }
        if let Err(e) = store::save_json(self.store.as_ref(), KEY_QUIET_GATE, &st.gate).await {
            tracing::warn!(error = ?e, "persisting quiet gate failed");
        }
    }

    fn finish_cycle(&self, kind: &'static str, st: &EngineState, now: DateTime<Utc>) {
        counter!("notifier_cycles_total", "kind" => kind).increment(1);
        gauge!("gate_pending").set(st.gate.pending_len() as f64);
        gauge!("notifier_last_cycle_ts").set(now.timestamp() as f64);
    }
}
