// tests/coordinator_cycle.rs
// End-to-end cycles against mock providers, transport and store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{Timelike, Utc};
use telenews_notifier::config::AppConfig;
use telenews_notifier::coordinator::Coordinator;
use telenews_notifier::dedup::NewsItem;
use telenews_notifier::notify::{NotificationPayload, Notifier};
use telenews_notifier::providers::{NewsProvider, PriceProvider};
use telenews_notifier::quiet::QuietWindow;
use telenews_notifier::store::StateStore;

// --- mocks -----------------------------------------------------------------

struct StaticNews {
    items: Vec<NewsItem>,
}

#[async_trait::async_trait]
impl NewsProvider for StaticNews {
    async fn search(&self, _keyword: &str) -> Result<Vec<NewsItem>> {
        Ok(self.items.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

struct FailingNews;

#[async_trait::async_trait]
impl NewsProvider for FailingNews {
    async fn search(&self, _keyword: &str) -> Result<Vec<NewsItem>> {
        Err(anyhow!("connect timeout"))
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Returns queued prices in order; errors once the script runs out.
struct ScriptedPrice {
    prices: Mutex<VecDeque<f64>>,
}

impl ScriptedPrice {
    fn new(prices: &[f64]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().copied().collect()),
        }
    }
}

#[async_trait::async_trait]
impl PriceProvider for ScriptedPrice {
    async fn quote(&self, _instrument: &str) -> Result<f64> {
        self.prices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("quote feed exhausted"))
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
    fail_remaining: Mutex<u32>,
}

impl RecordingNotifier {
    fn failing_first(n: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_remaining: Mutex::new(n),
        }
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|p| p.text.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<()> {
        {
            let mut fails = self.fail_remaining.lock().unwrap();
            if *fails > 0 {
                *fails -= 1;
                return Err(anyhow!("transport rejected payload"));
            }
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Default)]
struct MemStore {
    map: Mutex<HashMap<String, String>>,
}

/// In-memory store whose saves fail while the flag is set.
struct FlakyStore {
    map: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
}

impl FlakyStore {
    fn new(failing: bool) -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            failing: Mutex::new(failing),
        }
    }

    fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }
}

#[async_trait::async_trait]
impl StateStore for FlakyStore {
    async fn load_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }
    async fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("state volume unavailable"));
        }
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for MemStore {
    async fn load_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }
    async fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- helpers ---------------------------------------------------------------

fn base_config() -> AppConfig {
    AppConfig {
        keywords: vec!["nasdaq".to_string()],
        ..AppConfig::default()
    }
}

/// A window that contains the current wall-clock hour.
fn window_covering_now() -> QuietWindow {
    let h = Utc::now().hour();
    QuietWindow::new(h, (h + 2) % 24)
}

/// A window that does not contain the current wall-clock hour.
fn window_missing_now() -> QuietWindow {
    let h = Utc::now().hour();
    QuietWindow::new((h + 3) % 24, (h + 5) % 24)
}

fn news_batch() -> Vec<NewsItem> {
    vec![
        NewsItem::new(
            "Wire",
            "Nasdaq futures slip ahead of CPI",
            Some("https://a/1".into()),
            Utc::now(),
            "nasdaq",
        ),
        NewsItem::new(
            "Desk",
            "Chipmakers rally on export news",
            Some("https://a/2".into()),
            Utc::now(),
            "nasdaq",
        ),
    ]
}

fn coordinator(
    cfg: AppConfig,
    news: Arc<dyn NewsProvider>,
    price: Arc<dyn PriceProvider>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<dyn StateStore>,
) -> Coordinator {
    Coordinator::new(cfg, news, price, notifier, store)
}

// --- tests -----------------------------------------------------------------

#[tokio::test]
async fn fresh_news_is_delivered_and_reruns_are_silent() {
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        Arc::new(MemStore::default()),
    );

    let report = co.run_news_cycle(false).await;
    assert_eq!(report.kept_items, 2);
    assert_eq!(report.delivered, 1, "one digest per keyword");
    assert!(notifier.texts()[0].contains("Nasdaq futures slip ahead of CPI"));

    // Same provider output next cycle: nothing new, nothing sent.
    let report = co.run_news_cycle(false).await;
    assert_eq!(report.kept_items, 0);
    assert_eq!(notifier.texts().len(), 1);
}

#[tokio::test]
async fn provider_failure_degrades_to_empty_cycle() {
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(FailingNews),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        Arc::new(MemStore::default()),
    );
    let report = co.run_news_cycle(false).await;
    assert_eq!(report.kept_items, 0);
    assert!(notifier.texts().is_empty());
}

#[tokio::test]
async fn drawdown_bucket_fires_once_across_cycles() {
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: vec![] }),
        Arc::new(ScriptedPrice::new(&[20000.0, 18800.0, 18850.0])),
        notifier.clone(),
        Arc::new(MemStore::default()),
    );

    assert_eq!(co.run_stock_cycle(false).await.buckets_fired, 0); // sets the peak
    assert_eq!(co.run_stock_cycle(false).await.buckets_fired, 1); // 6% drop
    assert_eq!(co.run_stock_cycle(false).await.buckets_fired, 0); // same bucket
    assert_eq!(notifier.texts().len(), 1);
    assert!(notifier.texts()[0].contains("below the all-time high"));
}

#[tokio::test]
async fn quiet_window_queues_then_flushes_in_order() {
    let store: Arc<MemStore> = Arc::new(MemStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut cfg = base_config();
    cfg.quiet = Some(window_covering_now());

    let co = coordinator(
        cfg,
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[20000.0, 18800.0])),
        notifier.clone(),
        store.clone(),
    );
    co.run_stock_cycle(false).await; // peak
    let news = co.run_news_cycle(false).await;
    let stock = co.run_stock_cycle(false).await; // bucket 1, quiet
    assert_eq!(news.queued, 1);
    assert_eq!(stock.queued, 1);
    assert!(notifier.texts().is_empty(), "everything held by the gate");

    // Operator shrinks the window; simulate via a restart with new hours.
    let mut cfg = base_config();
    cfg.quiet = Some(window_missing_now());
    let co2 = coordinator(
        cfg,
        Arc::new(StaticNews { items: vec![] }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store,
    );
    co2.restore().await;
    let report = co2.run_news_cycle(false).await;
    assert_eq!(report.flushed, 2);
    let texts = notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("New articles"), "news queued first, flushed first");
    assert!(texts[1].contains("below the all-time high"));
}

#[tokio::test]
async fn manual_check_bypasses_the_quiet_gate() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut cfg = base_config();
    cfg.quiet = Some(window_covering_now());

    let co = coordinator(
        cfg,
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        Arc::new(MemStore::default()),
    );
    let report = co.run_news_cycle(true).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.queued, 0);
    assert_eq!(notifier.texts().len(), 1);
}

#[tokio::test]
async fn failed_delivery_is_requeued_not_dropped() {
    // Fail the initial send and the same-cycle flush retry.
    let notifier = Arc::new(RecordingNotifier::failing_first(2));
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        Arc::new(MemStore::default()),
    );

    let report = co.run_news_cycle(false).await;
    assert_eq!(report.delivered, 0, "both attempts rejected");
    assert_eq!(co.status().await.pending, 1);

    // Next cycle: provider output is all duplicates, but the requeued
    // payload flushes and finally lands.
    let report = co.run_news_cycle(false).await;
    assert_eq!(report.flushed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(notifier.texts().len(), 1);
    assert_eq!(co.status().await.pending, 0);
}

#[tokio::test]
async fn store_outage_keeps_state_in_memory_until_recovery() {
    let store = Arc::new(FlakyStore::new(true));
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store.clone(),
    );

    // The outage never reaches the caller: the cycle runs and delivers.
    let report = co.run_news_cycle(false).await;
    assert_eq!(report.kept_items, 2);
    assert_eq!(report.delivered, 1);
    assert!(store.is_empty(), "nothing persisted during the outage");

    // Dedup state lives on in memory, so a rerun stays silent.
    assert_eq!(co.run_news_cycle(false).await.kept_items, 0);
    assert_eq!(notifier.texts().len(), 1);

    // Store recovers: the next cycle persists the in-memory state.
    store.set_failing(false);
    co.run_news_cycle(false).await;
    assert!(!store.is_empty());

    // A restarted engine sees everything that happened during the outage.
    let co2 = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store,
    );
    co2.restore().await;
    assert_eq!(co2.run_news_cycle(false).await.kept_items, 0);
    assert_eq!(notifier.texts().len(), 1);
}

#[tokio::test]
async fn restart_reapplies_configured_history_bounds() {
    let store: Arc<MemStore> = Arc::new(MemStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store.clone(),
    );
    assert_eq!(co.run_news_cycle(false).await.kept_items, 2);

    // Operator tightens the cap; restore trims the persisted history to the
    // newest entry, so the evicted headline counts as new again.
    let mut cfg = base_config();
    cfg.history_cap = 1;
    let co2 = coordinator(
        cfg,
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store,
    );
    co2.restore().await;
    let report = co2.run_news_cycle(false).await;
    assert_eq!(report.kept_items, 1);
    let texts = notifier.texts();
    assert!(texts.last().unwrap().contains("Nasdaq futures slip ahead of CPI"));
}

#[tokio::test]
async fn seen_history_survives_a_restart() {
    let store: Arc<MemStore> = Arc::new(MemStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let co = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store.clone(),
    );
    assert_eq!(co.run_news_cycle(false).await.kept_items, 2);

    let co2 = coordinator(
        base_config(),
        Arc::new(StaticNews { items: news_batch() }),
        Arc::new(ScriptedPrice::new(&[])),
        notifier.clone(),
        store,
    );
    co2.restore().await;
    assert_eq!(co2.run_news_cycle(false).await.kept_items, 0);
    assert_eq!(notifier.texts().len(), 1);
}
