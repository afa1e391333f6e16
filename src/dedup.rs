//! # News Deduplicator
//! Filters a batch of provider candidates against a bounded history of
//! already-notified items. Two suppression layers:
//!   1. identity: the item's key (URL hash) was seen before — O(1) set lookup.
//!   2. near-duplicate: title similarity >= cutoff against any history entry
//!      or an earlier-kept candidate from the same batch.
//!
//! Invariant: no two items in the updated history are mutual near-duplicates;
//! re-running the same batch after a successful filter yields an empty kept
//! set.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::similarity::{SimilarityScorer, TokenSetScorer};

/// Near-duplicate cutoff used by the original bot for headline filtering.
pub const DEFAULT_SIMILARITY_CUTOFF: f32 = 0.60;

pub const DEFAULT_HISTORY_CAP: usize = 100;
pub const DEFAULT_HISTORY_MAX_AGE_SECS: i64 = 48 * 3600;

/// One candidate article. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    /// Identity key, derived from the URL (or source+title when absent).
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    /// The tracked keyword this item matched.
    pub keyword: String,
}

impl NewsItem {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        url: Option<String>,
        published_at: DateTime<Utc>,
        keyword: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let title = title.into();
        let id = match url.as_deref() {
            Some(u) => identity_key(u),
            None => identity_key(&format!("{source}\n{title}")),
        };
        Self {
            id,
            title,
            url,
            source,
            published_at,
            keyword: keyword.into(),
        }
    }
}

fn identity_key(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SeenEntry {
    item: NewsItem,
    recorded_at: DateTime<Utc>,
}

/// Bounded rolling history of kept items for one keyword.
///
/// Oldest entries are evicted past the size cap or the age window. The id
/// set is an index over `entries` and is rebuilt on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "HistorySnapshot", into = "HistorySnapshot")]
pub struct SeenHistory {
    entries: VecDeque<SeenEntry>,
    ids: HashSet<String>,
    cap: usize,
    max_age: Duration,
}

impl Default for SeenHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP, DEFAULT_HISTORY_MAX_AGE_SECS)
    }
}

impl SeenHistory {
    pub fn new(cap: usize, max_age_secs: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            ids: HashSet::new(),
            cap: cap.max(1),
            max_age: Duration::seconds(max_age_secs.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.item.title.as_str())
    }

    fn push(&mut self, item: NewsItem, now: DateTime<Utc>) {
        self.ids.insert(item.id.clone());
        self.entries.push_back(SeenEntry {
            item,
            recorded_at: now,
        });
        while self.entries.len() > self.cap {
            if let Some(old) = self.entries.pop_front() {
                self.ids.remove(&old.item.id);
            }
        }
    }

    /// Re-apply configured bounds to a restored history. A tighter cap
    /// evicts the oldest excess entries immediately; a tighter age window
    /// takes effect on the next `filter_new`.
    pub fn set_bounds(&mut self, cap: usize, max_age_secs: i64) {
        self.cap = cap.max(1);
        self.max_age = Duration::seconds(max_age_secs.max(1));
        while self.entries.len() > self.cap {
            if let Some(old) = self.entries.pop_front() {
                self.ids.remove(&old.item.id);
            }
        }
    }

    fn evict_old(&mut self, now: DateTime<Utc>) {
        while let Some(front) = self.entries.front() {
            if now.signed_duration_since(front.recorded_at) > self.max_age {
                let old = self.entries.pop_front().expect("front checked");
                self.ids.remove(&old.item.id);
            } else {
                break;
            }
        }
    }
}

/// Wire shape for the store; the id index is derived, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistorySnapshot {
    entries: Vec<SeenEntry>,
    cap: usize,
    max_age_secs: i64,
}

impl From<HistorySnapshot> for SeenHistory {
    fn from(s: HistorySnapshot) -> Self {
        let ids = s.entries.iter().map(|e| e.item.id.clone()).collect();
        Self {
            entries: s.entries.into(),
            ids,
            cap: s.cap.max(1),
            max_age: Duration::seconds(s.max_age_secs.max(1)),
        }
    }
}

impl From<SeenHistory> for HistorySnapshot {
    fn from(h: SeenHistory) -> Self {
        Self {
            entries: h.entries.into(),
            cap: h.cap,
            max_age_secs: h.max_age.num_seconds(),
        }
    }
}

/// Batch filter over candidates for one keyword.
pub struct Deduplicator {
    scorer: Box<dyn SimilarityScorer>,
    cutoff: f32,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(Box::new(TokenSetScorer), DEFAULT_SIMILARITY_CUTOFF)
    }
}

impl Deduplicator {
    pub fn new(scorer: Box<dyn SimilarityScorer>, cutoff: f32) -> Self {
        Self {
            scorer,
            cutoff: cutoff.clamp(0.0, 1.0),
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Keep only unseen, non-near-duplicate candidates; append them to the
    /// history. Relative input order is preserved; on near-duplicate ties the
    /// first-encountered candidate wins.
    pub fn filter_new(
        &self,
        now: DateTime<Utc>,
        candidates: Vec<NewsItem>,
        history: &mut SeenHistory,
    ) -> Vec<NewsItem> {
        history.evict_old(now);

        let mut kept: Vec<NewsItem> = Vec::new();
        'cand: for cand in candidates {
            if history.contains_id(&cand.id) || kept.iter().any(|k| k.id == cand.id) {
                continue;
            }
            for seen_title in history.titles() {
                if self.scorer.score(&cand.title, seen_title) >= self.cutoff {
                    tracing::debug!(title = %cand.title, "near-duplicate of history, dropped");
                    continue 'cand;
                }
            }
            for earlier in &kept {
                if self.scorer.score(&cand.title, &earlier.title) >= self.cutoff {
                    tracing::debug!(title = %cand.title, "near-duplicate within batch, dropped");
                    continue 'cand;
                }
            }
            kept.push(cand);
        }

        for item in &kept {
            history.push(item.clone(), now);
        }
        kept
    }
}
