// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod drawdown;
pub mod metrics;
pub mod notify;
pub mod providers;
pub mod quiet;
pub mod scheduler;
pub mod similarity;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::coordinator::{Coordinator, CycleReport};
pub use crate::dedup::{Deduplicator, NewsItem, SeenHistory};
pub use crate::drawdown::{observe, DrawdownEvent, DrawdownParams, DrawdownState};
pub use crate::notify::{NotificationPayload, Notifier, PayloadKind};
pub use crate::quiet::{GateAction, QuietGate, QuietWindow};
