// src/config.rs
//! Engine configuration: tracked keywords, instrument, intervals, dedup
//! bounds, quiet window and drawdown thresholds.
//!
//! Loaded from TOML (`config/notifier.toml` by default, overridable via
//! `NOTIFIER_CONFIG_PATH`); every field has a serde default so a missing
//! file yields a runnable config. Secrets (Telegram/Naver credentials)
//! stay in the environment, never in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dedup::{DEFAULT_HISTORY_CAP, DEFAULT_HISTORY_MAX_AGE_SECS, DEFAULT_SIMILARITY_CUTOFF};
use crate::drawdown::DrawdownParams;
use crate::quiet::QuietWindow;

pub const ENV_CONFIG_PATH: &str = "NOTIFIER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/notifier.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tracked news keywords.
    pub keywords: Vec<String>,
    /// Tracked index ticker.
    pub instrument: String,
    pub news_interval_secs: u64,
    pub stock_interval_secs: u64,
    pub similarity_cutoff: f32,
    pub history_cap: usize,
    pub history_max_age_secs: i64,
    pub quiet: Option<QuietWindow>,
    pub drawdown: DrawdownParams,
    pub state_dir: PathBuf,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            instrument: "^NDX".to_string(),
            news_interval_secs: 600,
            stock_interval_secs: 2 * 3600,
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
            history_cap: DEFAULT_HISTORY_CAP,
            history_max_age_secs: DEFAULT_HISTORY_MAX_AGE_SECS,
            quiet: None,
            drawdown: DrawdownParams::default(),
            state_dir: PathBuf::from("state"),
            port: 8000,
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// `$NOTIFIER_CONFIG_PATH`, then `config/notifier.toml`, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        Ok(Self::default())
    }

    fn sanitize(&mut self) {
        self.similarity_cutoff = self.similarity_cutoff.clamp(0.0, 1.0);
        self.history_cap = self.history_cap.max(1);
        self.history_max_age_secs = self.history_max_age_secs.max(1);
        self.news_interval_secs = self.news_interval_secs.max(1);
        self.stock_interval_secs = self.stock_interval_secs.max(1);
        if self.drawdown.step_pct <= 0.0 {
            self.drawdown.step_pct = 1.0;
        }
        if self.drawdown.start_pct < 0.0 {
            self.drawdown.start_pct = 0.0;
        }
        // Serde builds the window directly, skipping QuietWindow::new.
        if let Some(q) = self.quiet {
            self.quiet = Some(QuietWindow::new(q.start_hour, q.end_hour));
        }
        self.keywords.retain(|k| !k.trim().is_empty());
        for k in &mut self.keywords {
            *k = k.trim().to_string();
        }
        self.keywords.dedup();
    }
}
