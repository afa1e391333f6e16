//! Naver open-search news provider (`/v1/search/news.json`).
//!
//! Returns raw candidates for one keyword; the deduplicator decides what
//! is actually new. Items older than the staleness cutoff are dropped at
//! parse time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Deserialize;

use super::{normalize_title, NewsProvider};
use crate::dedup::NewsItem;

const API_URL: &str = "https://openapi.naver.com/v1/search/news.json";
const FETCH_COUNT: u32 = 30;
const MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "originallink")]
    original_link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

pub struct NaverNewsProvider {
    mode: Mode,
}

enum Mode {
    /// Canned API response body, for tests.
    Fixture(String),
    Http {
        client: reqwest::Client,
        client_id: String,
        client_secret: String,
    },
}

impl NaverNewsProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            mode: Mode::Http {
                client: reqwest::Client::new(),
                client_id,
                client_secret,
            },
        }
    }

    fn parse_body(body: &str, keyword: &str, now: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let resp: SearchResponse =
            serde_json::from_str(body).context("parsing naver search json")?;
        let cutoff = now - Duration::days(MAX_AGE_DAYS);

        let mut out = Vec::with_capacity(resp.items.len());
        for it in resp.items {
            let title = normalize_title(it.title.as_deref().unwrap_or_default());
            let url = it.link.or(it.original_link.clone());
            if title.is_empty() || url.is_none() {
                continue;
            }

            let published_at = it
                .pub_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);
            if published_at < cutoff {
                continue;
            }

            let source = it
                .original_link
                .as_deref()
                .and_then(source_from_url)
                .unwrap_or_else(|| "unknown".to_string());

            out.push(NewsItem::new(source, title, url, published_at, keyword));
        }
        counter!("news_provider_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

/// First label of the host, uppercased ("https://www.mk.co.kr/..." -> "MK").
fn source_from_url(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split('/').next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next()?;
    if label.is_empty() {
        return None;
    }
    Some(label.to_uppercase())
}

#[async_trait]
impl NewsProvider for NaverNewsProvider {
    async fn search(&self, keyword: &str) -> Result<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_body(body, keyword, Utc::now()),
            Mode::Http {
                client,
                client_id,
                client_secret,
            } => {
                let resp = client
                    .get(API_URL)
                    .header("X-Naver-Client-Id", client_id)
                    .header("X-Naver-Client-Secret", client_secret)
                    .query(&[
                        ("query", keyword),
                        ("display", &FETCH_COUNT.to_string()),
                        ("sort", "sim"),
                    ])
                    .timeout(std::time::Duration::from_secs(15))
                    .send()
                    .await
                    .context("naver search request")?
                    .error_for_status()
                    .context("naver search non-2xx")?;
                let body = resp.text().await.context("naver search body")?;
                Self::parse_body(&body, keyword, Utc::now())
            }
        }
    }

    fn name(&self) -> &'static str {
        "naver"
    }
}
