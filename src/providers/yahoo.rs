//! Yahoo Finance chart endpoint price provider.
//!
//! One quote per call; the drawdown tracker keeps its own running peak, so
//! only the latest market price is needed here.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::PriceProvider;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

pub struct YahooPriceProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl YahooPriceProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn new() -> Self {
        Self {
            mode: Mode::Http {
                client: reqwest::Client::new(),
            },
        }
    }

    fn parse_body(body: &str) -> Result<f64> {
        let resp: ChartResponse = serde_json::from_str(body).context("parsing yahoo chart json")?;
        resp.chart
            .result
            .first()
            .and_then(|r| r.meta.regular_market_price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| anyhow!("yahoo chart response carried no usable price"))
    }
}

impl Default for YahooPriceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for YahooPriceProvider {
    async fn quote(&self, instrument: &str) -> Result<f64> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_body(body),
            Mode::Http { client } => {
                let url = format!(
                    "https://query1.finance.yahoo.com/v8/finance/chart/{instrument}?range=1d&interval=1d"
                );
                let body = client
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(15))
                    .send()
                    .await
                    .context("yahoo chart request")?
                    .error_for_status()
                    .context("yahoo chart non-2xx")?
                    .text()
                    .await
                    .context("yahoo chart body")?;
                Self::parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
