//! Outbound notifications: payload type, transport trait, and message
//! rendering in the layout of the original bot.

pub mod telegram;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::NewsItem;
use crate::drawdown::{DrawdownEvent, DrawdownParams};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    News,
    Stock,
}

/// One outbound chat message, rendered and ready to deliver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub kind: PayloadKind,
    pub text: String,
    pub ts: DateTime<Utc>,
}

/// Chat transport seam. Production uses Telegram; tests use a recording
/// mock.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Render a per-keyword digest of newly kept articles.
pub fn render_news_digest(keyword: &str, items: &[NewsItem]) -> String {
    let mut msg = format!(
        "\u{1F4F0} <b>New articles</b> (keyword: {keyword})\nTotal: {}\n",
        items.len()
    );
    msg.push_str("\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\n\n");
    for item in items {
        match &item.url {
            Some(url) => {
                msg.push_str(&format!("<a href='{url}'><b>\u{1F539} {}</b></a>\n", item.title))
            }
            None => msg.push_str(&format!("<b>\u{1F539} {}</b>\n", item.title)),
        }
        msg.push_str(&format!(
            "<code>{}, {}</code>\n\n",
            item.source,
            item.published_at.format("%m-%d %H:%M")
        ));
    }
    msg
}

/// Render a drawdown-bucket alert.
pub fn render_drop_alert(event: &DrawdownEvent, instrument: &str, params: &DrawdownParams) -> String {
    format!(
        "\u{1F6A8} <b>{instrument} drawdown alert</b>\n\n\
         <b>\u{26A0} {level:.0}% below the all-time high</b>\n\n\
         \u{2022} Current: ${price:.2}\n\
         \u{2022} Peak: ${peak:.2}\n\
         \u{2022} Drop: \u{25BC} {drop:.2}%",
        level = event.level_pct(params),
        price = event.price,
        peak = event.peak,
        drop = event.drop_pct,
    )
}
