// src/providers/mod.rs
pub mod naver;
pub mod yahoo;

use anyhow::Result;

use crate::dedup::NewsItem;

/// News search seam. A provider failure is never fatal; the coordinator
/// treats it as an empty result for that keyword this cycle.
#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &'static str;
}

/// Price quote seam. Failure means "skip this cycle's observation".
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    async fn quote(&self, instrument: &str) -> Result<f64>;
    fn name(&self) -> &'static str;
}

/// Normalize a provider title: decode HTML entities, strip tags, collapse
/// whitespace, drop trailing sentence punctuation.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_strips_tags_and_entities() {
        let s = "  <b>Fed</b> raises&nbsp;&nbsp; rates!!!  ";
        assert_eq!(normalize_title(s), "Fed raises rates");
    }

    #[test]
    fn normalize_title_keeps_plain_text() {
        assert_eq!(normalize_title("Nasdaq up 2%"), "Nasdaq up 2%");
    }
}
