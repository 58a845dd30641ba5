pub mod baike;
pub mod wikipedia;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::fetcher::Fetcher;
use crate::model::{DraftEntity, EntityKind};

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A source-specific extraction strategy. `extract` returns None when the
/// page yields no usable description, which tells the caller to try the
/// next source in priority order.
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;
    fn page_url(&self, subject: &str) -> String;
    fn extract(&self, subject: &str, kind: EntityKind, html: &str) -> Option<DraftEntity>;
}

/// Default priority order: encyclopedia A (Baike) first, then B (Wikipedia).
pub fn default_sources() -> Vec<Box<dyn Source>> {
    vec![Box::new(baike::Baike), Box::new(wikipedia::Wikipedia)]
}

/// Try each source in order; the first one producing a non-empty description
/// wins and later sources are not consulted. Fetch failures skip to the next
/// source rather than failing the subject; exhausting all sources is an
/// `ExtractionEmpty` error.
pub async fn extract_subject(
    fetcher: &Fetcher,
    sources: &[Box<dyn Source>],
    subject: &str,
    kind: EntityKind,
) -> Result<DraftEntity> {
    for source in sources {
        let url = source.page_url(subject);
        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("{}: fetch failed for '{}': {}", source.name(), subject, e);
                continue;
            }
        };
        match source.extract(subject, kind, &html) {
            Some(draft) if !draft.description.trim().is_empty() => {
                info!("{}: extracted '{}'", source.name(), subject);
                return Ok(draft);
            }
            _ => {
                debug!(
                    "{}: no description for '{}', trying next source",
                    source.name(),
                    subject
                );
            }
        }
    }
    Err(PipelineError::ExtractionEmpty(subject.to_string()))
}

/// Reduce a free-text date to a signed year: the first run of digits,
/// negated when a BCE marker (`前` or the Latin "BC" token) appears
/// anywhere in the text. "前221年" → -221, "618年" → 618.
pub fn parse_year_field(text: &str) -> Option<i32> {
    let digits = DIGITS_RE.find(text)?;
    let year: i32 = digits.as_str().parse().ok()?;
    if text.contains('前') || text.contains("BC") {
        Some(-year)
    } else {
        Some(year)
    }
}

/// Normalize an image URL found in markup to absolute https form.
/// Protocol-relative URLs get an explicit `https:` scheme.
pub fn absolutize_url(url: &str, base_host: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with('/') {
        format!("https://{}{}", base_host, url)
    } else {
        url.to_string()
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to single
/// spaces and trim.
pub(crate) fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip all whitespace. Baike pads short info keys with non-breaking
/// spaces ("出&nbsp;生&nbsp;日&nbsp;期").
pub(crate) fn clean_key(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bce_year_is_negated() {
        assert_eq!(parse_year_field("前221年"), Some(-221));
        assert_eq!(parse_year_field("公元前770年"), Some(-770));
        assert_eq!(parse_year_field("202 BC"), Some(-202));
    }

    #[test]
    fn ce_year_is_positive() {
        assert_eq!(parse_year_field("618年"), Some(618));
        assert_eq!(parse_year_field("1368年1月23日"), Some(1368));
    }

    #[test]
    fn unparseable_dates_yield_none() {
        assert_eq!(parse_year_field("不详"), None);
        assert_eq!(parse_year_field(""), None);
    }

    #[test]
    fn first_digit_run_wins() {
        // day and month digits come after the year in source notation
        assert_eq!(parse_year_field("前202年10月"), Some(-202));
    }

    #[test]
    fn protocol_relative_urls_get_https() {
        assert_eq!(
            absolutize_url("//upload.wikimedia.org/a.jpg", "zh.wikipedia.org"),
            "https://upload.wikimedia.org/a.jpg"
        );
    }

    #[test]
    fn root_relative_urls_join_base_host() {
        assert_eq!(
            absolutize_url("/pic/item/abc.jpg", "baike.baidu.com"),
            "https://baike.baidu.com/pic/item/abc.jpg"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            absolutize_url("https://example.com/x.png", "baike.baidu.com"),
            "https://example.com/x.png"
        );
    }

    #[test]
    fn keys_lose_nbsp_padding() {
        assert_eq!(clean_key("出\u{a0}生\u{a0}日\u{a0}期"), "出生日期");
    }
}
