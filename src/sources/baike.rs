use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{absolutize_url, clean_key, clean_text, parse_year_field, Source};
use crate::model::{DraftEntity, EntityDetails, EntityKind};

const HOST: &str = "baike.baidu.com";

static SUMMARY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.lemma-summary, div.lemmaWgt-lemmaSummary").unwrap());
static INFO_KEY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("dt.basicInfo-item.name").unwrap());
static INFO_VALUE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("dd.basicInfo-item.value").unwrap());
static PIC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.summary-pic img").unwrap());

/// Encyclopedia A: Baike lemma pages. The infobox is a flat dt/dd list;
/// the summary div is the description success signal.
pub struct Baike;

impl Source for Baike {
    fn name(&self) -> &'static str {
        "baike"
    }

    fn page_url(&self, subject: &str) -> String {
        format!("https://{}/item/{}", HOST, subject)
    }

    fn extract(&self, subject: &str, kind: EntityKind, html: &str) -> Option<DraftEntity> {
        let doc = Html::parse_document(html);

        let description = doc
            .select(&SUMMARY_SEL)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())?;

        // dt/dd pairs appear in document order
        let keys: Vec<String> = doc
            .select(&INFO_KEY_SEL)
            .map(|el| clean_key(&element_text(el)))
            .collect();
        let values: Vec<String> = doc.select(&INFO_VALUE_SEL).map(element_text).collect();
        let info: Vec<(String, String)> = keys.into_iter().zip(values).collect();

        let image = doc
            .select(&PIC_SEL)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| absolutize_url(src, HOST));

        let details = match kind {
            EntityKind::Person => EntityDetails::Person {
                aliases: info_value(&info, &["别名", "别称", "字号"])
                    .map(split_aliases)
                    .unwrap_or_default(),
                era: info_value(&info, &["所处时代", "朝代"]),
                birth_year: info_value(&info, &["出生日期", "出生时间"])
                    .as_deref()
                    .and_then(parse_year_field),
                death_year: info_value(&info, &["逝世日期", "去世时间"])
                    .as_deref()
                    .and_then(parse_year_field),
            },
            EntityKind::Event => EntityDetails::Event {
                location: info_value(&info, &["发生地点", "地点"]),
                category: info_value(&info, &["性质", "类型"]),
                year: info_value(&info, &["发生时间", "时间", "日期"])
                    .as_deref()
                    .and_then(parse_year_field),
            },
        };

        Some(DraftEntity {
            name: subject.to_string(),
            description,
            image,
            details,
            issues: Vec::new(),
        })
    }
}

fn element_text(el: ElementRef) -> String {
    clean_text(&el.text().collect::<String>())
}

fn info_value(info: &[(String, String)], keys: &[&str]) -> Option<String> {
    info.iter()
        .find(|(k, _)| keys.contains(&k.as_str()))
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

fn split_aliases(raw: String) -> Vec<String> {
    raw.split(['、', '，', ','])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Tests ──
