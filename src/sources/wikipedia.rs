use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{absolutize_url, clean_key, clean_text, parse_year_field, Source};
use crate::model::{DraftEntity, EntityDetails, EntityKind};

const HOST: &str = "zh.wikipedia.org";

static PARA_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mw-parser-output > p").unwrap());
static INFOBOX_ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox tr").unwrap());
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static INFOBOX_IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox img").unwrap());

/// Encyclopedia B: Wikipedia articles. The first non-empty body paragraph
/// is the description; infobox th/td rows carry the structured fields.
pub struct Wikipedia;

impl Source for Wikipedia {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn page_url(&self, subject: &str) -> String {
        format!("https://{}/wiki/{}", HOST, subject)
    }

    fn extract(&self, subject: &str, kind: EntityKind, html: &str) -> Option<DraftEntity> {
        let doc = Html::parse_document(html);

        let description = doc
            .select(&PARA_SEL)
            .map(element_text)
            .find(|t| !t.is_empty())?;

        let info: Vec<(String, String)> = doc
            .select(&INFOBOX_ROW_SEL)
            .filter_map(|row| {
                let key = row.select(&TH_SEL).next().map(|th| clean_key(&element_text(th)))?;
                let value = row.select(&TD_SEL).next().map(element_text)?;
                Some((key, value))
            })
            .collect();

        let image = doc
            .select(&INFOBOX_IMG_SEL)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| absolutize_url(src, HOST));

        let details = match kind {
            EntityKind::Person => EntityDetails::Person {
                aliases: Vec::new(),
                era: info_value(&info, &["时代", "朝代", "所处时代"]),
                birth_year: info_value(&info, &["出生", "出生日期", "Born"])
                    .as_deref()
                    .and_then(parse_year_field),
                death_year: info_value(&info, &["逝世", "逝世日期", "Died"])
                    .as_deref()
                    .and_then(parse_year_field),
            },
            EntityKind::Event => EntityDetails::Event {
                location: info_value(&info, &["地点", "位置", "Location"]),
                category: info_value(&info, &["类型", "性质", "Type"]),
                year: info_value(&info, &["日期", "时间", "Date"])
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
        .find(|(k, _)| keys.iter().any(|key| k.as_str() == *key))
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON_PAGE: &str = r#"
        <html><body><div class="mw-parser-output">
        <table class="infobox">
            <tr><td colspan="2"><img src="//upload.wikimedia.org/tangtaizong.jpg"></td></tr>
            <tr><th>出生</th><td>598年1月28日</td></tr>
            <tr><th>逝世</th><td>649年7月10日</td></tr>
            <tr><th>朝代</th><td>唐朝</td></tr>
        </table>
        <p></p>
        <p>唐太宗李世民，唐朝第二位皇帝，开创贞观之治。</p>
        </div></body></html>"#;

    #[test]
    fn first_nonempty_paragraph_is_description() {
        let draft = Wikipedia
            .extract("唐太宗", EntityKind::Person, PERSON_PAGE)
            .unwrap();
        assert!(draft.description.starts_with("唐太宗李世民"));
    }

    #[test]
    fn infobox_years_and_image_extracted() {
        let draft = Wikipedia
            .extract("唐太宗", EntityKind::Person, PERSON_PAGE)
            .unwrap();
        assert_eq!(
            draft.image.as_deref(),
            Some("https://upload.wikimedia.org/tangtaizong.jpg")
        );
        match draft.details {
            EntityDetails::Person {
                era,
                birth_year,
                death_year,
                ..
            } => {
                assert_eq!(era.as_deref(), Some("唐朝"));
                assert_eq!(birth_year, Some(598));
                assert_eq!(death_year, Some(649));
            }
            _ => panic!("expected person details"),
        }
    }

    #[test]
    fn page_without_paragraphs_yields_none() {
        let html = r#"<html><body><div class="mw-parser-output"><p>  </p></div></body></html>"#;
        assert!(Wikipedia.extract("某某", EntityKind::Event, html).is_none());
    }
}
