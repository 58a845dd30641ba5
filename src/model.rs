use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which persisted collection an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Event,
}

impl EntityKind {
    pub fn collection_file(&self) -> &'static str {
        match self {
            EntityKind::Person => "people.json",
            EntityKind::Event => "events.json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Event => "event",
        }
    }
}

/// Kind-specific attributes. Year fields are signed: negative means BCE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityDetails {
    Person {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        aliases: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        era: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        birth_year: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        death_year: Option<i32>,
    },
    Event {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
    },
}

impl EntityDetails {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDetails::Person { .. } => EntityKind::Person,
            EntityDetails::Event { .. } => EntityKind::Event,
        }
    }

    pub fn has_year(&self) -> bool {
        match self {
            EntityDetails::Person {
                birth_year,
                death_year,
                ..
            } => birth_year.is_some() || death_year.is_some(),
            EntityDetails::Event { year, .. } => year.is_some(),
        }
    }
}

/// A provisional, unverified record extracted from a source page.
///
/// The name is the natural key used for dedup; the description doubles as
/// the extraction success signal and is always non-empty by the time a
/// draft leaves its source strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEntity {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub details: EntityDetails,
    /// Verifier issues carried forward on provisional acceptance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// A committed entity in a persisted collection. `id` is None only for
/// entries staged mid-merge; the merger assigns ids before write-back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub details: EntityDetails,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<DateTime<Utc>>,
}

impl CommittedEntity {
    pub fn from_draft(draft: DraftEntity) -> Self {
        CommittedEntity {
            id: None,
            name: draft.name,
            description: draft.description,
            image: draft.image,
            details: draft.details,
            issues: draft.issues,
            acquired_at: Some(Utc::now()),
        }
    }
}

/// Verdict from the plausibility verifier. Produced once per draft,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub accepted: bool,
    pub confidence: f32,
    #[serde(default)]
    pub issues: Vec<String>,
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_preserves_fields_and_carried_issues() {
        let draft = DraftEntity {
            name: "玄武门之变".to_string(),
            description: "唐初的一场宫廷政变。".to_string(),
            image: Some("https://example.com/x.jpg".to_string()),
            details: EntityDetails::Event {
                location: Some("长安".to_string()),
                category: None,
                year: Some(626),
            },
            issues: vec!["era label missing".to_string()],
        };
        let staged = CommittedEntity::from_draft(draft);
        assert_eq!(staged.id, None);
        assert_eq!(staged.name, "玄武门之变");
        assert_eq!(staged.issues, vec!["era label missing".to_string()]);
        assert!(staged.acquired_at.is_some());
    }

    #[test]
    fn committed_entities_parse_without_optional_fields() {
        let json = r#"{"id": 3, "name": "官渡之战", "description": "东汉末年战役。", "kind": "event"}"#;
        let entity: CommittedEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id, Some(3));
        assert!(entity.image.is_none());
        assert!(entity.issues.is_empty());
        assert_eq!(entity.details.kind(), EntityKind::Event);
    }
}
