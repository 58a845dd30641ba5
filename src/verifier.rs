use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};

use crate::config::Settings;
use crate::model::{DraftEntity, EntityDetails, VerificationResult};

/// Admission decision derived from a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Provisional,
    Discard,
}

/// Three-way admission policy. The confidence floor dominates: a nominally
/// accepted draft below the floor is still discarded, while a rejected
/// draft at or above it is salvaged as provisional, issues attached.
pub fn admit(result: &VerificationResult, floor: f32) -> Admission {
    if result.confidence < floor {
        Admission::Discard
    } else if result.accepted {
        Admission::Accept
    } else {
        Admission::Provisional
    }
}

/// Black-box plausibility judge. Implementations must not mutate the draft;
/// a transport or availability failure surfaces as Err and is treated by
/// the pipeline as "could not verify" (conservatively discarded).
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, draft: &DraftEntity) -> Result<VerificationResult>;
}

/// Pick the verifier for this run: the remote endpoint when configured,
/// otherwise the built-in heuristic judge.
pub fn for_settings(settings: &Settings) -> Result<Arc<dyn Verifier>> {
    Ok(match &settings.verifier_url {
        Some(url) => Arc::new(RemoteVerifier::new(url.clone())?),
        None => Arc::new(HeuristicVerifier),
    })
}

/// POSTs the draft to an external judgment endpoint and decodes its
/// `{accepted, confidence, issues}` response.
pub struct RemoteVerifier {
    client: reqwest::Client,
    url: String,
}

impl RemoteVerifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(RemoteVerifier { client, url })
    }
}

#[async_trait]
impl Verifier for RemoteVerifier {
    async fn verify(&self, draft: &DraftEntity) -> Result<VerificationResult> {
        let response = self.client.post(&self.url).json(draft).send().await?;
        if !response.status().is_success() {
            bail!("verifier returned HTTP {}", response.status());
        }
        Ok(response.json().await?)
    }
}

/// Local field-consistency judge, used when no remote endpoint is
/// configured. Starts from full confidence and deducts per flagged issue.
pub struct HeuristicVerifier;

const MIN_DESCRIPTION_CHARS: usize = 20;
const EARLIEST_PLAUSIBLE_YEAR: i32 = -3000;

fn check_year(issues: &mut Vec<String>, confidence: &mut f32, year: Option<i32>, field: &str) {
    let current_year = Utc::now().year();
    if let Some(y) = year {
        if y < EARLIEST_PLAUSIBLE_YEAR || y > current_year {
            issues.push(format!("{} {} outside the plausible range", field, y));
            *confidence -= 0.4;
        }
    }
}

#[async_trait]
impl Verifier for HeuristicVerifier {
    async fn verify(&self, draft: &DraftEntity) -> Result<VerificationResult> {
        let mut issues = Vec::new();
        let mut confidence: f32 = 1.0;

        if draft.description.chars().count() < MIN_DESCRIPTION_CHARS {
            issues.push("description is suspiciously short".to_string());
            confidence -= 0.3;
        }

        match &draft.details {
            EntityDetails::Person {
                birth_year,
                death_year,
                ..
            } => {
                check_year(&mut issues, &mut confidence, *birth_year, "birth year");
                check_year(&mut issues, &mut confidence, *death_year, "death year");
                if let (Some(b), Some(d)) = (birth_year, death_year) {
                    if d < b {
                        issues.push("death year precedes birth year".to_string());
                        confidence -= 0.4;
                    }
                }
            }
            EntityDetails::Event { year, .. } => {
                check_year(&mut issues, &mut confidence, *year, "event year")
            }
        }

        Ok(VerificationResult {
            accepted: issues.is_empty(),
            confidence: confidence.clamp(0.0, 1.0),
            issues,
        })
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn verdict(accepted: bool, confidence: f32) -> VerificationResult {
        VerificationResult {
            accepted,
            confidence,
            issues: vec!["flagged".to_string()],
        }
    }

    #[test]
    fn low_confidence_discards_even_when_accepted() {
        assert_eq!(admit(&verdict(true, 0.3), 0.5), Admission::Discard);
    }

    #[test]
    fn rejected_but_confident_is_provisional() {
        assert_eq!(admit(&verdict(false, 0.6), 0.5), Admission::Provisional);
    }

    #[test]
    fn accepted_above_floor_merges() {
        assert_eq!(admit(&verdict(true, 0.9), 0.5), Admission::Accept);
    }

    #[test]
    fn floor_boundary_is_inclusive() {
        assert_eq!(admit(&verdict(false, 0.5), 0.5), Admission::Provisional);
    }

    fn person_draft(birth: Option<i32>, death: Option<i32>) -> DraftEntity {
        DraftEntity {
            name: "测试人物".to_string(),
            description: "一位用于流水线测试的虚构历史人物，生平不详但描述够长。".to_string(),
            image: None,
            details: EntityDetails::Person {
                aliases: Vec::new(),
                era: None,
                birth_year: birth,
                death_year: death,
            },
            issues: Vec::new(),
        }
    }

    #[tokio::test]
    async fn consistent_draft_passes_heuristics() {
        let result = HeuristicVerifier
            .verify(&person_draft(Some(-259), Some(-210)))
            .await
            .unwrap();
        assert!(result.accepted);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn inverted_years_are_flagged() {
        let result = HeuristicVerifier
            .verify(&person_draft(Some(618), Some(598)))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert!(result.confidence < 1.0);
        assert!(result
            .issues
            .iter()
            .any(|i| i.contains("precedes birth year")));
    }

    #[tokio::test]
    async fn short_description_costs_confidence() {
        let mut draft = person_draft(None, None);
        draft.description = "太短".to_string();
        let result = HeuristicVerifier.verify(&draft).await.unwrap();
        assert!(!result.accepted);
        assert!((result.confidence - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn far_future_event_year_is_implausible() {
        let draft = DraftEntity {
            name: "未来之战".to_string(),
            description: "一场不可能发生在公元三千年的战役，用于边界检查。".to_string(),
            image: None,
            details: EntityDetails::Event {
                location: None,
                category: None,
                year: Some(3000),
            },
            issues: Vec::new(),
        };
        let result = HeuristicVerifier.verify(&draft).await.unwrap();
        assert!(!result.accepted);
        assert_eq!(draft.details.kind(), EntityKind::Event);
    }
}
