use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::fetcher::Fetcher;
use crate::images::ImageStore;
use crate::model::{CommittedEntity, EntityKind};
use crate::sources::{self, Source};
use crate::store::Collection;
use crate::verifier::{admit, Admission, Verifier};

/// Terminal state of one subject's run through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Merged,
    ProvisionallyMerged,
    Skipped,
    ExtractionFailed,
    Discarded,
}

/// Batch summary printed after an acquire run.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub merged: usize,
    pub provisional: usize,
    pub skipped: usize,
    pub extraction_failed: usize,
    pub discarded: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Merged => self.merged += 1,
            Outcome::ProvisionallyMerged => self.provisional += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::ExtractionFailed => self.extraction_failed += 1,
            Outcome::Discarded => self.discarded += 1,
        }
    }

    pub fn print(&self) {
        println!(
            "Merged {} ({} provisional), skipped {}, extraction failed {}, discarded {}.",
            self.merged + self.provisional,
            self.provisional,
            self.skipped,
            self.extraction_failed,
            self.discarded,
        );
    }
}

pub struct Pipeline {
    settings: Settings,
    fetcher: Arc<Fetcher>,
    images: Arc<ImageStore>,
    verifier: Arc<dyn Verifier>,
    sources: Arc<Vec<Box<dyn Source>>>,
}

impl Pipeline {
    pub fn new(settings: Settings, verifier: Arc<dyn Verifier>) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(&settings)?);
        let images = Arc::new(ImageStore::new(
            &settings.image_dir,
            settings.image_timeout_secs,
        )?);
        Ok(Pipeline {
            settings,
            fetcher,
            images,
            verifier,
            sources: Arc::new(sources::default_sources()),
        })
    }

    /// Run a full batch: a bounded worker pool over the subject names,
    /// accepted entities staged through a channel, then one merge and one
    /// atomic write at the end. The write runs to completion or not at all.
    pub async fn acquire(&self, kind: EntityKind, subjects: Vec<String>) -> Result<BatchStats> {
        let mut collection = Collection::load(&self.settings.data_dir, kind)?;
        if collection.is_empty() {
            info!("starting a fresh {} collection", kind.label());
        }
        let existing = collection.natural_keys();

        let mut stats = BatchStats::default();

        // Known natural keys never reach the fetch stage; neither does a
        // name repeated within the batch.
        let mut pending: Vec<String> = Vec::new();
        for name in subjects {
            if existing.contains(&name) || pending.contains(&name) {
                info!("'{}' already present, skipping", name);
                stats.record(Outcome::Skipped);
            } else {
                pending.push(name);
            }
        }

        if pending.is_empty() {
            info!("nothing to acquire");
            return Ok(stats);
        }

        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );

        let workers = self.settings.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel::<(Outcome, Option<CommittedEntity>)>(workers * 2);

        for name in pending {
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let images = Arc::clone(&self.images);
            let verifier = Arc::clone(&self.verifier);
            let srcs = Arc::clone(&self.sources);
            let floor = self.settings.confidence_floor;
            let budget = Duration::from_secs(self.settings.subject_timeout_secs);

            tokio::spawn(async move {
                let _permit = sem.acquire().await.unwrap();
                let result = tokio::time::timeout(
                    budget,
                    run_subject(&fetcher, &srcs, &images, verifier.as_ref(), floor, kind, &name),
                )
                .await;
                let pair = match result {
                    Ok(pair) => pair,
                    Err(_) => {
                        warn!("'{}' exceeded its time budget, giving up", name);
                        (Outcome::ExtractionFailed, None)
                    }
                };
                let _ = tx.send(pair).await;
            });
        }

        // Drop our copy of tx so rx closes when all spawned tasks finish
        drop(tx);

        // Single consumer: outcome accounting plus staging for the merge,
        // so dedup reads and the write-back stay serialized.
        let mut staged: Vec<CommittedEntity> = Vec::new();
        while let Some((outcome, entity)) = rx.recv().await {
            stats.record(outcome);
            if let Some(e) = entity {
                staged.push(e);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if staged.is_empty() {
            info!("no new entities accepted, collection left untouched");
            return Ok(stats);
        }

        let added = collection.merge_batch(staged);
        if added > 0 {
            collection.save()?;
        }
        info!(
            "merged {} new {} entities ({} total)",
            added,
            kind.label(),
            collection.len()
        );
        Ok(stats)
    }
}

/// One subject's pipeline: fetch→extract across sources, verify, localize
/// the image, stage for merge. Image failures degrade the entity; nothing
/// here aborts the batch.
async fn run_subject(
    fetcher: &Fetcher,
    sources: &[Box<dyn Source>],
    images: &ImageStore,
    verifier: &dyn Verifier,
    floor: f32,
    kind: EntityKind,
    name: &str,
) -> (Outcome, Option<CommittedEntity>) {
    let mut draft = match sources::extract_subject(fetcher, sources, name, kind).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!("{}", e);
            return (Outcome::ExtractionFailed, None);
        }
    };
    debug_assert_eq!(draft.details.kind(), kind);

    // An unreachable verifier counts as low confidence
    let verdict = match verifier.verify(&draft).await {
        Ok(v) => v,
        Err(e) => {
            warn!("could not verify '{}' ({}), discarding", name, e);
            return (Outcome::Discarded, None);
        }
    };

    let admission = admit(&verdict, floor);
    match admission {
        Admission::Discard => {
            info!(
                "'{}' discarded ({}: {})",
                name,
                PipelineError::LowConfidence(verdict.confidence),
                verdict.issues.join("; ")
            );
            return (Outcome::Discarded, None);
        }
        Admission::Provisional => {
            warn!(
                "'{}' provisionally accepted (confidence {:.2}: {})",
                name,
                verdict.confidence,
                verdict.issues.join("; ")
            );
            draft.issues = verdict.issues.clone();
        }
        Admission::Accept => {}
    }

    if let Some(url) = draft.image.clone() {
        match images.acquire(&url, name).await {
            Ok(path) => debug!("image for '{}' stored at {}", name, path.display()),
            Err(e) => {
                warn!("image for '{}' failed ({}), keeping entity without one", name, e);
                draft.image = None;
            }
        }
    }

    let outcome = match admission {
        Admission::Provisional => Outcome::ProvisionallyMerged,
        _ => Outcome::Merged,
    };
    (outcome, Some(CommittedEntity::from_draft(draft)))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_account_every_outcome() {
        let mut stats = BatchStats::default();
        for outcome in [
            Outcome::Merged,
            Outcome::ProvisionallyMerged,
            Outcome::ProvisionallyMerged,
            Outcome::Skipped,
            Outcome::ExtractionFailed,
            Outcome::Discarded,
        ] {
            stats.record(outcome);
        }
        assert_eq!(stats.merged, 1);
        assert_eq!(stats.provisional, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.extraction_failed, 1);
        assert_eq!(stats.discarded, 1);
    }
}
