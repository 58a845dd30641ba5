use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::{CommittedEntity, EntityKind};

/// A loaded snapshot of one kind's persisted collection. Read fully at
/// batch start, mutated only by appends, written back once at batch end.
pub struct Collection {
    path: PathBuf,
    pub entities: Vec<CommittedEntity>,
}

impl Collection {
    /// Load the collection for `kind`, starting empty when no file exists.
    pub fn load(data_dir: &Path, kind: EntityKind) -> Result<Self> {
        let path = data_dir.join(kind.collection_file());
        let entities = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Collection { path, entities })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Natural keys currently present, for the pre-fetch dedup check.
    /// Matching is exact and case-sensitive.
    pub fn natural_keys(&self) -> HashSet<String> {
        self.entities.iter().map(|e| e.name.clone()).collect()
    }

    /// Merge staged entities: drafts whose natural key is already present
    /// are skipped (logged, never an error), the rest append in order, and
    /// missing ids are assigned in one pass. Returns how many were added.
    pub fn merge_batch(&mut self, staged: Vec<CommittedEntity>) -> usize {
        let mut keys = self.natural_keys();
        let mut added = 0;
        for entity in staged {
            if keys.contains(&entity.name) {
                info!("{}, skipping", PipelineError::DuplicateKey(entity.name));
                continue;
            }
            keys.insert(entity.name.clone());
            self.entities.push(entity);
            added += 1;
        }
        self.assign_ids();
        added
    }

    /// Entities lacking an id receive `(max existing id) + 1` onward, in
    /// collection order, so ids stay unique and dense from 1 for
    /// collections built from empty.
    fn assign_ids(&mut self) {
        let mut next = self.entities.iter().filter_map(|e| e.id).max().unwrap_or(0);
        for entity in &mut self.entities {
            if entity.id.is_none() {
                next += 1;
                entity.id = Some(next);
            }
        }
    }

    /// Serialize the whole collection and write it back in one atomic step:
    /// pretty-printed JSON to a temp file in the same directory, then a
    /// rename over the original. A crash mid-write leaves the prior file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entities)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ── Tests ──
