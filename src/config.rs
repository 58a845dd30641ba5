use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

/// Runtime settings. Every field can be overridden through the environment
/// with a `CHRONICLE_` prefix, e.g. `CHRONICLE_MIN_REQUEST_INTERVAL_MS=500`
/// or `CHRONICLE_VERIFIER_URL=http://localhost:9090/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the persisted collections (people.json, events.json).
    pub data_dir: PathBuf,
    /// Content store for downloaded images.
    pub image_dir: PathBuf,
    /// Minimum delay between outbound page fetches, shared across workers.
    pub min_request_interval_ms: u64,
    pub fetch_timeout_secs: u64,
    pub image_timeout_secs: u64,
    /// Budget for one subject's full fetch→extract→verify→image run.
    pub subject_timeout_secs: u64,
    pub workers: usize,
    /// Verifier confidence below this discards the candidate outright.
    pub confidence_floor: f32,
    /// Remote verifier endpoint; the built-in heuristic judge is used when unset.
    pub verifier_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("data"),
            image_dir: PathBuf::from("data/images"),
            min_request_interval_ms: 2000,
            fetch_timeout_secs: 30,
            image_timeout_secs: 15,
            subject_timeout_secs: 120,
            workers: 4,
            confidence_floor: 0.5,
            verifier_url: None,
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("CHRONICLE").try_parsing(true))
            .build()
            .ok()
            .and_then(|c| c.try_deserialize().ok())
            .unwrap_or_default();
        debug!(?settings, "settings loaded");
        settings
    }
}

// ── Tests ──
