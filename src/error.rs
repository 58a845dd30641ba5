use std::time::Duration;

use thiserror::Error;

/// Pipeline error taxonomy. Everything here except an `Io` failure during
/// the final collection write-back is recovered locally: logged, the
/// affected candidate dropped or degraded, and the batch continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("more than {limit} redirects fetching {url}")]
    RedirectLimit { limit: usize, url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("no usable description found for '{0}'")]
    ExtractionEmpty(String),

    #[error("unsupported content type {content_type:?} from {url}")]
    UnsupportedContent {
        content_type: Option<String>,
        url: String,
    },

    #[error("verifier confidence {0:.2} below floor")]
    LowConfidence(f32),

    #[error("natural key '{0}' already present")]
    DuplicateKey(String),

    #[error("malformed collection file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
