use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{PipelineError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; chronicle/0.1)";
const MAX_REDIRECTS: usize = 5;
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Content store for entity images: a flat directory of write-once files
/// keyed by sanitized subject name plus a detected extension. Failed
/// downloads never leave partial files behind.
pub struct ImageStore {
    client: reqwest::Client,
    dir: PathBuf,
    timeout: Duration,
}

impl ImageStore {
    pub fn new(dir: &Path, timeout_secs: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        // Redirects are followed by hand so the hop count stays capped
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(ImageStore {
            client,
            dir: dir.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Download `url` into the store under a filename derived from
    /// `subject`. Returns the destination path; on any failure the partial
    /// file is removed before the error propagates.
    pub async fn acquire(&self, url: &str, subject: &str) -> Result<PathBuf> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(PipelineError::InvalidUrl(url.to_string()));
        }
        let filename = format!("{}.{}", sanitize_name(subject), guess_extension(url));
        let dest = self.dir.join(filename);

        match tokio::time::timeout(self.timeout, self.download(url, &dest)).await {
            Ok(Ok(())) => Ok(dest),
            Ok(Err(e)) => {
                let _ = std::fs::remove_file(&dest);
                Err(e)
            }
            Err(_) => {
                let _ = std::fs::remove_file(&dest);
                Err(PipelineError::Timeout(self.timeout))
            }
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.get_following_redirects(url).await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(PipelineError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !content_type.as_deref().unwrap_or("").starts_with("image/") {
            return Err(PipelineError::UnsupportedContent {
                content_type,
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        debug!("stored image at {}", dest.display());
        Ok(())
    }

    /// Re-issue the request against the Location header on 301/302, at most
    /// MAX_REDIRECTS hops.
    async fn get_following_redirects(&self, url: &str) -> Result<reqwest::Response> {
        let mut current = url.to_string();
        for _ in 0..=MAX_REDIRECTS {
            let response = self.client.get(&current).send().await?;
            let status = response.status().as_u16();
            if status != 301 && status != 302 {
                return Ok(response);
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| PipelineError::HttpStatus {
                    status,
                    url: current.clone(),
                })?;
            current = response
                .url()
                .join(location)
                .map_err(|_| PipelineError::InvalidUrl(location.to_string()))?
                .to_string();
        }
        Err(PipelineError::RedirectLimit {
            limit: MAX_REDIRECTS,
            url: url.to_string(),
        })
    }
}

/// Deterministic filename stem: alphanumeric characters (CJK included)
/// survive, everything else becomes an underscore.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Extension guessed from the URL path; `jpg` when undetectable.
pub fn guess_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    IMAGE_EXTS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("jpg")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_sanitize_to_safe_stems() {
        assert_eq!(sanitize_name("秦始皇"), "秦始皇");
        assert_eq!(sanitize_name("a/b c"), "a_b_c");
        assert_eq!(sanitize_name("!!"), "__");
        assert_eq!(sanitize_name(""), "image");
    }

    #[test]
    fn extensions_detected_from_url() {
        assert_eq!(guess_extension("https://x.com/a.png"), "png");
        assert_eq!(guess_extension("https://x.com/a.JPEG?w=200"), "jpeg");
        assert_eq!(guess_extension("https://x.com/a.webp#frag"), "webp");
    }

    #[test]
    fn unknown_extensions_default_to_jpg() {
        assert_eq!(guess_extension("https://x.com/a.svg"), "jpg");
        assert_eq!(guess_extension("https://x.com/noext"), "jpg");
    }

    #[tokio::test]
    async fn non_http_schemes_rejected_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 15).unwrap();
        let result = store.acquire("ftp://example.com/a.jpg", "张三").await;
        assert!(matches!(result, Err(PipelineError::InvalidUrl(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
