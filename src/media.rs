use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UploadedImage;

/// Sub-directory of the media root that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

/// Uploaded files on local disk, addressed by paths relative to `root`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MediaStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image as `posts/<name>`, adding a random suffix when the name is taken.
    /// Returns the stored path relative to the media root.
    pub async fn save_post_image(&self, image: &UploadedImage) -> Result<String, AppError> {
        let dir = self.root.join(POST_IMAGE_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating media directory {}", dir.display()))?;

        let name = sanitize_file_name(&image.file_name);
        let mut candidate = name.clone();

        loop {
            let path = dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(&image.data)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    file.flush().await.with_context(|| format!("flushing {}", path.display()))?;

                    let stored = format!("{}/{}", POST_IMAGE_DIR, candidate);
                    info!("Stored uploaded image at {} ({} bytes)", stored, image.data.len());
                    return Ok(stored);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&name, &Uuid::new_v4().simple().to_string()[..7]);
                }
                Err(e) => {
                    return Err(AppError::Internal(
                        anyhow::Error::new(e).context(format!("creating {}", path.display())),
                    ));
                }
            }
        }
    }

    /// Removes a stored file whose post row was never written. Failures are only logged.
    pub async fn discard(&self, stored: &str) {
        let path = self.root.join(stored);
        match fs::remove_file(&path).await {
            Ok(()) => info!("Discarded unused upload {}", stored),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to discard unused upload {}: {}", path.display(), e),
        }
    }
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", name, suffix),
    }
}
