//! Local disk file storage for user uploads and synthesised audio.

use anyhow::{Context, Result};
use async_trait::async_trait;
use omniverse_core::media::FileUploader;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Writes files under `dir` and returns URLs under `public_path`.
#[derive(Debug, Clone)]
pub struct LocalDiskUploader {
    dir: PathBuf,
    public_path: String,
}

impl LocalDiskUploader {
    pub fn new(dir: PathBuf, public_path: impl Into<String>) -> Self {
        Self {
            dir,
            public_path: public_path.into(),
        }
    }
}

/// Reduces a client-supplied name to a safe single path component.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl FileUploader for LocalDiskUploader {
    async fn upload(&self, file_name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.dir.display()))?;

        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.dir.join(&stored_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        debug!(%mime_type, size = bytes.len(), path = %path.display(), "Stored upload");
        Ok(format!("{}/{}", self.public_path, stored_name))
    }
}
