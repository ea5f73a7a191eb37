//! On-disk storage for uploaded document files.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// A file written to storage
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the contents, hex encoded
    pub hash: String,
}

/// Stores uploads under `<root>/<project_id>/<uuid>_<filename>`
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn save(
        &self,
        project_id: i64,
        filename: &str,
        content: &[u8],
    ) -> ServiceResult<StoredFile> {
        let dir = self.root.join(project_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(ServiceError::Storage)?;

        let path = dir.join(format!(
            "{}_{}",
            uuid::Uuid::new_v4(),
            sanitize_filename(filename)
        ));
        tokio::fs::write(&path, content)
            .await
            .map_err(ServiceError::Storage)?;

        debug!(path = %path.display(), size = content.len(), "Stored uploaded file");

        Ok(StoredFile {
            path,
            size: content.len() as u64,
            hash: content_hash(content),
        })
    }

    /// Remove a stored file. Failures are logged, not returned.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete stored file");
        }
    }
}

/// SHA-256 of a byte slice as lowercase hex
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Keep only the final path component and replace characters unsafe in filenames
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}
