//! Filesystem-backed storage collaborator.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CollaboratorError;

/// Where a stored artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub location: String,
    pub size: u64,
}

/// Reads source assets and persists produced artifacts.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Read the raw bytes of a source asset.
    async fn load(&self, asset: &str) -> Result<Vec<u8>, CollaboratorError>;

    /// Persist `bytes` as `logical_name` under `destination`.
    async fn store(
        &self,
        bytes: Vec<u8>,
        logical_name: &str,
        destination: &str,
    ) -> Result<StoredObject, CollaboratorError>;

    /// Destination path for artifacts produced for `item` on behalf of `owner`.
    fn resolve_destination_path(&self, owner: &str, item: &str) -> String;
}

/// Storage rooted at two local directories: one for source assets, one for outputs.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    assets_root: PathBuf,
    output_root: PathBuf,
}

impl LocalStorage {
    pub fn new(assets_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn load(&self, asset: &str) -> Result<Vec<u8>, CollaboratorError> {
        let path = resolve_relative(&self.assets_root, asset)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| CollaboratorError::Storage {
                path: path.display().to_string(),
                source,
            })
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        logical_name: &str,
        destination: &str,
    ) -> Result<StoredObject, CollaboratorError> {
        if logical_name.is_empty() || logical_name.contains(['/', '\\']) {
            return Err(CollaboratorError::InvalidPath(logical_name.to_string()));
        }
        let dir = resolve_relative(&self.output_root, destination)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CollaboratorError::Storage {
                path: dir.display().to_string(),
                source,
            })?;

        let path = dir.join(logical_name);
        let size = bytes.len() as u64;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| CollaboratorError::Storage {
                path: path.display().to_string(),
                source,
            })?;

        debug!(path = %path.display(), size, "stored artifact");
        Ok(StoredObject {
            location: path.display().to_string(),
            size,
        })
    }

    fn resolve_destination_path(&self, owner: &str, item: &str) -> String {
        format!("{}/{}", sanitize_segment(owner), sanitize_segment(item))
    }
}

/// Join a caller-supplied relative path onto `root`, refusing anything that could escape it.
pub(crate) fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf, CollaboratorError> {
    let candidate = Path::new(relative);
    if relative.is_empty()
        || !candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(CollaboratorError::InvalidPath(relative.to_string()));
    }
    Ok(root.join(candidate))
}

/// Reduce an arbitrary identifier to a single safe path segment.
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}
