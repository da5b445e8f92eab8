//! Resolving opaque file identifiers to readable paths.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::TileError;

/// A resolved file and its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub content_type: Option<String>,
}

/// Maps an identifier to a file on disk.
#[async_trait]
pub trait StorageResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<ResolvedFile, TileError>;
}

/// Identifiers are paths relative to `root`. Anything that would leave the
/// root is refused.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageResolver for LocalStorage {
    async fn resolve(&self, id: &str) -> Result<ResolvedFile, TileError> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || escapes {
            return Err(TileError::input(format!("Invalid file identifier: {}", id)));
        }
        let path = self.root.join(relative);
        existing(path).await
    }
}

/// Identifiers are filesystem paths used as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPaths;

#[async_trait]
impl StorageResolver for DirectPaths {
    async fn resolve(&self, id: &str) -> Result<ResolvedFile, TileError> {
        existing(PathBuf::from(id)).await
    }
}

async fn existing(path: PathBuf) -> Result<ResolvedFile, TileError> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {
            let content_type = content_type_for(&path).map(str::to_string);
            debug!(path = %path.display(), ?content_type, "Resolved file");
            Ok(ResolvedFile { path, content_type })
        }
        _ => Err(TileError::absent(format!(
            "File not found: {}",
            path.display()
        ))),
    }
}

/// Content type declared by the file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "tif" | "tiff" | "ptif" | "svs" => Some("image/tiff"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}
