use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// One instance is one container handle. All reads go through a single
/// mutex-guarded file descriptor, so seek-then-read pairs never interleave
/// between callers sharing the handle.
pub struct FileRangeReader {
    path: PathBuf,
    identifier: String,
    size: u64,
    file: Mutex<File>,
}

impl FileRangeReader {
    /// Open `path` for positional reads.
    ///
    /// Returns `IoError::NotFound` if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let file = File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IoError::NotFound(identifier.clone()),
            _ => IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            },
        })?;

        let size = file
            .metadata()
            .await
            .map_err(|e| IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Self {
            path,
            identifier,
            size,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, e: std::io::Error) -> IoError {
        IoError::Read {
            path: self.identifier.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.read_error(e))?;
        file.read_exact(&mut buf).await.map_err(|e| match e.kind() {
            // File shrank underneath us
            ErrorKind::UnexpectedEof => IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            },
            _ => self.read_error(e),
        })?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
