//! Contract with the external pyramid conversion runner.
//!
//! Files that are not already tiled pyramids are handed to an outside job
//! system that writes a compatible TIFF. This module only defines how the
//! engine asks for a conversion and reads back its outcome; it never runs
//! or retries conversions itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ConversionError;
use crate::source::TileSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobRef(pub String);

impl std::fmt::Display for JobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    /// Carries the file reference of the converted output
    Success(String),
    Failure(ConversionError),
}

#[async_trait]
pub trait ConversionJobs: Send + Sync {
    async fn request_conversion(&self, file_ref: &str) -> Result<JobRef, ConversionError>;

    async fn query_status(&self, job: &JobRef) -> Result<JobStatus, ConversionError>;
}

/// Check that a converted output can actually be served.
pub fn verify_output(source: &dyn TileSource) -> Result<(), ConversionError> {
    let metadata = source.metadata();
    if metadata.levels < 1 || metadata.min_level >= metadata.levels {
        return Err(ConversionError::NoUsableLevels);
    }
    Ok(())
}

// =============================================================================
// In-memory job board
// =============================================================================

#[derive(Debug, Clone)]
struct JobEntry {
    file_ref: String,
    status: JobStatus,
}

/// Local bookkeeping of conversion jobs. The runner reports back through
/// [`InMemoryJobBoard::complete`] and [`InMemoryJobBoard::fail`].
#[derive(Debug, Default)]
pub struct InMemoryJobBoard {
    jobs: RwLock<HashMap<JobRef, JobEntry>>,
    next_id: AtomicU64,
}

impl InMemoryJobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished conversion that produced `levels` pyramid levels.
    pub async fn complete(
        &self,
        job: &JobRef,
        output_ref: impl Into<String>,
        levels: u32,
    ) -> Result<(), ConversionError> {
        let status = if levels < 1 {
            JobStatus::Failure(ConversionError::NoUsableLevels)
        } else {
            JobStatus::Success(output_ref.into())
        };
        self.set_status(job, status).await
    }

    pub async fn fail(&self, job: &JobRef, message: impl Into<String>) -> Result<(), ConversionError> {
        self.set_status(job, JobStatus::Failure(ConversionError::Failed(message.into())))
            .await
    }

    /// The file a job was requested for.
    pub async fn file_ref(&self, job: &JobRef) -> Option<String> {
        self.jobs.read().await.get(job).map(|e| e.file_ref.clone())
    }

    async fn set_status(&self, job: &JobRef, status: JobStatus) -> Result<(), ConversionError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job)
            .ok_or_else(|| ConversionError::UnknownJob(job.0.clone()))?;
        info!(job = %job, file = %entry.file_ref, status = ?status, "Conversion finished");
        entry.status = status;
        Ok(())
    }
}

#[async_trait]
impl ConversionJobs for InMemoryJobBoard {
    async fn request_conversion(&self, file_ref: &str) -> Result<JobRef, ConversionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = JobRef(format!("job-{}", id));
        self.jobs.write().await.insert(
            job.clone(),
            JobEntry {
                file_ref: file_ref.to_string(),
                status: JobStatus::Pending,
            },
        );
        info!(job = %job, file = file_ref, "Conversion requested");
        Ok(job)
    }

    async fn query_status(&self, job: &JobRef) -> Result<JobStatus, ConversionError> {
        self.jobs
            .read()
            .await
            .get(job)
            .map(|e| e.status.clone())
            .ok_or_else(|| ConversionError::UnknownJob(job.0.clone()))
    }
}
