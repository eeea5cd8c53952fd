//! In-memory progress tracking for ingestion batches.
//!
//! One [`IngestJobTracker`] is shared (via `Arc`) between the service that
//! hands out job ids and every ingestion task. Each mutation takes the lock,
//! updates the counter, and returns a snapshot, so increment-then-check is
//! atomic even with several batches running at once.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::warn;

use crate::models::IngestJob;

#[derive(Debug, Default)]
pub struct IngestJobTracker {
    jobs: RwLock<HashMap<String, IngestJob>>,
}

impl IngestJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch of `total` documents.
    ///
    /// Registering an id that already exists is a no-op, so the service can
    /// register a job before spawning the task that registers it again.
    pub fn start(&self, job_id: &str, total: usize) -> IngestJob {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.entry(job_id.to_string())
            .or_insert_with(|| IngestJob {
                id: job_id.to_string(),
                total,
                processed: 0,
                failed: 0,
                done: false,
            })
            .clone()
    }

    /// Counts one more document as processed. Clamped at `total`.
    pub fn advance(&self, job_id: &str) -> Option<IngestJob> {
        self.update(job_id, |job| {
            if job.processed < job.total {
                job.processed += 1;
            } else {
                warn!(job_id = %job.id, total = job.total, "advance past total ignored");
            }
        })
    }

    /// Counts one document as failed. Does not advance `processed`.
    pub fn record_failure(&self, job_id: &str) -> Option<IngestJob> {
        self.update(job_id, |job| {
            if job.failed < job.total {
                job.failed += 1;
            }
        })
    }

    /// Marks the job done once every document has been processed.
    ///
    /// Returns `false` (and leaves the job open) when the job is unknown or
    /// still has documents outstanding.
    pub fn complete(&self, job_id: &str) -> bool {
        let updated = self.update(job_id, |job| {
            if job.processed == job.total {
                job.done = true;
            } else {
                warn!(
                    job_id = %job.id,
                    processed = job.processed,
                    total = job.total,
                    "complete called with documents outstanding"
                );
            }
        });
        updated.map(|job| job.done).unwrap_or(false)
    }

    pub fn status(&self, job_id: &str) -> Option<IngestJob> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, job_id: &str, f: impl FnOnce(&mut IngestJob)) -> Option<IngestJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = jobs.get_mut(job_id)?;
        if job.done {
            return Some(job.clone());
        }
        f(job);
        Some(job.clone())
    }
}
