// 🧾 Job table
// submit → poll → download bookkeeping for the server. In memory only: no
// persistence, no expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Started,
    Success,
    Failure,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }
}

/// Public view of a job, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub state: JobState,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct JobRecord {
    status: JobStatus,
    input_hash: String,
    result: Option<Arc<Vec<u8>>>,
}

/// Result of [`JobStore::download`].
#[derive(Debug, Clone, PartialEq)]
pub enum Download {
    Ready(Arc<Vec<u8>>),
    NotReady(JobState),
    Failed(String),
}

/// SHA-256 of the uploaded bytes, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<Uuid, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, JobRecord>> {
        // poisoned by a panicked job: keep serving the rest
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an upload. Returns `(job_id, created)`; `created == false` means
    /// an identical upload is still queued or running and its id is reused.
    pub fn submit(&self, input: &[u8]) -> (Uuid, bool) {
        let input_hash = fingerprint(input);
        let mut jobs = self.lock();

        if let Some(existing) = jobs
            .values()
            .find(|job| job.input_hash == input_hash && !job.status.state.is_finished())
        {
            info!(job_id = %existing.status.job_id, "identical upload already in flight");
            return (existing.status.job_id, false);
        }

        let now = Utc::now();
        let job_id = Uuid::new_v4();
        jobs.insert(
            job_id,
            JobRecord {
                status: JobStatus {
                    job_id,
                    state: JobState::Pending,
                    processed: 0,
                    total: 0,
                    error: None,
                    created_at: now,
                    updated_at: now,
                },
                input_hash,
                result: None,
            },
        );

        info!(%job_id, "job submitted");
        (job_id, true)
    }

    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.lock().get(&job_id).map(|job| job.status.clone())
    }

    fn update<F: FnOnce(&mut JobRecord)>(&self, job_id: Uuid, change: F) {
        if let Some(job) = self.lock().get_mut(&job_id) {
            change(job);
            job.status.updated_at = Utc::now();
        }
    }

    pub fn mark_started(&self, job_id: Uuid) {
        self.update(job_id, |job| job.status.state = JobState::Started);
        info!(%job_id, "job started");
    }

    pub fn record_progress(&self, job_id: Uuid, processed: usize, total: usize) {
        self.update(job_id, |job| {
            job.status.processed = processed;
            job.status.total = total;
        });
    }

    pub fn complete(&self, job_id: Uuid, output: Vec<u8>) {
        self.update(job_id, |job| {
            job.status.state = JobState::Success;
            job.result = Some(Arc::new(output));
        });
        info!(%job_id, "job succeeded");
    }

    pub fn fail(&self, job_id: Uuid, message: impl Into<String>) {
        let message = message.into();
        info!(%job_id, error = %message, "job failed");
        self.update(job_id, |job| {
            job.status.state = JobState::Failure;
            job.status.error = Some(message);
        });
    }

    pub fn download(&self, job_id: Uuid) -> Option<Download> {
        let jobs = self.lock();
        let job = jobs.get(&job_id)?;
        Some(match (&job.status.state, &job.result) {
            (JobState::Success, Some(bytes)) => Download::Ready(Arc::clone(bytes)),
            (JobState::Failure, _) => {
                Download::Failed(job.status.error.clone().unwrap_or_default())
            }
            (state, _) => Download::NotReady(*state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let store = JobStore::new();
        let (id, created) = store.submit(b"planilha");
        assert!(created);
        assert_eq!(store.status(id).unwrap().state, JobState::Pending);
        assert_eq!(store.download(id), Some(Download::NotReady(JobState::Pending)));

        store.mark_started(id);
        store.record_progress(id, 1, 3);
        let status = store.status(id).unwrap();
        assert_eq!(status.state, JobState::Started);
        assert_eq!((status.processed, status.total), (1, 3));

        store.complete(id, vec![1, 2, 3]);
        assert_eq!(store.status(id).unwrap().state, JobState::Success);
        assert_eq!(store.download(id), Some(Download::Ready(Arc::new(vec![1, 2, 3]))));
    }

    #[test]
    fn test_failed_job_keeps_message() {
        let store = JobStore::new();
        let (id, _) = store.submit(b"x");
        store.fail(id, "input sheet must contain the 'cnpj_part' column");

        let status = store.status(id).unwrap();
        assert_eq!(status.state, JobState::Failure);
        assert_eq!(
            store.download(id),
            Some(Download::Failed(
                "input sheet must contain the 'cnpj_part' column".to_string()
            ))
        );
    }

    #[test]
    fn test_identical_upload_in_flight_is_reused() {
        let store = JobStore::new();
        let (first, _) = store.submit(b"same bytes");
        let (second, created) = store.submit(b"same bytes");
        assert_eq!(first, second);
        assert!(!created);

        // once finished, a fresh job is created
        store.complete(first, Vec::new());
        let (third, created) = store.submit(b"same bytes");
        assert_ne!(first, third);
        assert!(created);
    }

    #[test]
    fn test_unknown_job() {
        let store = JobStore::new();
        assert!(store.status(Uuid::new_v4()).is_none());
        assert!(store.download(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let hash = fingerprint(b"abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_status_serializes_celery_style_states() {
        let json = serde_json::to_value(JobState::Success).unwrap();
        assert_eq!(json, serde_json::json!("SUCCESS"));
    }
}
