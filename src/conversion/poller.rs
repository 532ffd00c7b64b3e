//! Fixed-interval status polling for a submitted conversion job

use super::wire::{JobResult, JobState, JobStatus};
use crate::error::NetworkError;
use std::thread;
use std::time::Duration;

/// Message shown when a status request fails; polling carries on regardless
pub const STATUS_FETCH_FAILED: &str = "Could not fetch status";

/// Default delay between status requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Where job status comes from
pub trait StatusSource {
    fn fetch_status(&self, job_id: &str) -> Result<JobStatus, NetworkError>;
    fn fetch_result(&self, job_id: &str) -> Result<JobResult, NetworkError>;
}

/// What a user watching the job sees
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobView {
    pub status: Option<JobState>,
    pub progress: f64,
    pub message: String,
    pub download_url: Option<String>,
}

impl JobView {
    /// State right after the upload was accepted
    pub fn submitted() -> Self {
        Self {
            status: Some(JobState::Pending),
            progress: 0.0,
            message: "Queued for processing...".to_string(),
            download_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(JobState::is_terminal)
    }
}

pub struct JobPoller<S> {
    source: S,
    interval: Duration,
}

impl<S: StatusSource> JobPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// One status request, folded into `view`. Returns true once terminal.
    pub fn poll_once(&self, job_id: &str, view: &mut JobView) -> bool {
        let status = match self.source.fetch_status(job_id) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job = job_id, error = %e, "status fetch failed");
                view.message = STATUS_FETCH_FAILED.to_string();
                return false;
            }
        };

        view.status = status.status;
        view.progress = status.progress;
        view.message = status.message;

        if view.status == Some(JobState::Done) {
            // Fetched exactly once; a non-success answer leaves no download link
            match self.source.fetch_result(job_id) {
                Ok(result) => view.download_url = Some(result.download_url),
                Err(NetworkError::Status { status, .. }) => {
                    tracing::warn!(job = job_id, status, "result not available");
                }
                Err(e) => {
                    tracing::warn!(job = job_id, error = %e, "result fetch failed");
                    view.message = STATUS_FETCH_FAILED.to_string();
                }
            }
        }
        view.is_terminal()
    }

    /// Poll every interval until the job is done or failed
    ///
    /// `on_update` sees the view after every request, including failed ones.
    pub fn run(&self, job_id: &str, mut on_update: impl FnMut(&JobView)) -> JobView {
        let mut view = JobView::submitted();
        loop {
            thread::sleep(self.interval);
            let finished = self.poll_once(job_id, &mut view);
            on_update(&view);
            if finished {
                tracing::info!(
                    job = job_id,
                    status = view.status.map(JobState::as_str).unwrap_or("unknown"),
                    "conversion job finished"
                );
                return view;
            }
        }
    }
}
