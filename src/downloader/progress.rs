use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedDownload {
    pub url: String,
    pub error: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadProgress {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub bytes_written: u64,
    pub failed_downloads: Vec<FailedDownload>,
}

impl DownloadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failed_downloads.len()
    }
}

/// Shared between the download tasks of one bulk download.
pub type ProgressState = Arc<Mutex<DownloadProgress>>;

pub fn new_progress_state(total: usize) -> ProgressState {
    Arc::new(Mutex::new(DownloadProgress::new(total)))
}

/// Apply `f` under the lock; a poisoned lock is logged and skipped.
fn safe_progress_update<F>(progress_state: &ProgressState, operation: &str, f: F) -> bool
where
    F: FnOnce(&mut DownloadProgress),
{
    match progress_state.lock() {
        Ok(mut progress) => {
            f(&mut progress);
            true
        }
        Err(e) => {
            log::error!(
                "Failed to acquire progress lock for {} (non-critical): {}",
                operation,
                e
            );
            false
        }
    }
}

pub fn progress_snapshot(progress_state: &ProgressState) -> DownloadProgress {
    match progress_state.lock() {
        Ok(progress) => progress.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn update_progress_success(progress_state: &ProgressState, url: &str, bytes: u64) {
    safe_progress_update(progress_state, "success update", |progress| {
        progress.completed += 1;
        progress.succeeded += 1;
        progress.bytes_written += bytes;

        log::debug!(
            "Progress: Downloaded {} ({} bytes, {}/{})",
            url,
            bytes,
            progress.completed,
            progress.total
        );
    });
}

pub fn update_progress_failure(progress_state: &ProgressState, url: &str, error: String, attempts: u32) {
    safe_progress_update(progress_state, "failure update", |progress| {
        progress.completed += 1;

        log::warn!(
            "Progress: Failed to download {} after {} attempt(s) - {} ({}/{})",
            url,
            attempts,
            error,
            progress.completed,
            progress.total
        );

        progress.failed_downloads.push(FailedDownload {
            url: url.to_string(),
            error,
            attempts,
        });
    });
}

/// A URL that was never started because the error threshold had been reached.
pub fn update_progress_skipped(progress_state: &ProgressState, url: &str) {
    safe_progress_update(progress_state, "skip update", |progress| {
        progress.completed += 1;
        progress.skipped += 1;
        log::debug!("Progress: Skipped {} after reaching the error limit", url);
    });
}
