// Bulk image download - fetches a URL list into a local directory
//
// The orchestrator only sees the `BulkDownloader` trait and an error count;
// `HttpDownloader` is the production implementation.

pub mod http_downloader;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::time::Duration;

use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Name prefix of bodies still being written to the output directory.
pub const PARTIAL_FILE_PREFIX: &str = ".download-";

pub use http_downloader::HttpDownloader;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub output: PathBuf,
    pub max_concurrents: usize,
    /// Stop starting new downloads once this many have failed. 0 means no limit.
    pub max_error_requests: u64,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl DownloadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output: config.staging_dir.clone(),
            max_concurrents: config.max_concurrents,
            max_error_requests: config.max_error_requests,
            max_attempts: config.max_attempts,
            timeout: config.download_timeout,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrents == 0 {
            return Err(AppError::validation("max_concurrents", "Must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(AppError::validation("max_attempts", "Must be greater than 0"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(AppError::validation("output", "Output directory cannot be empty"));
        }
        Ok(())
    }

    pub fn error_limit_reached(&self, errors: u64) -> bool {
        self.max_error_requests > 0 && errors >= self.max_error_requests
    }
}

/// Downloads a list of URLs into `options.output`.
#[async_trait]
pub trait BulkDownloader: Send + Sync {
    /// Returns how many URLs failed. `Err` only when the download could not start.
    async fn download(&self, urls: &[String], options: &DownloadOptions) -> AppResult<u64>;
}
