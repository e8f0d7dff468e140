use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{
    clean_staging_directory, ensure_staging_directory, Config, SECRET_VERSION_LATEST,
};
use crate::dedup::remove_duplicates;
use crate::downloader::{BulkDownloader, DownloadOptions};
use crate::errors::AppResult;
use crate::logging::LOG_PREFIX;
use crate::models::Export;
use crate::secrets::{resolve_credentials, SecretStore};
use crate::storage::StorageConnector;
use crate::trigger::TriggerFile;
use crate::uploader::upload_staged_images;

/// Outcome of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub extracted: usize,
    pub download_errors: u64,
    pub uploaded: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Fetch an export, download the images it references and store them next to it.
pub struct TwitterImager {
    config: Config,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn StorageConnector>,
    downloader: Arc<dyn BulkDownloader>,
}

impl TwitterImager {
    pub fn new(
        config: Config,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn StorageConnector>,
        downloader: Arc<dyn BulkDownloader>,
    ) -> Self {
        Self {
            config,
            secrets,
            connector,
            downloader,
        }
    }

    /// Run every stage for one trigger. Any `Err` aborts the run.
    pub async fn run(&self, trigger: &TriggerFile) -> AppResult<RunReport> {
        trigger.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::debug!("Run {} started for {}", run_id, trigger.object_key());

        if self.config.secret_version != SECRET_VERSION_LATEST {
            log::debug!(
                "SECRET_VERSION={} ignored, reading the {} version",
                self.config.secret_version,
                SECRET_VERSION_LATEST
            );
        }
        let credentials =
            resolve_credentials(self.secrets.as_ref(), &self.config.secret_resource()).await?;
        let store = self.connector.connect(credentials).await?;

        let object_key = trigger.object_key();
        let body = store.get_object(&object_key).await?;
        let export = Export::from_slice(&body)?;
        log::debug!("Decoded {} ({} tweets)", object_key, export.tweet_count());

        let urls = remove_duplicates(export.image_urls());
        log::info!("{} Extracted {} URLs.", LOG_PREFIX, urls.len());

        let staging_dir = &self.config.staging_dir;
        ensure_staging_directory(staging_dir)?;
        if self.config.clean_staging {
            let removed = clean_staging_directory(staging_dir)?;
            if removed > 0 {
                log::debug!("Removed {} stale files from {}", removed, staging_dir.display());
            }
        }

        let options = DownloadOptions::from_config(&self.config);
        let download_errors = self.downloader.download(&urls, &options).await?;
        log::info!(
            "{} Downloaded images. (Error: {})",
            LOG_PREFIX,
            download_errors
        );

        let summary = upload_staged_images(store.as_ref(), staging_dir, trigger).await?;
        log::info!("{} Saved {} images to S3.", LOG_PREFIX, summary.uploaded);

        if summary.skipped > 0 {
            log::warn!(
                "{} {} staged files could not be uploaded",
                LOG_PREFIX,
                summary.skipped
            );
        }

        Ok(RunReport {
            run_id,
            extracted: urls.len(),
            download_errors,
            uploaded: summary.uploaded,
            skipped: summary.skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
