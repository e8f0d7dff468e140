use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_MAX_CONCURRENTS: usize = 4;
pub const DEFAULT_MAX_ERROR_REQUESTS: u64 = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Version alias the storage credentials are always read from.
pub const SECRET_VERSION_LATEST: &str = "latest";

/// Everything a run needs, resolved once and handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub project_id: String,
    pub secret_name: String,
    pub secret_version: String,
    pub region: String,
    pub endpoint_url: String,
    pub bucket: String,
    pub staging_dir: PathBuf,
    pub max_concurrents: usize,
    pub max_error_requests: u64,
    pub max_attempts: u32,
    pub download_timeout: Duration,
    pub clean_staging: bool,
}

impl Config {
    /// Required settings with every tunable at its default.
    pub fn new(
        project_id: &str,
        secret_name: &str,
        secret_version: &str,
        region: &str,
        endpoint_url: &str,
        bucket: &str,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            secret_name: secret_name.to_string(),
            secret_version: secret_version.to_string(),
            region: region.to_string(),
            endpoint_url: endpoint_url.to_string(),
            bucket: bucket.to_string(),
            staging_dir: default_staging_directory(),
            max_concurrents: DEFAULT_MAX_CONCURRENTS,
            max_error_requests: DEFAULT_MAX_ERROR_REQUESTS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            clean_staging: false,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so callers need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> AppResult<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Config(format!("{} is not set", key)))
        };

        let mut config = Config::new(
            &required("PROJECT_ID")?,
            &required("SECRET_NAME")?,
            &required("SECRET_VERSION")?,
            &required("REGION_NAME")?,
            &required("ENDPOINT_URL")?,
            &required("BUCKET_NAME")?,
        );

        if let Some(dir) = optional(&lookup, "STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Some(value) = optional(&lookup, "MAX_CONCURRENTS") {
            config.max_concurrents = parse_number("MAX_CONCURRENTS", &value)?;
        }
        if let Some(value) = optional(&lookup, "MAX_ERROR_REQUESTS") {
            config.max_error_requests = parse_number("MAX_ERROR_REQUESTS", &value)?;
        }
        if let Some(value) = optional(&lookup, "MAX_ATTEMPTS") {
            config.max_attempts = parse_number("MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = optional(&lookup, "DOWNLOAD_TIMEOUT_SECS") {
            config.download_timeout =
                Duration::from_secs(parse_number("DOWNLOAD_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = optional(&lookup, "CLEAN_STAGING") {
            config.clean_staging = parse_flag("CLEAN_STAGING", &value)?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Full secret resource name in the secret store.
    ///
    /// Always the latest version; `SECRET_VERSION` must be set but does not
    /// select a version.
    pub fn secret_resource(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project_id, self.secret_name, SECRET_VERSION_LATEST
        )
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::validation(key, "Must be a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> AppResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::validation(key, "Must be true or false")),
    }
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    if config.max_concurrents == 0 {
        return Err(AppError::validation("max_concurrents", "Must be greater than 0"));
    }

    if config.max_attempts == 0 {
        return Err(AppError::validation("max_attempts", "Must be greater than 0"));
    }

    if config.download_timeout.is_zero() {
        return Err(AppError::validation("download_timeout", "Must be greater than 0"));
    }

    if !(config.endpoint_url.starts_with("http://") || config.endpoint_url.starts_with("https://")) {
        return Err(AppError::validation("endpoint_url", "Must be an http(s) URL"));
    }

    if config.bucket.contains('/') {
        return Err(AppError::validation("bucket", "Bucket name cannot contain '/'"));
    }

    Ok(())
}

pub fn default_staging_directory() -> PathBuf {
    std::env::temp_dir().join("images")
}

/// Create the staging directory if it does not exist yet.
pub fn ensure_staging_directory(dir: &Path) -> AppResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        log::debug!("Created staging directory {}", dir.display());
    }
    Ok(())
}

/// Remove regular files left in the staging directory by an earlier run.
pub fn clean_staging_directory(dir: &Path) -> AppResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove stale file {}: {}", path.display(), e);
            } else {
                removed += 1;
            }
        }
    }

    Ok(removed)
}
