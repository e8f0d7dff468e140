use image::ImageFormat;
use std::path::{Path, PathBuf};

use crate::downloader::PARTIAL_FILE_PREFIX;
use crate::errors::AppResult;
use crate::storage::ObjectStore;
use crate::trigger::TriggerFile;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
}

/// Content type from the bytes, then the extension, then a generic fallback.
pub fn detect_content_type(path: &Path, data: &[u8]) -> &'static str {
    image::guess_format(data)
        .or_else(|_| ImageFormat::from_path(path))
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Regular files in `dir`, sorted by name, without leftover partial downloads.
/// Failing to read the directory is fatal.
pub fn staged_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(PARTIAL_FILE_PREFIX) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Upload every staged file under the trigger's image folder.
///
/// A file that cannot be read or stored is logged and skipped; nothing is
/// retried and later files are still attempted.
pub async fn upload_staged_images(
    store: &dyn ObjectStore,
    staging_dir: &Path,
    trigger: &TriggerFile,
) -> AppResult<UploadSummary> {
    let files = staged_files(staging_dir)?;
    let mut summary = UploadSummary::default();

    log::debug!(
        "Uploading {} staged files to {}",
        files.len(),
        trigger.image_prefix()
    );

    for path in files {
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                summary.skipped += 1;
                continue;
            }
        };

        let key = trigger.image_key(&file_name);
        let content_type = detect_content_type(&path, &data);

        match store.put_object(&key, data, content_type).await {
            Ok(()) => {
                summary.uploaded += 1;
                log::debug!("Uploaded {} ({})", key, content_type);
            }
            Err(e) => {
                log::warn!("Failed to upload {}: {}", key, e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
