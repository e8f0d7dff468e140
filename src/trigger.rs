//! The event that starts a run: which export to process and where its images go.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{AppError, AppResult};

/// Prefix of the folder the re-uploaded images land in.
pub const IMAGE_FOLDER_PREFIX: &str = "images_";

/// Pub/Sub push envelope; `data` is base64 of a [`TriggerFile`] JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubMessage {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerFile {
    pub path: String,
    pub name: String,
}

impl PubSubMessage {
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::invalid_trigger(format!("malformed envelope: {}", e)))
    }

    pub fn decode(&self) -> AppResult<TriggerFile> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| AppError::invalid_trigger(format!("data is not base64: {}", e)))?;
        let file: TriggerFile = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::invalid_trigger(format!("data is not a file reference: {}", e)))?;
        file.validate()?;
        Ok(file)
    }
}

impl TriggerFile {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "Export file name cannot be empty"));
        }
        Ok(())
    }

    /// Storage key of the export document.
    pub fn object_key(&self) -> String {
        join_key(&[&self.path, &self.name])
    }

    /// Folder for this export's images: `<path>/images_<stem of name>`.
    pub fn image_prefix(&self) -> String {
        let folder = format!("{}{}", IMAGE_FOLDER_PREFIX, export_stem(&self.name));
        join_key(&[&self.path, &folder])
    }

    pub fn image_key(&self, file_name: &str) -> String {
        join_key(&[&self.image_prefix(), file_name])
    }
}

/// Base name of the export with its final extension removed.
fn export_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Join key segments with `/`, dropping empty segments and doubled separators.
pub fn join_key(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|segment| segment.split('/'))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
