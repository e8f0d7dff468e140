//! Downloads the images referenced by an archived Twitter export and stores
//! them next to the export in S3-compatible object storage.

pub mod config;
pub mod dedup;
pub mod downloader;
pub mod errors;
pub mod extractor;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod secrets;
pub mod security;
pub mod storage;
pub mod trigger;
pub mod uploader;

pub use config::Config;
pub use dedup::remove_duplicates;
pub use errors::{AppError, AppResult};
pub use extractor::extract_image_urls;
pub use models::Export;
pub use pipeline::{RunReport, TwitterImager};
pub use trigger::{PubSubMessage, TriggerFile};
