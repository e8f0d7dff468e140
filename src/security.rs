use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

use crate::errors::{AppError, AppResult};

const MAX_FILE_NAME_LEN: usize = 255;

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| {
        Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static filename pattern is valid")
    })
}

/// Replace characters that are unsafe in file names and cap the length.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized = unsafe_chars().replace_all(filename.trim(), "_");

    if sanitized.len() > MAX_FILE_NAME_LEN {
        let mut cut = MAX_FILE_NAME_LEN - 3;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &sanitized[..cut])
    } else {
        sanitized.to_string()
    }
}

/// Local file name for a download: the URL's last path segment, sanitised.
pub fn file_name_from_url(url: &str) -> AppResult<String> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| AppError::download(url, format!("invalid URL: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::download(url, "only http(s) URLs can be downloaded"));
    }

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let name = sanitize_filename(segment);
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::download(url, "URL has no file name"));
    }

    Ok(name)
}
