//! One JSON object per log record on standard output, the shape Cloud Logging
//! picks up from function stdout: `{"severity": "...", "message": "..."}`.

use serde::Serialize;
use std::io::Write;

/// Prefix every milestone message carries.
pub const LOG_PREFIX: &str = "[TwitterImager]";

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    severity: &'a str,
    message: &'a str,
}

pub fn severity(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARNING",
        log::Level::Info => "INFO",
        log::Level::Debug | log::Level::Trace => "DEBUG",
    }
}

/// Render a single structured log line.
pub fn log_entry(severity: &str, message: &str) -> String {
    let entry = LogEntry { severity, message };
    serde_json::to_string(&entry).unwrap_or_else(|_| {
        format!(r#"{{"severity":"{}","message":"unserializable log message"}}"#, severity)
    })
}

/// Install the JSON formatter writing to `target`. Level comes from `RUST_LOG`,
/// `info` otherwise.
pub fn init_with_target(target: env_logger::Target) {
    let env = env_logger::Env::default().default_filter_or("info");
    let result = env_logger::Builder::from_env(env)
        .target(target)
        .format(|buf, record| {
            let message = record.args().to_string();
            writeln!(buf, "{}", log_entry(severity(record.level()), &message))
        })
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialised: {}", e);
    }
}
