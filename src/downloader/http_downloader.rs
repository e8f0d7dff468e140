use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration, Instant};

use crate::errors::{AppError, AppResult};
use crate::security::file_name_from_url;

use super::progress::{
    new_progress_state, progress_snapshot, update_progress_failure, update_progress_skipped,
    update_progress_success, ProgressState,
};
use super::retry::RetryPolicy;
use super::{BulkDownloader, DownloadOptions, PARTIAL_FILE_PREFIX};

/// Concurrent HTTP downloader writing each URL to `<output>/<last path segment>`.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    retry_policy: RetryPolicy,
}

/// State shared by every download task of one call.
struct DownloadContext {
    client: Client,
    retry_policy: RetryPolicy,
    options: DownloadOptions,
    semaphore: Semaphore,
    errors: AtomicU64,
    progress: ProgressState,
}

impl HttpDownloader {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("twitter-imager/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

#[async_trait]
impl BulkDownloader for HttpDownloader {
    async fn download(&self, urls: &[String], options: &DownloadOptions) -> AppResult<u64> {
        options.validate()?;
        tokio::fs::create_dir_all(&options.output).await?;

        let context = Arc::new(DownloadContext {
            client: self.client.clone(),
            retry_policy: self.retry_policy.clone(),
            options: options.clone(),
            semaphore: Semaphore::new(options.max_concurrents),
            errors: AtomicU64::new(0),
            progress: new_progress_state(urls.len()),
        });

        log::info!(
            "Downloading {} URLs into {} ({} concurrent, {} attempts each)",
            urls.len(),
            options.output.display(),
            options.max_concurrents,
            options.max_attempts
        );

        let start_time = Instant::now();
        let mut tasks = FuturesUnordered::new();
        for url in urls.iter().cloned() {
            let context = Arc::clone(&context);
            tasks.push(tokio::spawn(async move { download_one(&context, url).await }));
        }

        while let Some(joined) = tasks.next().await {
            if let Err(e) = joined {
                // A panicked task never recorded its outcome.
                log::error!("Download task aborted: {}", e);
                context.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        let progress = progress_snapshot(&context.progress);
        let errors = context.errors.load(Ordering::SeqCst);

        if progress.skipped > 0 {
            log::warn!(
                "Error limit of {} reached, {} URLs were not attempted",
                options.max_error_requests,
                progress.skipped
            );
        }

        log::info!(
            "Downloaded {} of {} URLs in {:.1}s ({} failed, {} skipped, {} bytes)",
            progress.succeeded,
            progress.total,
            start_time.elapsed().as_secs_f64(),
            progress.failed(),
            progress.skipped,
            progress.bytes_written
        );

        Ok(errors)
    }
}

async fn download_one(context: &DownloadContext, url: String) {
    let _permit = match context.semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            update_progress_skipped(&context.progress, &url);
            return;
        }
    };

    if context
        .options
        .error_limit_reached(context.errors.load(Ordering::SeqCst))
    {
        update_progress_skipped(&context.progress, &url);
        return;
    }

    match fetch_with_retry(context, &url).await {
        Ok(bytes) => update_progress_success(&context.progress, &url, bytes),
        Err((e, attempts)) => {
            context.errors.fetch_add(1, Ordering::SeqCst);
            update_progress_failure(&context.progress, &url, e.to_string(), attempts);
        }
    }
}

/// Fetch `url` until it succeeds, fails permanently, or runs out of attempts.
async fn fetch_with_retry(context: &DownloadContext, url: &str) -> Result<u64, (AppError, u32)> {
    let destination = destination_for(&context.options.output, url).map_err(|e| (e, 0))?;
    let max_attempts = context.options.max_attempts;

    let mut attempt = 0;
    loop {
        attempt += 1;

        match fetch_once(&context.client, url, &destination, context.options.timeout).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                if attempt >= max_attempts || !e.is_retryable() {
                    return Err((e, attempt));
                }

                let delay = context.retry_policy.backoff_delay(attempt);
                log::debug!(
                    "Download attempt {} of {} failed for {}, retrying in {:?}: {}",
                    attempt,
                    max_attempts,
                    url,
                    delay,
                    e
                );
                sleep(delay).await;
            }
        }
    }
}

async fn fetch_once(client: &Client, url: &str, destination: &Path, timeout: Duration) -> AppResult<u64> {
    let response = client.get(url).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    // Each attempt writes its own partial file; the rename makes the last
    // finished download win when several URLs share a file name.
    let directory = destination.parent().unwrap_or_else(|| Path::new("."));
    let (file, partial_path) = tempfile::Builder::new()
        .prefix(PARTIAL_FILE_PREFIX)
        .tempfile_in(directory)?
        .into_parts();

    let written = write_body(response, tokio::fs::File::from_std(file)).await?;
    partial_path.persist(destination).map_err(|e| e.error)?;
    Ok(written)
}

async fn write_body(response: reqwest::Response, mut file: tokio::fs::File) -> AppResult<u64> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// Where `url` would be written under `output`, if it has a usable file name.
pub fn destination_for(output: &Path, url: &str) -> AppResult<PathBuf> {
    Ok(output.join(file_name_from_url(url)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(output: PathBuf) -> DownloadOptions {
        DownloadOptions {
            output,
            max_concurrents: 2,
            max_error_requests: 1000,
            max_attempts: 3,
            timeout: Duration::from_secs(5),
        }
    }

    fn downloader() -> HttpDownloader {
        HttpDownloader::new()
            .unwrap()
            .with_retry_policy(RetryPolicy::immediate())
    }

    #[tokio::test]
    async fn test_downloads_into_output_directory() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/media/a.jpg")
            .with_body("jpeg-bytes")
            .create_async()
            .await;
        server
            .mock("GET", "/profile/b.png")
            .match_query(mockito::Matcher::Any)
            .with_body("png-bytes")
            .create_async()
            .await;

        let staging = tempfile::tempdir().unwrap();
        let urls = vec![
            format!("{}/media/a.jpg", server.url()),
            format!("{}/profile/b.png?size=large", server.url()),
        ];

        let errors = downloader()
            .download(&urls, &options(staging.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(errors, 0);
        assert_eq!(std::fs::read(staging.path().join("a.jpg")).unwrap(), b"jpeg-bytes");
        assert_eq!(std::fs::read(staging.path().join("b.png")).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_raised() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ok.jpg")
            .with_body("ok")
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/gone.jpg")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let staging = tempfile::tempdir().unwrap();
        let urls = vec![
            format!("{}/ok.jpg", server.url()),
            format!("{}/gone.jpg", server.url()),
            String::new(),
        ];

        let errors = downloader()
            .download(&urls, &options(staging.path().to_path_buf()))
            .await
            .unwrap();

        // 404 is permanent and the empty URL has no file name.
        assert_eq!(errors, 2);
        assert!(staging.path().join("ok.jpg").exists());
        assert!(!staging.path().join("gone.jpg").exists());
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_retried_up_to_max_attempts() {
        let mut server = mockito::Server::new_async().await;
        let flaky = server
            .mock("GET", "/flaky.jpg")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let staging = tempfile::tempdir().unwrap();
        let urls = vec![format!("{}/flaky.jpg", server.url())];

        let errors = downloader()
            .download(&urls, &options(staging.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(errors, 1);
        flaky.assert_async().await;
    }

    #[tokio::test]
    async fn test_stops_starting_downloads_at_error_limit() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let staging = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..6)
            .map(|i| format!("{}/img{}.jpg", server.url(), i))
            .collect();

        let mut options = options(staging.path().to_path_buf());
        options.max_concurrents = 1;
        options.max_error_requests = 2;

        let errors = downloader().download(&urls, &options).await.unwrap();

        assert_eq!(errors, 2);
        failing.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shared_file_name_keeps_one_intact_body() {
        let first = vec![b'A'; 2 * 1024 * 1024];
        let second = vec![b'B'; 3 * 1024 * 1024 / 2];

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/u1/normal.jpg")
            .with_body(first.clone())
            .create_async()
            .await;
        server
            .mock("GET", "/u2/normal.jpg")
            .with_body(second.clone())
            .create_async()
            .await;

        let staging = tempfile::tempdir().unwrap();
        let urls = vec![
            format!("{}/u1/normal.jpg", server.url()),
            format!("{}/u2/normal.jpg", server.url()),
        ];

        let errors = downloader()
            .download(&urls, &options(staging.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(errors, 0);
        let staged = std::fs::read(staging.path().join("normal.jpg")).unwrap();
        assert!(staged == first || staged == second, "staged file mixes both bodies");

        let entries: Vec<_> = std::fs::read_dir(staging.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "partial files left behind");
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_downloading() {
        let staging = tempfile::tempdir().unwrap();
        let mut options = options(staging.path().to_path_buf());
        options.max_attempts = 0;

        let result = downloader().download(&["https://a/b.jpg".to_string()], &options).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_creates_missing_output_directory() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("nested").join("images");

        let errors = downloader().download(&[], &options(output.clone())).await.unwrap();

        assert_eq!(errors, 0);
        assert!(output.is_dir());
    }

    #[test]
    fn test_destination_for() {
        let output = PathBuf::from("/tmp/images");
        assert_eq!(
            destination_for(&output, "https://pbs.twimg.com/media/x.jpg").unwrap(),
            output.join("x.jpg")
        );
        assert!(destination_for(&output, "").is_err());
    }
}
