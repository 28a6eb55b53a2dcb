//! Resumable HTTPS downloads with retry.
//!
//! - HTTP Range requests resume a `.partial` file left by a failed attempt
//! - Exponential backoff, retrying only `PipelineError::TransientIo`
//! - Size check against Content-Length before the file is moved into place

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ocean_common::{PipelineError, PipelineResult};
use reqwest::{header, Client, Response, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::Downloader;
use crate::credentials::Login;

/// Backoff schedule shared by the downloader and the disseminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..retry {
            delay = std::cmp::min(delay * 2, self.max_delay);
        }
        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, exhausts
/// the policy or the token is cancelled. `op` receives the attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> PipelineResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut retry_count = 0;
    loop {
        let result = tokio::select! {
            result = op(retry_count) => result,
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry_count < policy.max_retries => {
                retry_count += 1;
                let delay = policy.delay(retry_count);
                warn!(
                    what = %what,
                    error = %e,
                    retry = retry_count,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                }
            }
            Err(PipelineError::TransientIo(message)) => {
                return Err(PipelineError::TransientIo(format!(
                    "{} failed after {} retries: {}",
                    what, retry_count, message
                )))
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map an HTTP status to the error taxonomy; `None` for success codes.
/// `name` labels the collaborator in non-retryable errors.
pub fn status_error(name: &str, status: StatusCode, url: &str) -> Option<PipelineError> {
    if status.is_success() {
        return None;
    }
    let error = match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            PipelineError::missing_input(PathBuf::from(url), format!("remote returned {}", status))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PipelineError::collaborator(name, format!("{} rejected credentials ({})", url, status))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            PipelineError::TransientIo(format!("{}: HTTP {}", url, status))
        }
        s if s.is_server_error() => PipelineError::TransientIo(format!("{}: HTTP {}", url, s)),
        s => PipelineError::collaborator(name, format!("{}: HTTP {}", url, s)),
    };
    Some(error)
}

pub(crate) fn transient(context: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::TransientIo(format!("{}: {}", context, e))
}

/// reqwest-backed downloader with resumption.
pub struct HttpDownloader {
    client: Client,
    policy: RetryPolicy,
}

impl HttpDownloader {
    pub fn new(policy: RetryPolicy, request_timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, policy })
    }

    /// One attempt: resume `temp_path` where it stopped.
    async fn download_with_resume(&self, url: &str, login: Option<&Login>, temp_path: &Path) -> PipelineResult<u64> {
        let resume_from = match fs::metadata(temp_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };

        let mut request = self.client.get(url);
        if let Some(login) = login {
            request = request.basic_auth(&login.username, Some(&login.password));
        }
        if resume_from > 0 {
            info!(resume_from = resume_from, "Resuming download");
            request = request.header(header::RANGE, format!("bytes={}-", resume_from));
        }

        let response = request.send().await.map_err(|e| transient("HTTP request failed", e))?;

        let mut offset = resume_from;
        match response.status() {
            StatusCode::OK => {
                // Full content, start from scratch
                if resume_from > 0 {
                    fs::remove_file(temp_path).await.ok();
                    offset = 0;
                }
            }
            StatusCode::PARTIAL_CONTENT => {
                debug!("Received partial content, resuming download");
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                // The partial file is longer than the remote; start over.
                fs::remove_file(temp_path).await.ok();
                return Err(PipelineError::TransientIo(format!(
                    "{}: range {}- not satisfiable, restarting",
                    url, resume_from
                )));
            }
            status => {
                if let Some(e) = status_error("download", status, url) {
                    return Err(e);
                }
            }
        }

        let expected = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|len| len + offset);

        let written = self.stream_to_file(response, temp_path).await? + offset;
        if let Some(expected) = expected {
            if written != expected {
                return Err(PipelineError::TransientIo(format!(
                    "Download size mismatch: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }
        Ok(written)
    }

    /// Append the response body to `path`; returns bytes written.
    async fn stream_to_file(&self, response: Response, path: &Path) -> PipelineResult<u64> {
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transient("Error reading response chunk", e))?;
            file.write_all(&chunk).await.map_err(|e| transient("Error writing to file", e))?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

#[async_trait]
impl Downloader for HttpDownloader {
    #[instrument(skip(self, login, cancel), fields(url = %url))]
    async fn fetch(
        &self,
        url: &str,
        login: Option<&Login>,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = partial_path(dest);

        let bytes = with_retry(&self.policy, url, cancel, |_| {
            self.download_with_resume(url, login, &temp_path)
        })
        .await?;

        // Move to final location (copy+delete across filesystems)
        if fs::rename(&temp_path, dest).await.is_err() {
            fs::copy(&temp_path, dest).await?;
            fs::remove_file(&temp_path).await?;
        }
        info!(path = %dest.display(), bytes = bytes, "Download completed");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(6), Duration::from_secs(64));
        assert_eq!(policy.delay(7), Duration::from_secs(120));
        assert_eq!(policy.delay(30), Duration::from_secs(120));
    }

    #[test]
    fn test_status_mapping() {
        let url = "https://example.org/a.nc";
        assert!(status_error("download", StatusCode::OK, url).is_none());
        assert!(matches!(
            status_error("download", StatusCode::NOT_FOUND, url),
            Some(PipelineError::MissingInput { .. })
        ));
        assert!(matches!(
            status_error("download", StatusCode::FORBIDDEN, url),
            Some(PipelineError::Collaborator { .. })
        ));
        assert!(status_error("download", StatusCode::SERVICE_UNAVAILABLE, url).is_some_and(|e| e.is_retryable()));
        assert!(status_error("download", StatusCode::TOO_MANY_REQUESTS, url).is_some_and(|e| e.is_retryable()));
        assert!(!status_error("download", StatusCode::BAD_REQUEST, url).is_some_and(|e| e.is_retryable()));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/in/file_20240101.nc")),
            PathBuf::from("/data/in/file_20240101.nc.partial")
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), "op", &CancellationToken::new(), move |_| async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(PipelineError::TransientIo("flaky".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: PipelineResult<()> = with_retry(&fast_policy(2), "op", &CancellationToken::new(), move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::TransientIo("down".into()))
        })
        .await;
        assert!(matches!(result, Err(PipelineError::TransientIo(m)) if m.contains("after 2 retries")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_input_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: PipelineResult<()> = with_retry(&fast_policy(5), "op", &CancellationToken::new(), move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::missing_input("remote.nc", "404"))
        })
        .await;
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: PipelineResult<()> = with_retry(&fast_policy(5), "op", &cancel, |_| {
            futures::future::pending::<PipelineResult<()>>()
        })
        .await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
