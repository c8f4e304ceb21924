use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::api::Api;
use crate::error::{Error, Result};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::media::FetchOptions;
use crate::session::Session;
use crate::video::Video;

#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_concurrent_downloads: usize,
    /// Stream media to disk instead of buffering each video in memory.
    pub streaming: bool,
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_concurrent_downloads: 4,
            streaming: true,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Detailed download outcome for reporting and summaries.
#[derive(Debug)]
pub struct DownloadReport {
    pub url: String,
    pub result: Result<PathBuf>,
}

impl DownloadReport {
    fn success(url: String, path: PathBuf) -> Self {
        Self {
            url,
            result: Ok(path),
        }
    }

    fn failure(url: String, err: Error) -> Self {
        Self {
            url,
            result: Err(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// High-level orchestrator for downloading one or many TikTok videos.
pub struct Downloader<T: ?Sized = ReqwestTransport> {
    api: Api<T>,
    config: DownloadConfig,
}

impl<T: ?Sized> Clone for Downloader<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            config: self.config.clone(),
        }
    }
}

impl Downloader<ReqwestTransport> {
    /// Build a downloader with a fresh session and default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(Session::default(), DownloadConfig::default())
    }

    pub fn with_config(session: Session, config: DownloadConfig) -> Result<Self> {
        Ok(Self::with_api(Api::new(session)?, config))
    }
}

impl<T> Downloader<T>
where
    T: HttpTransport + ?Sized,
{
    pub fn with_api(api: Api<T>, config: DownloadConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &Api<T> {
        &self.api
    }

    /// Download all share URLs, returning per-URL outcomes in input order.
    pub async fn download_all(&self, urls: &[String]) -> Vec<DownloadReport> {
        if urls.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<(usize, DownloadReport)> = Vec::with_capacity(urls.len());

        let tasks = stream::iter(urls.iter().cloned().enumerate().map(|(idx, url)| {
            let downloader = self.clone();
            async move {
                let outcome = downloader.download_one(&url).await;
                let report = match outcome {
                    Ok(path) => DownloadReport::success(url, path),
                    Err(err) => DownloadReport::failure(url, err),
                };
                (idx, report)
            }
        }))
        .buffer_unordered(self.config.max_concurrent_downloads.max(1));

        futures::pin_mut!(tasks);
        while let Some((idx, report)) = tasks.next().await {
            results.push((idx, report));
        }

        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, report)| report).collect()
    }

    /// Download a single video (URL or id) to disk and return the output path.
    pub async fn download_one(&self, video: &str) -> Result<PathBuf> {
        let mut attempt = 0;

        loop {
            match self.download_once(video).await {
                Ok(path) => return Ok(path),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries || !should_retry(&err) {
                        return Err(err);
                    }

                    let backoff_ms = self
                        .config
                        .initial_backoff_ms
                        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
                    warn!(video, attempt, backoff_ms, error = %err, "retrying download");
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn download_once(&self, reference: &str) -> Result<PathBuf> {
        let video = self.api.resolve(reference).await?;
        let options = FetchOptions {
            streaming: self.config.streaming,
        };
        let media = self.api.fetch_media(&video, options).await?;

        let output_path = build_output_path(&self.config.output_dir, &video)?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(&output_path);
        let mut file = tokio::fs::File::create(&partial).await?;
        let written = match media.write_to(&mut file).await {
            Ok(written) => written,
            Err(err) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(err);
            }
        };
        drop(file);
        tokio::fs::rename(&partial, &output_path).await?;

        info!(id = %video.id, path = %output_path.display(), bytes = written, "saved video");
        Ok(output_path)
    }
}

fn build_output_path(output_dir: &Path, video: &Video) -> Result<PathBuf> {
    let id = sanitize_component(&video.id);
    if id.is_empty() {
        return Err(Error::UnusableFileName(video.id.clone()));
    }

    let author = video
        .author
        .as_ref()
        .and_then(|author| author.username())
        .map(sanitize_component)
        .filter(|author| !author.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(output_dir.join(author).join(format!("{id}.mp4")))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// Whether a whole resolve-and-download attempt is worth repeating.
pub fn should_retry(err: &Error) -> bool {
    match err {
        Error::Network(inner) => {
            if inner.is_timeout() || inner.is_connect() || inner.is_body() {
                return true;
            }

            if let Some(status) = inner.status() {
                return status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::FORBIDDEN
                    || status.is_server_error();
            }

            true
        }
        Error::Upstream { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS
                || *status == StatusCode::FORBIDDEN
                || status.is_server_error()
        }
        Error::Io(_) => true,
        Error::NoValidMedia { attempted } => *attempted > 0,
        Error::InvalidResponse(_) => false,
        Error::Parsing(_) => false,
        Error::Url(_) => false,
        Error::Construction(_) => false,
        Error::UnusableFileName(_) => false,
        Error::InvalidUrl(_) => false,
        Error::InputConflict => false,
        Error::MissingInput => false,
        Error::EmptyUrlFile(_) => false,
        Error::DownloadSummary { .. } => false,
    }
}
