use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Unified error type for tikfetch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provide either a single TikTok video or --file, not both.")]
    InputConflict,
    #[error("Provide a TikTok URL, a video id, or --file with URLs to download.")]
    MissingInput,
    #[error("Invalid TikTok URL: {0}")]
    InvalidUrl(String),
    #[error("No TikTok URLs found in file: {0}")]
    EmptyUrlFile(PathBuf),
    #[error("TikTok returned status {status} for the video page.")]
    Upstream { status: StatusCode },
    #[error("TikTok returned an invalid response: {0}")]
    InvalidResponse(InvalidResponse),
    #[error("No valid media found after trying {attempted} candidate URL(s).")]
    NoValidMedia { attempted: usize },
    #[error("Unable to construct video: {0}")]
    Construction(String),
    #[error("Video id {0:?} has no characters usable in a file name.")]
    UnusableFileName(String),
    #[error("Download summary: {succeeded} succeeded, {failed} failed.")]
    DownloadSummary { succeeded: usize, failed: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Parsing(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Why a fetched page could not be turned into a canonical item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidResponse {
    #[error("no embedded page state found")]
    MarkerNotFound,
    #[error("embedded page state is not terminated")]
    UnterminatedMarker,
    #[error("embedded page state is not valid JSON ({0})")]
    MalformedPayload(String),
    #[error("video item missing from page state")]
    ItemAbsent,
    #[error("page state reports status code {0}")]
    UpstreamStatus(i64),
}

impl From<InvalidResponse> for Error {
    fn from(reason: InvalidResponse) -> Self {
        Error::InvalidResponse(reason)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
