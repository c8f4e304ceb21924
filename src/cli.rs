use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::error::Error;

/// Command line arguments supported by the tikfetch binary.
#[derive(Debug, Parser)]
#[command(
    name = "tikfetch",
    about = "Resolve TikTok videos and download their media.",
    version,
    author,
    arg_required_else_help = true
)]
pub struct Cli {
    /// A single TikTok video URL or numeric video id.
    #[arg(value_name = "VIDEO")]
    pub url: Option<String>,

    /// Path to a file with line-delimited TikTok URLs or ids for batch downloads.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Maximum number of concurrent downloads.
    #[arg(long, value_name = "NUM", value_parser = clap::value_parser!(usize))]
    pub max_concurrent: Option<usize>,

    /// Maximum retry attempts per URL on transient failures.
    #[arg(long, value_name = "NUM", value_parser = clap::value_parser!(usize))]
    pub max_retries: Option<usize>,

    /// Initial backoff delay in milliseconds for retry scheduling.
    #[arg(long, value_name = "MILLISECONDS", value_parser = clap::value_parser!(u64))]
    pub backoff_ms: Option<u64>,

    /// Route every request through this proxy.
    #[arg(long, value_name = "URL")]
    pub proxy: Option<Url>,

    /// Buffer each video fully in memory before writing it.
    #[arg(long)]
    pub buffered: bool,

    /// Directory videos are saved under, one subdirectory per author.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the scraped video metadata as JSON instead of downloading.
    #[arg(long)]
    pub info: bool,
}

impl Cli {
    /// Ensure the caller supplies either a single video or a file path.
    pub fn validate(&self) -> Result<(), Error> {
        match (self.url.as_ref(), self.file.as_ref()) {
            (Some(_), Some(_)) => Err(Error::InputConflict),
            (None, None) => Err(Error::MissingInput),
            _ => Ok(()),
        }
    }
}
