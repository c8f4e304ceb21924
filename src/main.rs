use std::fs;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tikfetch::cli::Cli;
use tikfetch::downloader::{DownloadConfig, Downloader};
use tikfetch::error::{Error, Result};
use tikfetch::session::Session;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    cli.validate()?;

    let urls = gather_urls(&cli)?;
    let config = build_config(&cli);
    let session = Session::new(cli.proxy.clone());
    let downloader = Downloader::with_config(session, config)?;

    if cli.info {
        return print_info(&downloader, &urls).await;
    }

    let reports = downloader.download_all(&urls).await;

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for report in &reports {
        match &report.result {
            Ok(path) => {
                succeeded += 1;
                println!("Downloaded {} -> {}", report.url, path.display());
            }
            Err(err) => {
                failed += 1;
                eprintln!("Failed {}: {err}", report.url);
            }
        }
    }

    println!("Summary: {succeeded} succeeded, {failed} failed.");

    if failed > 0 {
        return Err(Error::DownloadSummary { succeeded, failed });
    }

    Ok(())
}

async fn print_info(downloader: &Downloader, urls: &[String]) -> Result<()> {
    for url in urls {
        let video = downloader.api().resolve(url).await?;
        println!("{}", serde_json::to_string_pretty(video.as_value())?);
    }
    Ok(())
}

fn build_config(cli: &Cli) -> DownloadConfig {
    let mut config = DownloadConfig::default();
    if let Some(max) = cli.max_concurrent {
        config.max_concurrent_downloads = max.max(1);
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries;
    }
    if let Some(backoff) = cli.backoff_ms {
        config.initial_backoff_ms = backoff.max(1);
    }
    if let Some(dir) = cli.output_dir.as_ref() {
        config.output_dir = dir.clone();
    }
    config.streaming = !cli.buffered;
    config
}

fn gather_urls(cli: &Cli) -> Result<Vec<String>> {
    if let Some(url) = cli.url.as_ref() {
        return Ok(vec![url.trim().to_string()]);
    }

    if let Some(path) = cli.file.as_ref() {
        let contents = fs::read_to_string(path)?;
        let mut urls: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ToOwned::to_owned)
            .collect();

        if urls.is_empty() {
            return Err(Error::EmptyUrlFile(path.clone()));
        }

        urls.dedup();
        return Ok(urls);
    }

    Err(Error::MissingInput)
}
