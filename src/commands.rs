use anyhow::{anyhow, bail, Context, Result};
use indicatif::{HumanBytes, HumanDuration, ProgressDrawTarget};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cli::Args;
use crate::config::Settings;
use crate::downloader::FileDownload;
use crate::error::{error_chain, DownloadError, DownloadResult};
use crate::fetcher::RangeSink;
use crate::progress::ProgressReporter;
use crate::utils::{claim_unique_filename, get_filename_from_url, sanitize_filename};

/// How one requested URL ended up.
#[derive(Debug)]
pub struct FileOutcome {
    pub url: String,
    pub path: PathBuf,
    pub result: DownloadResult<u64>,
}

/// Per-file outcomes of a run, in input order.
#[derive(Debug)]
pub struct Report {
    pub outcomes: Vec<FileOutcome>,
}

impl Report {
    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Entry point behind the command line.
pub async fn run(args: Args) -> Result<()> {
    let settings = args.settings();
    let urls = match &args.input_file {
        Some(source) => read_url_list(source, &settings).await?,
        None => args.urls.clone(),
    };
    if urls.is_empty() {
        bail!("Please give at least one URL, or a list with --input-file");
    }
    log::debug!("urls: {:?}", urls);

    let dir = match args.save {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve the current directory")?,
    };

    let started = Instant::now();
    let report = run_downloads(urls, &dir, &settings).await?;

    for failure in report.failures() {
        if let Err(e) = &failure.result {
            log::error!("Failed to download {}: {}", failure.url, error_chain(e));
        }
    }
    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} downloads failed", failed, report.outcomes.len());
    }

    log::info!(
        "Downloaded {} file(s), {} in {}",
        report.outcomes.len(),
        HumanBytes(report.bytes_written()),
        HumanDuration(started.elapsed())
    );
    Ok(())
}

/// Downloads every URL into `dir`, at most `settings.file_concurrency` files
/// at a time.
///
/// All destination files are opened before any request goes out; failing to
/// open one aborts the run. URLs that map to the same file name get `_1`,
/// `_2`, ... suffixes so no two downloads share a destination.
pub async fn run_downloads(urls: Vec<String>, dir: &Path, settings: &Settings) -> Result<Report> {
    if !dir.exists() {
        fs::create_dir_all(dir).await.context("Failed to create output directory")?;
    }

    let client = settings.http_client().context("Failed to build HTTP client")?;
    let mut downloads = Vec::with_capacity(urls.len());
    let mut paths = Vec::with_capacity(urls.len());
    let mut taken = HashSet::new();

    for (id, url) in urls.iter().enumerate() {
        let wanted = sanitize_filename(&get_filename_from_url(url).with_context(|| format!("Invalid URL: {}", url))?);
        let filename = claim_unique_filename(&mut taken, &wanted);
        if filename != wanted {
            log::warn!("{} already used by another URL, saving {} as {}", wanted, url, filename);
        }
        let path = dir.join(&filename);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| DownloadError::FileSystem { path: path.clone(), source })?;
        let sink: Arc<dyn RangeSink> = Arc::new(file);

        downloads.push(Arc::new(FileDownload::new(
            id,
            url.clone(),
            filename,
            sink,
            client.clone(),
            settings.engine(),
        )));
        paths.push(path);
    }

    let reporter = settings.show_progress.then(|| {
        let reporter = ProgressReporter::new(downloads.clone(), settings.progress_interval);
        tokio::spawn(reporter.run(ProgressDrawTarget::stdout()))
    });

    let semaphore = Arc::new(Semaphore::new(settings.file_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for download in &downloads {
        let download = download.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire().await;
            let id = download.id();
            (id, download.start().await)
        });
    }

    let mut results: Vec<Option<DownloadResult<u64>>> = urls.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (id, result) = joined.context("Download task panicked")?;
        if settings.fail_fast {
            if let Err(e) = result {
                tasks.abort_all();
                if let Some(reporter) = &reporter {
                    reporter.abort();
                }
                return Err(anyhow::Error::new(e).context(format!("Failed to download {}", urls[id])));
            }
        }
        results[id] = Some(result);
    }

    if let Some(reporter) = reporter {
        reporter.await.context("Progress reporter panicked")?;
    }

    let outcomes = urls
        .into_iter()
        .zip(paths)
        .zip(results)
        .map(|((url, path), result)| {
            let result = result.ok_or_else(|| anyhow!("No result for {}", url))?;
            Ok(FileOutcome { url, path, result })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Report { outcomes })
}

/// Reads a newline-delimited URL list from a local file or an http(s) URL.
/// Blank lines and lines starting with `#` are skipped.
pub async fn read_url_list(source: &str, settings: &Settings) -> Result<Vec<String>> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        let client = settings.http_client().context("Failed to build HTTP client")?;
        client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch URL list: {}", source))?
            .text()
            .await
            .with_context(|| format!("Failed to read URL list: {}", source))?
    } else {
        fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to open input file: {:?}", source))?
    };
    Ok(parse_url_list(&content))
}

pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
