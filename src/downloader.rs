use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH};
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio_util::task::AbortOnDropHandle;

use crate::config::EngineConfig;
use crate::error::{error_chain, DownloadError, DownloadResult};
use crate::fetcher::{fetch_range, RangeFailure, RangeSink};
use crate::ranges::{partition, ByteRange};
use crate::state::{Phase, TransferStatus};

/// One resource being downloaded into one destination.
///
/// Shared between the orchestrator, which drives it with [`FileDownload::start`],
/// and the progress reporter, which only reads its counters and phase.
pub struct FileDownload {
    id: usize,
    url: String,
    file_name: String,
    client: Client,
    config: EngineConfig,
    sink: Arc<dyn RangeSink>,
    total_size: OnceLock<u64>,
    ranges: OnceLock<Vec<ByteRange>>,
    status: TransferStatus,
    phase: watch::Sender<Phase>,
}

impl FileDownload {
    pub fn new(
        id: usize,
        url: impl Into<String>,
        file_name: impl Into<String>,
        sink: Arc<dyn RangeSink>,
        client: Client,
        config: EngineConfig,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Queued);
        Self {
            id,
            url: url.into(),
            file_name: file_name.into(),
            client,
            config,
            sink,
            total_size: OnceLock::new(),
            ranges: OnceLock::new(),
            status: TransferStatus::new(),
            phase,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Known once the capability probe succeeded.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size.get().copied()
    }

    pub fn ranges(&self) -> &[ByteRange] {
        self.ranges.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn status(&self) -> &TransferStatus {
        &self.status
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Resolves with the terminal phase once the download has finished.
    pub async fn completed(&self) -> Phase {
        let mut rx = self.phase.subscribe();
        let terminal = match rx.wait_for(|phase| phase.is_terminal()).await {
            Ok(phase) => *phase,
            Err(_) => self.phase(),
        };
        terminal
    }

    /// Runs the download to the end and fires the completion signal.
    ///
    /// Returns the number of bytes written. Must be called at most once.
    pub async fn start(self: Arc<Self>) -> DownloadResult<u64> {
        let result = self.run().await;
        match &result {
            Ok(bytes) => {
                log::debug!("{}: completed, {} bytes", self.file_name, bytes);
                self.phase.send_replace(Phase::Completed);
            }
            Err(e) => {
                log::debug!("{}: aborted: {}", self.file_name, error_chain(e));
                self.phase.send_replace(Phase::Aborted);
            }
        }
        result
    }

    async fn run(self: &Arc<Self>) -> DownloadResult<u64> {
        self.phase.send_replace(Phase::Probing);
        let total_size = probe(&self.client, &self.url).await?;
        let _ = self.total_size.set(total_size);
        log::debug!("{}: {} bytes, ranges supported", self.file_name, total_size);

        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.allocate(total_size))
            .await?
            .map_err(|source| DownloadError::Write { offset: 0, source })?;
        let ranges = self
            .ranges
            .get_or_init(|| partition(total_size, self.config.chunk_size))
            .clone();
        self.phase.send_replace(Phase::Partitioned);
        log::debug!(
            "{}: split into {} ranges of up to {} bytes",
            self.file_name,
            ranges.len(),
            self.config.chunk_size
        );

        // Range tasks are aborted if this future is dropped mid-fetch.
        self.phase.send_replace(Phase::Fetching);
        let results: Vec<_> = futures::stream::iter(ranges.iter().copied())
            .map(|range| {
                let this = Arc::clone(self);
                let task = tokio::spawn(async move { this.fetch_with_retry(range).await });
                AbortOnDropHandle::new(task)
            })
            .buffer_unordered(self.config.range_concurrency.max(1))
            .collect()
            .await;

        let mut written = 0;
        let mut failed = 0;
        let mut first_error = None;
        for joined in results {
            let error = match joined {
                Ok(Ok(bytes)) => {
                    written += bytes;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => DownloadError::Task(e),
            };
            failed += 1;
            if first_error.is_none() {
                first_error = Some(error);
            }
        }

        match first_error {
            None => Ok(written),
            Some(source) => Err(DownloadError::Incomplete {
                url: self.url.clone(),
                failed,
                total: ranges.len(),
                source: Box::new(source),
            }),
        }
    }

    /// Fetches one range, giving a transfer failure exactly one more attempt.
    ///
    /// The second attempt only asks for the bytes the first one did not write,
    /// so the shared counter never counts a byte twice.
    async fn fetch_with_retry(&self, range: ByteRange) -> DownloadResult<u64> {
        let first = self.fetch(range).await;
        let RangeFailure { written, error } = match first {
            Ok(bytes) => return Ok(bytes),
            Err(failure) if failure.error.is_retryable() => failure,
            Err(failure) => {
                log::error!("{}: range {} failed: {}", self.file_name, range, error_chain(&failure.error));
                return Err(failure.error);
            }
        };

        if written == range.len() {
            return Ok(written);
        }
        log::warn!("{}: range {} failed: {}; retrying", self.file_name, range, error_chain(&error));
        let rest = ByteRange::new(range.begin + written, range.end);
        match self.fetch(rest).await {
            Ok(bytes) => Ok(written + bytes),
            Err(failure) => {
                log::error!(
                    "{}: range {} failed again: {}",
                    self.file_name,
                    range,
                    error_chain(&failure.error)
                );
                Err(failure.error)
            }
        }
    }

    async fn fetch(&self, range: ByteRange) -> Result<u64, RangeFailure> {
        fetch_range(
            &self.client,
            &self.url,
            range,
            &self.sink,
            &self.status,
            self.config.buffer_size,
        )
        .await
    }
}

/// Issues a HEAD request and returns the resource size if the server can
/// serve it in byte ranges.
pub async fn probe(client: &Client, url: &str) -> DownloadResult<u64> {
    let response = client.head(url).send().await?;
    if !response.status().is_success() {
        return Err(DownloadError::Capability {
            url: url.to_string(),
            reason: format!("HEAD returned {}", response.status()),
        });
    }
    check_capability(response.headers()).map_err(|reason| DownloadError::Capability {
        url: url.to_string(),
        reason,
    })
}

/// Reads the total size from probe headers, rejecting servers without byte
/// range support.
pub fn check_capability(headers: &HeaderMap) -> Result<u64, String> {
    let length = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| "missing Content-Length".to_string())?;
    let total_size = length
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| format!("invalid Content-Length {:?}", length))?;

    let accepts_bytes = headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));
    if !accepts_bytes {
        return Err("server does not accept byte ranges".to_string());
    }
    Ok(total_size)
}
