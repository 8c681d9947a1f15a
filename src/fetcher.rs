use std::fs::File;
use std::io;
use std::sync::Arc;

use futures::TryStreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

use crate::error::{DownloadError, DownloadResult};
use crate::ranges::ByteRange;
use crate::state::TransferStatus;

/// Destination that accepts writes at absolute offsets.
///
/// Range tasks of one file write to disjoint offsets, so implementations need
/// no locking between them.
pub trait RangeSink: Send + Sync {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;

    /// Sizes the destination once the total length is known.
    fn allocate(&self, _len: u64) -> io::Result<()> {
        Ok(())
    }
}

impl RangeSink for File {
    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            let n = self.seek_write(buf, offset)?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            buf = &buf[n..];
            offset += n as u64;
        }
        Ok(())
    }

    fn allocate(&self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// A range fetch that stopped early.
#[derive(Debug)]
pub struct RangeFailure {
    /// Bytes at the start of the range that were written before the error.
    pub written: u64,
    pub error: DownloadError,
}

impl RangeFailure {
    fn new(written: u64, error: impl Into<DownloadError>) -> Self {
        Self {
            written,
            error: error.into(),
        }
    }
}

/// Writes `buffer[..len]` at `offset` on the blocking pool, handing the buffer
/// back for the next read.
pub async fn write_blocking(
    sink: &Arc<dyn RangeSink>,
    buffer: Vec<u8>,
    len: usize,
    offset: u64,
) -> (DownloadResult<()>, Vec<u8>) {
    let sink = Arc::clone(sink);
    let joined = tokio::task::spawn_blocking(move || {
        let result = sink.write_at(&buffer[..len], offset);
        (result, buffer)
    })
    .await;
    match joined {
        Ok((result, buffer)) => (
            result.map_err(|source| DownloadError::Write { offset, source }),
            buffer,
        ),
        Err(e) => (Err(DownloadError::Task(e)), Vec::new()),
    }
}

/// Downloads `range` of `url` into `sink` at the range's own offsets.
///
/// Every chunk read from the body is written before the next read, and the
/// written byte count is added to `status` right after each write. Returns the
/// number of bytes written, which equals `range.len()` on success.
pub async fn fetch_range(
    client: &Client,
    url: &str,
    range: ByteRange,
    sink: &Arc<dyn RangeSink>,
    status: &TransferStatus,
    buffer_size: usize,
) -> Result<u64, RangeFailure> {
    let response = client
        .get(url)
        .header(header::RANGE, range.header_value())
        .send()
        .await
        .map_err(|e| RangeFailure::new(0, e))?;

    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(RangeFailure::new(
            0,
            DownloadError::Status {
                status: response.status(),
                range,
            },
        ));
    }

    let body = response
        .bytes_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    let reader = StreamReader::new(body);
    tokio::pin!(reader);

    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut offset = range.begin;
    loop {
        let written = offset - range.begin;
        let n = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(RangeFailure::new(written, DownloadError::Body(e))),
        };
        if n as u64 > range.end + 1 - offset {
            return Err(RangeFailure::new(written, DownloadError::Overrun { range }));
        }

        let (result, returned) = write_blocking(sink, buffer, n, offset).await;
        result.map_err(|e| RangeFailure::new(written, e))?;
        buffer = returned;
        offset += n as u64;
        status.add(n as u64);
    }

    let received = offset - range.begin;
    if received != range.len() {
        return Err(RangeFailure::new(
            received,
            DownloadError::ShortBody { range, received },
        ));
    }
    Ok(received)
}
