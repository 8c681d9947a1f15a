use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::ranges::ByteRange;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{url} cannot be fetched in ranges: {reason}")]
    Capability { url: String, reason: String },

    #[error("request failed")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} for range {range}")]
    Status { status: StatusCode, range: ByteRange },

    #[error("error while reading response body")]
    Body(#[source] io::Error),

    #[error("server sent more than the {} bytes of range {range}", .range.len())]
    Overrun { range: ByteRange },

    #[error("range {range} ended after {received} of {} bytes", .range.len())]
    ShortBody { range: ByteRange, received: u64 },

    #[error("write at offset {offset} failed")]
    Write {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("range task failed")]
    Task(#[from] tokio::task::JoinError),

    #[error("cannot open {}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{failed} of {total} ranges of {url} failed")]
    Incomplete {
        url: String,
        failed: usize,
        total: usize,
        #[source]
        source: Box<DownloadError>,
    },
}

impl DownloadError {
    /// Transfer failures worth one more attempt. Write and capability
    /// failures will not go away by asking the server again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Request(_)
                | DownloadError::Status { .. }
                | DownloadError::Body(_)
                | DownloadError::Overrun { .. }
                | DownloadError::ShortBody { .. }
        )
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

/// Renders an error followed by each of its causes, `: `-separated.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let range = ByteRange::new(0, 9);
        assert!(DownloadError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            range
        }
        .is_retryable());
        assert!(DownloadError::ShortBody { range, received: 3 }.is_retryable());
        assert!(DownloadError::Body(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).is_retryable());

        let write = DownloadError::Write {
            offset: 0,
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert!(!write.is_retryable());
        assert!(!DownloadError::Capability {
            url: "http://example.com/a".into(),
            reason: "no ranges".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = DownloadError::Incomplete {
            url: "http://example.com/a.bin".into(),
            failed: 1,
            total: 3,
            source: Box::new(DownloadError::Write {
                offset: 20,
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            }),
        };
        assert_eq!(
            error_chain(&err),
            "1 of 3 ranges of http://example.com/a.bin failed: write at offset 20 failed: disk full"
        );
    }

    #[test]
    fn test_messages() {
        let err = DownloadError::ShortBody {
            range: ByteRange::new(10, 19),
            received: 4,
        };
        assert_eq!(err.to_string(), "range 10-19 ended after 4 of 10 bytes");
    }
}
