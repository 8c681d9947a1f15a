//! # mget
//!
//! Concurrent HTTP downloader. Each file is probed with a HEAD request, split
//! into byte ranges, and the ranges are fetched in parallel and written
//! straight to their offsets in the destination file. Several files are
//! downloaded at once, with a live progress block redrawn on the terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod progress;
pub mod ranges;
pub mod state;
pub mod utils;

pub use cli::Args;
pub use config::{EngineConfig, Settings};
pub use downloader::FileDownload;
pub use error::{DownloadError, DownloadResult};
pub use fetcher::{fetch_range, RangeSink};
pub use ranges::{partition, ByteRange};
pub use state::{Phase, TransferStatus};
