use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    Settings, DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_FILE_CONCURRENCY, DEFAULT_RANGE_CONCURRENCY, PROGRESS_INTERVAL,
};

/// Downloads files over HTTP, fetching byte ranges of each file in parallel.
#[derive(Parser, Debug)]
#[command(name = "mget", author, version, about, long_about = None)]
pub struct Args {
    /// URLs to download
    pub urls: Vec<String>,

    /// Read URLs from a local or external (http/https) file, one per line
    #[arg(short = 'i', long = "input-file")]
    pub input_file: Option<String>,

    /// Directory to save downloaded files (defaults to the current directory)
    #[arg(short = 's', long = "save")]
    pub save: Option<PathBuf>,

    /// Disable the live progress display
    #[arg(long = "disable-progress")]
    pub disable_progress: bool,

    /// Print debugging messages
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Maximum number of files downloaded at the same time
    #[arg(short = 'w', long, default_value_t = DEFAULT_FILE_CONCURRENCY, value_parser = positive)]
    pub workers: usize,

    /// Maximum number of ranges fetched at the same time for one file
    #[arg(short = 'r', long, default_value_t = DEFAULT_RANGE_CONCURRENCY, value_parser = positive)]
    pub ranges: usize,

    /// Size in bytes of each requested range
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Size in bytes of each read from a response body
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE, value_parser = positive)]
    pub buffer_size: usize,

    /// Seconds to wait for a connection to be established
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Stop everything as soon as one download fails
    #[arg(long)]
    pub fail_fast: bool,
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            chunk_size: self.chunk_size,
            buffer_size: self.buffer_size,
            range_concurrency: self.ranges,
            file_concurrency: self.workers,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            show_progress: !self.disable_progress,
            progress_interval: PROGRESS_INTERVAL,
            fail_fast: self.fail_fast,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
