use std::time::Duration;

use reqwest::Client;

/// Size of each byte range requested from the server (10 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
/// Size of each read from a response body before it is written out.
pub const DEFAULT_BUFFER_SIZE: usize = 10 * 1024;
/// Range requests in flight for a single file.
pub const DEFAULT_RANGE_CONCURRENCY: usize = 40;
/// Whole-file downloads in flight.
pub const DEFAULT_FILE_CONCURRENCY: usize = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Knobs for a single file download engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub chunk_size: u64,
    pub buffer_size: usize,
    pub range_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            range_concurrency: DEFAULT_RANGE_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub chunk_size: u64,
    pub buffer_size: usize,
    pub range_concurrency: usize,
    pub file_concurrency: usize,
    pub connect_timeout: Duration,
    pub show_progress: bool,
    pub progress_interval: Duration,
    /// Abort the whole run on the first failed download.
    pub fail_fast: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            range_concurrency: DEFAULT_RANGE_CONCURRENCY,
            file_concurrency: DEFAULT_FILE_CONCURRENCY,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            show_progress: true,
            progress_interval: PROGRESS_INTERVAL,
            fail_fast: false,
        }
    }
}

impl Settings {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            chunk_size: self.chunk_size,
            buffer_size: self.buffer_size,
            range_concurrency: self.range_concurrency,
        }
    }

    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(concat!("mget/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout)
            .build()
    }
}
