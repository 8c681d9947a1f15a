use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::time::{self, MissedTickBehavior};

use crate::downloader::FileDownload;
use crate::state::Phase;
use crate::utils::{format_bytes, format_rate};

/// One text line per download, kept in id order and redrawn in place.
pub struct ProgressBoard {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: BTreeMap<usize, ProgressBar>,
}

impl ProgressBoard {
    pub fn new(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        Self {
            multi: MultiProgress::with_draw_target(target),
            style,
            bars: BTreeMap::new(),
        }
    }

    pub fn set_line(&mut self, id: usize, line: String) {
        self.bar(id).set_message(line);
    }

    /// Sets the last text of a line. It is not redrawn after this.
    pub fn finish_line(&mut self, id: usize, line: String) {
        self.bar(id).finish_with_message(line);
    }

    pub fn line(&self, id: usize) -> Option<String> {
        self.bars.get(&id).map(ProgressBar::message)
    }

    pub fn is_finished(&self, id: usize) -> bool {
        self.bars.get(&id).map_or(false, ProgressBar::is_finished)
    }

    fn bar(&mut self, id: usize) -> &ProgressBar {
        if !self.bars.contains_key(&id) {
            let position = self.bars.range(..id).count();
            let bar = self.multi.insert(position, ProgressBar::new(0));
            bar.set_style(self.style.clone());
            self.bars.insert(id, bar);
        }
        &self.bars[&id]
    }
}

/// Builds the status line shown for one download.
pub fn status_line(
    file_name: &str,
    phase: Phase,
    transferred: u64,
    total: Option<u64>,
    bytes_per_sec: f64,
) -> String {
    let (done, percent) = match (phase, total) {
        (Phase::Completed, Some(total)) => (total, 100.0),
        (Phase::Completed, None) => (transferred, 100.0),
        (_, Some(total)) if total > 0 => (transferred, transferred as f64 / total as f64 * 100.0),
        _ => (transferred, 0.0),
    };
    let total = total.map_or_else(|| "?".to_string(), |t| format_bytes(t as f64));
    format!(
        "⬇ {} {:.2}% {}/{} {:<15} {:<13}",
        file_name,
        percent,
        format_bytes(done as f64),
        total,
        format_rate(bytes_per_sec),
        phase.tag()
    )
}

/// Periodically samples every download and redraws their lines.
pub struct ProgressReporter {
    downloads: Vec<Arc<FileDownload>>,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(downloads: Vec<Arc<FileDownload>>, interval: Duration) -> Self {
        Self { downloads, interval }
    }

    /// Redraws until every download has reached a terminal phase. Finished
    /// downloads get one last line and are not sampled again.
    pub async fn run(self, target: ProgressDrawTarget) -> ProgressBoard {
        let mut board = ProgressBoard::new(target);
        let mut active = self.downloads;
        let secs = self.interval.as_secs_f64();

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        while !active.is_empty() {
            ticker.tick().await;
            active.retain(|download| {
                let phase = download.phase();
                let speed = download.status().sample() as f64 / secs;
                let line = status_line(
                    download.file_name(),
                    phase,
                    download.status().transferred(),
                    download.total_size(),
                    speed,
                );
                if phase.is_terminal() {
                    board.finish_line(download.id(), line);
                    false
                } else {
                    board.set_line(download.id(), line);
                    true
                }
            });
        }
        board
    }
}
