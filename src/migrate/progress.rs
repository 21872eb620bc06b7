use std::time::Instant;

use tracing::info;

use super::stats::MigrationStats;

/// Emits a progress line every `every` records, with rate and ETA when the total is known.
pub struct Progress {
    label: String,
    total: Option<usize>,
    every: usize,
    start: Instant,
}

impl Progress {
    pub fn new<L: Into<String>>(label: L, total: Option<usize>, every: usize) -> Self {
        Self {
            label: label.into(),
            total,
            every: every.max(1),
            start: Instant::now(),
        }
    }

    pub fn tick(&mut self, stats: &MigrationStats) {
        if stats.total % self.every == 0 {
            self.log(stats, false);
        }
    }

    pub fn finish(&mut self, stats: &MigrationStats) {
        self.log(stats, true);
    }

    fn log(&self, stats: &MigrationStats, done: bool) {
        let processed = stats.total;
        let elapsed = self.start.elapsed().as_secs_f64().max(0.001);
        let rate = (processed as f64) / elapsed;

        match self.total.filter(|t| *t > 0) {
            Some(total) if !done => {
                let pct = 100.0 * (processed as f64) / (total as f64);
                let eta = ((total.saturating_sub(processed)) as f64) / rate.max(0.001);
                info!(
                    target: "progress",
                    label = %self.label,
                    processed,
                    total,
                    succeeded = stats.succeeded,
                    duplicates = stats.duplicates,
                    failed = stats.failed,
                    pct = format!("{pct:.1}"),
                    rate = format!("{rate:.1}/s"),
                    eta = format!("{eta:.1}s"),
                    "progress"
                );
            }
            _ => {
                info!(
                    target: "progress",
                    label = %self.label,
                    processed,
                    succeeded = stats.succeeded,
                    duplicates = stats.duplicates,
                    failed = stats.failed,
                    rate = format!("{rate:.1}/s"),
                    took = format!("{elapsed:.1}s"),
                    "{}",
                    if done { "done" } else { "progress" }
                );
            }
        }
    }
}
