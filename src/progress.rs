//! Progress display for sync runs.
//!
//! A run shows one bar over the tracked entries, with a live tally of how
//! entries resolved. With `--log-only` nothing is drawn; the same tally is
//! logged through `tracing` every [`SYNC_LOG_INTERVAL`] entries instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{EntryOutcome, SyncStats};

const BAR_TEMPLATE: &str = "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} [{elapsed_precise}]";

/// Entries between progress lines in log-only mode.
pub const SYNC_LOG_INTERVAL: u64 = 25;

/// Human-readable run time for the summary banner.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Spinner shown while paging through the Notion database.
pub fn notion_spinner(msg: &str, log_only: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if log_only {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        tracing::info!("{msg}");
    } else {
        let style = ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Bar over the entries of one sync run. Shared across rayon workers.
pub struct EntryProgress {
    bar: ProgressBar,
    log_only: bool,
    total: u64,
    done: AtomicU64,
    matched: AtomicUsize,
    missed: AtomicUsize,
    failed: AtomicUsize,
}

impl EntryProgress {
    pub fn new(total: u64, log_only: bool) -> Self {
        let bar = ProgressBar::new(total);
        if log_only {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            bar.set_style(style);
        }
        bar.set_prefix("Syncing");
        Self {
            bar,
            log_only,
            total,
            done: AtomicU64::new(0),
            matched: AtomicUsize::new(0),
            missed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Count one finished entry and refresh the tally.
    pub fn record(&self, outcome: &EntryOutcome) {
        let counter = match outcome {
            EntryOutcome::Updated { .. }
            | EntryOutcome::Created { .. }
            | EntryOutcome::Resolved { .. } => &self.matched,
            EntryOutcome::NoMatch | EntryOutcome::Unsupported(_) => &self.missed,
            EntryOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;

        self.bar.inc(1);
        self.bar.set_message(self.tally());

        if self.log_only && (done % SYNC_LOG_INTERVAL == 0 || done == self.total) {
            tracing::info!(
                done,
                total = self.total,
                matched = self.matched.load(Ordering::Relaxed),
                missed = self.missed.load(Ordering::Relaxed),
                failed = self.failed.load(Ordering::Relaxed),
                "sync progress"
            );
        }
    }

    /// `12 matched, 3 missed, 1 failed`
    pub fn tally(&self) -> String {
        format!(
            "{} matched, {} missed, {} failed",
            self.matched.load(Ordering::Relaxed),
            self.missed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }

    pub fn position(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn finish(&self, stats: &SyncStats) {
        self.bar.finish_with_message(format!(
            "{} ({:.1}% of {} matched)",
            self.tally(),
            stats.match_rate(),
            stats.total_entries
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(210)), "3m 30s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m");
    }

    #[test]
    fn test_entry_progress_tally() {
        let progress = EntryProgress::new(5, true);
        progress.record(&EntryOutcome::Updated { provider: "tmdb" });
        progress.record(&EntryOutcome::Resolved { provider: "igdb" });
        progress.record(&EntryOutcome::NoMatch);
        progress.record(&EntryOutcome::Unsupported("Podcast".to_string()));
        progress.record(&EntryOutcome::Failed("timeout".to_string()));

        assert_eq!(progress.position(), 5);
        assert_eq!(progress.tally(), "2 matched, 2 missed, 1 failed");
    }
}
