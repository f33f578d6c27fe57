//! Progress accounting and the end-of-run summary.

use crate::notify::Notifier;
use crate::pool::{ConversionResult, Outcome};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {bar:40.yellow/blue} {pos:>7}/{len:7} {msg}";

/// Counters for one run; `completed` only ever grows and stops at `total`
#[derive(Debug, Clone)]
pub struct RunStats {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl RunStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            succeeded: 0,
            failed: 0,
            bytes_written: 0,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Count one result. Returns the new completed count.
    pub fn record(&mut self, outcome: &Outcome) -> usize {
        if self.completed < self.total {
            self.completed += 1;
        } else {
            warn!("Received more results than the {} submitted tasks", self.total);
        }

        match outcome {
            Outcome::Success { bytes } => {
                self.succeeded += 1;
                self.bytes_written += bytes;
            }
            Outcome::Failure(_) => self.failed += 1,
        }
        self.completed
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Files per second; zero when no time has elapsed
pub fn throughput(total: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        total as f64 / secs
    } else {
        0.0
    }
}

/// Elapsed time split into calendar-style components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElapsedBreakdown {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl From<Duration> for ElapsedBreakdown {
    fn from(elapsed: Duration) -> Self {
        let total = elapsed.as_secs();
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for ElapsedBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days, {} hours, {} minutes, {} seconds",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub source: PathBuf,
    pub kind: &'static str,
    pub reason: String,
}

/// Terminal report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub concurrency: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub elapsed: ElapsedBreakdown,
    pub files_per_second: f64,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total processing time: {}.", self.elapsed)?;
        writeln!(f, "Total files processed: {}.", self.total)?;
        writeln!(
            f,
            "Converted: {}, failed: {}.",
            self.succeeded, self.failed
        )?;
        writeln!(f, "Files processed per second: {:.5}.", self.files_per_second)?;
        write!(f, "Workers used: {}.", self.concurrency)?;

        for failure in &self.failures {
            write!(
                f,
                "\n  FAILED [{}] {}: {}",
                failure.kind,
                failure.source.display(),
                failure.reason
            )?;
        }
        Ok(())
    }
}

/// Single consumer of the pool's completion channel
pub struct ProgressTracker {
    stats: RunStats,
    concurrency: usize,
    bar: ProgressBar,
    notifier: Arc<dyn Notifier>,
    failures: Vec<FailureRecord>,
}

impl ProgressTracker {
    pub fn new(total: usize, concurrency: usize, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            stats: RunStats::new(total),
            concurrency,
            bar: ProgressBar::hidden(),
            notifier,
            failures: Vec::new(),
        }
    }

    /// Draw a live progress bar on stderr
    pub fn with_progress_bar(mut self, label: &str) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(self.stats.total as u64),
            ProgressDrawTarget::stderr(),
        );
        match ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  ")),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        bar.set_message(label.to_string());
        self.bar = bar;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Record one completion event
    pub fn observe(&mut self, result: &ConversionResult) {
        let completed = self.stats.record(&result.outcome);
        self.bar.set_position(completed as u64);

        match &result.outcome {
            Outcome::Success { bytes } => debug!(
                "Converted {} -> {} ({} bytes, {:?})",
                result.task.source.path.display(),
                result.task.destination.display(),
                bytes,
                result.duration
            ),
            Outcome::Failure(e) => {
                self.bar.suspend(|| {
                    warn!("Failed to convert {}: {}", result.task.source.path.display(), e)
                });
                self.failures.push(FailureRecord {
                    source: result.task.source.path.clone(),
                    kind: e.kind(),
                    reason: e.to_string(),
                });
            }
        }

        let notifier = &self.notifier;
        if catch_unwind(AssertUnwindSafe(|| notifier.task_completed(result))).is_err() {
            warn!("Completion notifier panicked; ignoring");
        }
    }

    /// Drain the completion channel and produce the summary
    pub async fn consume(mut self, mut results: mpsc::Receiver<ConversionResult>) -> RunSummary {
        while let Some(result) = results.recv().await {
            self.observe(&result);
        }
        self.finish()
    }

    pub fn finish(self) -> RunSummary {
        let elapsed = self.stats.elapsed();
        self.bar.finish();

        if self.stats.completed != self.stats.total {
            warn!(
                "Result stream ended with {}/{} tasks completed",
                self.stats.completed, self.stats.total
            );
        }

        RunSummary {
            total: self.stats.total,
            completed: self.stats.completed,
            succeeded: self.stats.succeeded,
            failed: self.stats.failed,
            bytes_written: self.stats.bytes_written,
            concurrency: self.concurrency,
            started_at: self.stats.started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            elapsed: ElapsedBreakdown::from(elapsed),
            files_per_second: throughput(self.stats.total, elapsed),
            failures: self.failures,
        }
    }
}
