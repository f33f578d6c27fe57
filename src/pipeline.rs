//! Orchestrates discovery, the worker pool and progress tracking for one run.

use crate::config::{RunConfig, Settings};
use crate::converter::{FileConverter, GenpdfRenderer, TextRenderer};
use crate::discovery::{discover, ExtensionAllowlist};
use crate::error::{PipelineError, Result};
use crate::notify::{NoopNotifier, Notifier};
use crate::path_mapper::PathMapper;
use crate::pool::{ConversionResult, Outcome, WorkerPool};
use crate::progress::{ProgressTracker, RunSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PROGRESS_LABEL: &str = "Converting";

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Discovery found nothing eligible; the pool never started
    NoFiles,
    Completed(RunSummary),
}

pub struct Pipeline {
    config: RunConfig,
    settings: Settings,
    allowlist: ExtensionAllowlist,
    renderer: Option<Arc<dyn TextRenderer>>,
    notifier: Arc<dyn Notifier>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: RunConfig, settings: Settings) -> Self {
        let allowlist = ExtensionAllowlist::new(&settings.input.extensions);

        Self {
            config,
            settings,
            allowlist,
            renderer: None,
            notifier: Arc::new(NoopNotifier),
            show_progress: false,
        }
    }

    /// Use this renderer instead of loading the `genpdf` backend
    pub fn with_renderer(mut self, renderer: Arc<dyn TextRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_allowlist(mut self, allowlist: ExtensionAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run to completion. Only fatal errors are returned; per-file failures
    /// are reported in the summary.
    pub async fn run(self) -> Result<RunOutcome> {
        self.settings.validate()?;

        let dest_root = self.config.dest_root().to_path_buf();
        tokio::fs::create_dir_all(&dest_root)
            .await
            .map_err(|source| PipelineError::OutputRoot {
                path: dest_root.clone(),
                source,
            })?;

        let source_root = self.config.source_root().to_path_buf();
        info!("Scanning {}", source_root.display());

        let allowlist = self.allowlist.clone();
        let walk_root = source_root.clone();
        let files =
            tokio::task::spawn_blocking(move || discover(&walk_root, &allowlist)).await??;

        if files.is_empty() {
            info!("No eligible files under {}", source_root.display());
            return Ok(RunOutcome::NoFiles);
        }

        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => {
                let render_settings = self.settings.render.clone();
                let loaded =
                    tokio::task::spawn_blocking(move || GenpdfRenderer::load(&render_settings))
                        .await??;
                Arc::new(loaded)
            }
        };
        let converter = Arc::new(FileConverter::from_settings(&self.settings, renderer)?);

        let mapper = Arc::new(PathMapper::new(&source_root, &dest_root));
        let sweeper = Arc::clone(&mapper);
        let swept = tokio::task::spawn_blocking(move || sweeper.sweep_partials()).await?;
        if swept > 0 {
            info!("Removed {} partial files left by an earlier run", swept);
        }

        let plan = mapper.plan(files);
        let total = plan.len();
        let concurrency = self.config.concurrency();

        info!(
            "Converting {} files with {} workers into {}",
            total,
            concurrency,
            dest_root.display()
        );

        let mut tracker = ProgressTracker::new(total, concurrency, self.notifier);
        if self.show_progress {
            tracker = tracker.with_progress_bar(PROGRESS_LABEL);
        }

        for (task, error) in plan.conflicts {
            tracker.observe(&ConversionResult {
                task,
                outcome: Outcome::Failure(error),
                duration: Duration::ZERO,
            });
        }

        let pool = WorkerPool::new(concurrency, mapper, converter)
            .with_queue_depth(self.settings.input.queue_depth);
        let run = pool.run(plan.tasks);

        let summary = tracker.consume(run.results).await;
        run.handle.await?;

        info!(
            "Run finished: {}/{} converted, {} failed in {:.2}s",
            summary.succeeded, summary.total, summary.failed, summary.elapsed_secs
        );
        Ok(RunOutcome::Completed(summary))
    }
}
