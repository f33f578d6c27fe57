//! Bulk text-to-PDF converter
//!
//! This crate mirrors a directory tree of text-like files into a tree of PDF
//! documents, converting files in parallel on a bounded worker pool.

pub mod cli;
pub mod config;
pub mod converter;
pub mod discovery;
pub mod error;
pub mod notify;
pub mod path_mapper;
pub mod pipeline;
pub mod pool;
pub mod progress;

pub use config::{RunConfig, Settings};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunOutcome};

/// Crate version, shown by the CLI banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::{RunConfig, Settings},
        converter::{FileConverter, GenpdfRenderer, TextBlock, TextDecoder, TextRenderer},
        discovery::{discover, ExtensionAllowlist, SourceFile},
        error::{ConversionError, PipelineError, Result},
        notify::{NoopNotifier, Notifier, TerminalBell},
        path_mapper::{ConversionTask, PathMapper},
        pipeline::{Pipeline, RunOutcome},
        pool::{ConversionResult, Outcome, WorkerPool},
        progress::{ProgressTracker, RunSummary},
    };

    pub use tracing::{debug, error, info, warn};
}
