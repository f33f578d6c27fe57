//! Mirrors source paths into the destination tree.

use crate::discovery::SourceFile;
use crate::error::ConversionError;
use std::collections::hash_map::{Entry, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension given to every output file
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Name prefix and suffix of in-progress output files
pub const PARTIAL_PREFIX: &str = ".txt2pdf-";
pub const PARTIAL_SUFFIX: &str = ".partial";

/// A source file paired with the PDF path it will be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub source: SourceFile,
    pub destination: PathBuf,
}

/// Tasks for one run. A source whose destination was already claimed by an
/// earlier source is held back with a `DestinationConflict` error.
#[derive(Debug, Default)]
pub struct TaskPlan {
    pub tasks: Vec<ConversionTask>,
    pub conflicts: Vec<(ConversionTask, ConversionError)>,
}

impl TaskPlan {
    pub fn len(&self) -> usize {
        self.tasks.len() + self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl PathMapper {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Destination for `file`: its relative path re-rooted under the
    /// destination with the final extension replaced by `.pdf`.
    pub fn destination_for(&self, file: &SourceFile) -> PathBuf {
        let relative = file
            .path
            .strip_prefix(&self.source_root)
            .unwrap_or(&file.relative);

        self.dest_root
            .join(relative)
            .with_extension(OUTPUT_EXTENSION)
    }

    pub fn task_for(&self, file: SourceFile) -> ConversionTask {
        let destination = self.destination_for(&file);
        ConversionTask {
            source: file,
            destination,
        }
    }

    /// Map every file, keeping the first claimant of each destination in
    /// discovery order
    pub fn plan(&self, files: Vec<SourceFile>) -> TaskPlan {
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(files.len());
        let mut plan = TaskPlan::default();

        for file in files {
            let task = self.task_for(file);
            match claimed.entry(task.destination.clone()) {
                Entry::Occupied(first) => {
                    let error = ConversionError::DestinationConflict {
                        destination: task.destination.clone(),
                        claimed_by: first.get().clone(),
                    };
                    plan.conflicts.push((task, error));
                }
                Entry::Vacant(slot) => {
                    slot.insert(task.source.path.clone());
                    plan.tasks.push(task);
                }
            }
        }

        if !plan.conflicts.is_empty() {
            warn!(
                "{} sources map to a destination already claimed by another source",
                plan.conflicts.len()
            );
        }
        plan
    }

    /// Remove in-progress files left under the destination root by an
    /// interrupted run. Returns how many were removed.
    pub fn sweep_partials(&self) -> usize {
        let mut removed = 0;

        for entry in WalkDir::new(&self.dest_root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_partial(entry.path()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Removed stale {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
            }
        }
        removed
    }

    /// Create the destination's parent chain. Safe to race with other workers.
    pub fn prepare(&self, task: &ConversionTask) -> Result<(), ConversionError> {
        ensure_parent_dir(&task.destination)
    }

    /// Compute the destination for `file` and make sure its directory exists
    pub fn map(&self, file: &SourceFile) -> Result<PathBuf, ConversionError> {
        let destination = self.destination_for(file);
        ensure_parent_dir(&destination)?;
        Ok(destination)
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX))
}

fn ensure_parent_dir(path: &Path) -> Result<(), ConversionError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    // create_dir_all already tolerates a concurrent creator winning the race
    fs::create_dir_all(parent).map_err(|source| ConversionError::DirectoryCreate {
        path: parent.to_path_buf(),
        source,
    })
}
