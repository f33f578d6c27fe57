//! Recursive discovery of convertible source files.

use crate::error::DiscoveryError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions converted when no override is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "py", "log", "csv", "xml", "json", "html", "md", "sql", "yaml", "yml", "ini", "cfg",
    "java", "c", "cpp", "rb", "sh", "bat",
];

/// Case-insensitive set of eligible file extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAllowlist {
    extensions: BTreeSet<String>,
}

impl ExtensionAllowlist {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self { extensions }
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_ascii_lowercase())
    }

    /// Lower-cased extension of `path` if it is allowed. A dotfile such as
    /// `.txt` counts as having the extension after its leading dot.
    pub fn match_path(&self, path: &Path) -> Option<String> {
        let extension = match path.extension() {
            Some(extension) => extension.to_str()?,
            None => path.file_name()?.to_str()?.strip_prefix('.')?,
        }
        .to_ascii_lowercase();
        self.extensions.contains(&extension).then_some(extension)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

/// A discovered file eligible for conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path as found under the source root
    pub path: PathBuf,
    /// Path relative to the source root
    pub relative: PathBuf,
    /// Lower-cased extension
    pub extension: String,
}

/// Walk `root` and collect every allowed regular file.
///
/// Any unreadable directory aborts the walk: a partial listing would silently
/// skip data. Symlinks to files are kept, symlinked directories are not
/// descended into.
pub fn discover(
    root: &Path,
    allowlist: &ExtensionAllowlist,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoveryError::Unreadable {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let Some(extension) = allowlist.match_path(entry.path()) else {
            continue;
        };

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| DiscoveryError::OutsideRoot {
                path: entry.path().to_path_buf(),
                root: root.to_path_buf(),
            })?
            .to_path_buf();

        files.push(SourceFile {
            path: entry.into_path(),
            relative,
            extension,
        });
    }

    debug!("Discovered {} convertible files under {}", files.len(), root.display());
    Ok(files)
}
