use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal errors that abort a whole run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source tree could not be enumerated
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No usable font for the renderer
    #[error("Font error: {0}")]
    Font(#[from] FontError),

    /// Destination root could not be prepared
    #[error("Failed to create output directory '{path}': {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task of the pipeline died
    #[error("Pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors raised while walking the source tree
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A directory could not be read mid-walk
    #[error("Failed to read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An entry was reported outside the source root
    #[error("Entry '{path}' is not under source root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Per-file conversion failures. These never abort the run.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Source file could not be read
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content is neither valid UTF-8 nor valid in the fallback encoding
    #[error("Failed to decode '{path}' (tried {tried})")]
    Decode { path: PathBuf, tried: String },

    /// The PDF renderer rejected the content
    #[error("PDF rendering failed: {reason}")]
    Render { reason: String },

    /// Destination parent directory could not be created
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rendered PDF could not be written or moved into place
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The conversion panicked on its worker thread
    #[error("Conversion panicked: {message}")]
    Panicked { message: String },

    /// Another source in the run already maps to the same PDF
    #[error("Destination '{destination}' is already produced from '{claimed_by}'")]
    DestinationConflict {
        destination: PathBuf,
        claimed_by: PathBuf,
    },
}

impl ConversionError {
    /// Short stable label used in logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::Read { .. } => "read",
            ConversionError::Decode { .. } => "decode",
            ConversionError::Render { .. } => "render",
            ConversionError::DirectoryCreate { .. } => "directory",
            ConversionError::Write { .. } => "write",
            ConversionError::Panicked { .. } => "panic",
            ConversionError::DestinationConflict { .. } => "conflict",
        }
    }
}

/// Configuration validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Source root is missing or not a directory
    #[error("Source directory '{path}' does not exist or is not a directory")]
    SourceMissing { path: PathBuf },

    /// Concurrency outside the allowed range
    #[error("Concurrency {value} is out of range (min: 1, max: {max})")]
    ConcurrencyOutOfRange { value: usize, max: usize },

    /// Config file could not be read
    #[error("Config file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config format in '{path}': {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    /// A field failed validation
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Unknown fallback encoding label
    #[error("Unknown text encoding '{label}'")]
    UnknownEncoding { label: String },
}

/// Font loading errors
#[derive(Error, Debug)]
pub enum FontError {
    /// No search location had the requested family
    #[error("Could not load font family '{family}' from any of: {searched:?}")]
    NotFound {
        family: String,
        searched: Vec<PathBuf>,
    },
}
