//! Error types for curation runs
//!
//! Only fatal conditions live here. Per-record problems are reported as
//! [`crate::rules::RejectReason`] and never surface as errors.

use std::path::PathBuf;

/// Fatal errors that abort a curation run
#[derive(thiserror::Error, Debug)]
pub enum CurateError {
    /// Input archive could not be opened
    #[error("failed to open input {}: {source}", path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory could not be created
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output file could not be opened for append
    #[error("failed to open output {}: {source}", path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dedup store could not be opened or initialised
    #[error("failed to open dedup store {}: {source}", path.display())]
    OpenDedup {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Insert attempted on a store opened for lookups only
    #[error("dedup store {} is opened read-only", path.display())]
    ReadOnlyDedup { path: PathBuf },

    /// Dedup lookup or commit failed
    #[error("dedup store error: {0}")]
    Dedup(#[from] rusqlite::Error),

    /// Read/write failure on the archive, sink or console
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for curation operations
pub type Result<T> = std::result::Result<T, CurateError>;
