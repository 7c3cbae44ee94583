//! Error types for the hand-over analysis pipeline.

use std::path::PathBuf;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop an analysis run.
///
/// Join misses during geo enrichment are deliberately absent: a site without
/// coordinates is carried through with empty fields.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported report format for '{0}' (expected a csv or xls/xlsx file)")]
    UnsupportedFormat(String),

    #[error("Could not parse report: {0}")]
    Parse(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing reference data: {0}")]
    MissingReferenceData(String),

    #[error("Reference workbook discovery failed: {0}")]
    ReferenceDiscovery(String),

    #[error("Could not derive source site: {0}")]
    SourceSite(String),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
