//! Export error types

use std::path::PathBuf;

use rust_xlsxwriter::XlsxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workbook error: {0}")]
    Workbook(#[from] XlsxError),

    #[error("destination {} is being written by another export", .0.display())]
    DestinationBusy(PathBuf),

    #[error("export cancelled")]
    Cancelled,

    #[error("export incomplete: expected {expected} rows, wrote {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("cannot write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
