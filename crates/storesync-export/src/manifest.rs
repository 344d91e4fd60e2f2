//! Export manifest: what was written, for caller-side verification

use std::path::{Path, PathBuf};

use serde::Serialize;
use storesync_core::FetchResult;

use crate::error::ExportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub title: String,
    /// Category id; `None` for the uncategorized sheet
    pub category_id: Option<i64>,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportManifest {
    pub path: PathBuf,
    pub resource: String,
    pub sheets: Vec<SheetSummary>,
    pub total_entities: usize,
}

impl ExportManifest {
    /// Data rows across all sheets, counting multi-category duplicates.
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|s| s.row_count).sum()
    }

    /// Every entity written at least once: rows equal Σ max(1, categories).
    pub fn verify(&self, result: &FetchResult) -> Result<(), ExportError> {
        let expected = result.expected_export_rows();
        let actual = self.total_rows();
        if expected != actual || self.total_entities != result.len() {
            return Err(ExportError::Incomplete { expected, actual });
        }
        Ok(())
    }

    /// Write the manifest as pretty JSON next to the workbook.
    pub fn write_json(&self, path: &Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ExportError::io(path, e))
    }
}
