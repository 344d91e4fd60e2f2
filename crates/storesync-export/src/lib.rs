//! Storesync Export - category-grouped xlsx workbooks
//!
//! Splits a [`storesync_core::FetchResult`] by category, flattens each
//! entity into a row and writes one worksheet per category.

pub mod error;
pub mod group;
pub mod manifest;
pub mod row;
pub mod sheet;
pub mod workbook;

pub use error::ExportError;
pub use group::{group_by_category, CategoryGroup};
pub use manifest::{ExportManifest, SheetSummary};
pub use row::{derive_columns, flatten_entity, Cell, Row, WidthRule, MAX_CELL_CHARS};
pub use sheet::{sanitize_sheet_title, SheetNamer, MAX_TITLE_LEN};
pub use workbook::{export_by_category, ExportOptions, Exporter};
