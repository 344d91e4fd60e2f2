//! xlsx writer: one sheet per category, committed atomically
//!
//! The workbook is built in memory, saved to `<destination>.tmp` and renamed
//! over the destination only after the manifest verifies. An advisory lock
//! on `<destination>.lock` keeps two exports off the same file. On any
//! failure or cancellation the temporary file is removed, so the destination
//! is either the complete new workbook or untouched.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use indicatif::ProgressBar;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use storesync_core::{CancelToken, FetchResult};

use crate::error::ExportError;
use crate::group::{group_by_category, CategoryGroup};
use crate::manifest::{ExportManifest, SheetSummary};
use crate::row::{derive_columns, flatten_entity, Cell, Row, WidthRule};
use crate::sheet::SheetNamer;

/// Header fill
const HEADER_COLOR: u32 = 0x366092;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Joins list values into one cell
    pub delimiter: String,
    pub widths: WidthRule,
    /// Title of the sheet holding entities without categories
    pub uncategorized_title: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ", ".to_string(),
            widths: WidthRule::default(),
            uncategorized_title: "Uncategorized".to_string(),
        }
    }
}

type SheetObserver = Box<dyn Fn(&SheetSummary) + Send + Sync>;

/// Category export with cancellation and progress.
pub struct Exporter {
    options: ExportOptions,
    cancel: CancelToken,
    progress: ProgressBar,
    on_sheet: Option<SheetObserver>,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
            progress: ProgressBar::hidden(),
            on_sheet: None,
        }
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    /// Called after each category sheet is written, before the next starts.
    pub fn on_sheet(mut self, f: impl Fn(&SheetSummary) + Send + Sync + 'static) -> Self {
        self.on_sheet = Some(Box::new(f));
        self
    }

    /// Write `result` to `destination`, one sheet per category.
    pub fn export(
        &self,
        result: &FetchResult,
        destination: &Path,
    ) -> Result<ExportManifest, ExportError> {
        let _lock = DestinationLock::acquire(destination)?;
        let tmp = TmpFile::new(with_suffix(destination, ".tmp"))?;

        let groups = group_by_category(result);
        log::info!(
            "Exporting {} {} into {} sheet(s)",
            result.len(),
            result.resource,
            groups.len().max(1)
        );
        let pb = &self.progress;
        pb.set_length(groups.len() as u64);

        let header = header_format();
        let mut workbook = Workbook::new();
        let mut namer = SheetNamer::new();
        let mut sheets = Vec::with_capacity(groups.len());

        for group in &groups {
            if self.cancel.is_cancelled() {
                log::warn!("export cancelled after {} sheet(s)", sheets.len());
                return Err(ExportError::Cancelled);
            }
            let title = namer.assign(&group.raw_title(&self.options.uncategorized_title));
            pb.set_message(title.clone());
            let summary = self.write_group(&mut workbook, &header, group, title)?;
            log::debug!(
                "sheet '{}': {} rows, {} columns",
                summary.title,
                summary.row_count,
                summary.column_count
            );
            if let Some(f) = &self.on_sheet {
                f(&summary);
            }
            sheets.push(summary);
            pb.inc(1);
        }

        if groups.is_empty() {
            // A workbook needs at least one sheet.
            let title = namer.assign(&self.options.uncategorized_title);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&title)?;
            let columns = derive_columns(&[]);
            write_header(worksheet, &header, &columns, &self.options.widths, &[])?;
            sheets.push(SheetSummary {
                title,
                category_id: None,
                row_count: 0,
                column_count: columns.len(),
            });
        }

        let manifest = ExportManifest {
            path: destination.to_path_buf(),
            resource: result.resource.clone(),
            sheets,
            total_entities: result.len(),
        };
        manifest.verify(result)?;

        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        workbook.save(tmp.path())?;
        tmp.commit(destination)?;

        log::info!(
            "Wrote {} ({} sheets, {} rows)",
            destination.display(),
            manifest.sheets.len(),
            manifest.total_rows()
        );
        Ok(manifest)
    }

    fn write_group(
        &self,
        workbook: &mut Workbook,
        header: &Format,
        group: &CategoryGroup<'_>,
        title: String,
    ) -> Result<SheetSummary, ExportError> {
        let rows: Vec<Row> = group
            .entities
            .iter()
            .map(|e| flatten_entity(e, &self.options.delimiter))
            .collect();
        let columns = derive_columns(&rows);

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&title)?;
        write_header(worksheet, header, &columns, &self.options.widths, &rows)?;

        for (i, row) in rows.iter().enumerate() {
            let r = row_index(i + 1)?;
            for (c, column) in columns.iter().enumerate() {
                if let Some(cell) = row.get(column) {
                    write_cell(worksheet, r, col_index(c)?, cell)?;
                }
            }
        }

        Ok(SheetSummary {
            title,
            category_id: group.category.map(|c| c.id),
            row_count: rows.len(),
            column_count: columns.len(),
        })
    }
}

/// Export with default options, no cancellation, no progress.
pub fn export_by_category(
    result: &FetchResult,
    destination: &Path,
) -> Result<ExportManifest, ExportError> {
    Exporter::new(ExportOptions::default()).export(result, destination)
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_COLOR))
        .set_align(FormatAlign::Center)
}

/// Bold header row, frozen, with auto-sized columns.
fn write_header(
    worksheet: &mut Worksheet,
    format: &Format,
    columns: &[String],
    rule: &WidthRule,
    rows: &[Row],
) -> Result<(), XlsxError> {
    let widths = rule.widths(columns, rows);
    for (c, (column, width)) in columns.iter().zip(widths).enumerate() {
        let c = col_index(c)?;
        worksheet.write_string_with_format(0, c, column, format)?;
        worksheet.set_column_width(c, width as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::Empty => {}
        Cell::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Cell::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Cell::Float(x) if x.is_finite() => {
            worksheet.write_number(row, col, *x)?;
        }
        Cell::Float(x) => {
            worksheet.write_string(row, col, x.to_string())?;
        }
        Cell::Text(t) => {
            worksheet.write_string(row, col, t)?;
        }
    }
    Ok(())
}

fn row_index(i: usize) -> Result<u32, XlsxError> {
    u32::try_from(i).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_index(i: usize) -> Result<u16, XlsxError> {
    u16::try_from(i).map_err(|_| XlsxError::RowColumnLimitError)
}

/// `path` with `suffix` appended to the file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Exclusive advisory lock on `<destination>.lock`, released when the
/// handle closes. The lock file is never unlinked, so every exporter
/// contends on the same inode.
struct DestinationLock {
    _file: File,
}

impl DestinationLock {
    fn acquire(destination: &Path) -> Result<Self, ExportError> {
        let path = with_suffix(destination, ".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ExportError::io(&path, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { _file: file }),
            Err(e) if is_contended(&e) => {
                Err(ExportError::DestinationBusy(destination.to_path_buf()))
            }
            Err(e) => Err(ExportError::io(&path, e)),
        }
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Temporary output removed on drop unless committed.
struct TmpFile {
    path: PathBuf,
    committed: bool,
}

impl TmpFile {
    fn new(path: PathBuf) -> Result<Self, ExportError> {
        if path.exists() {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path).map_err(|e| ExportError::io(&path, e))?;
        }
        Ok(Self {
            path,
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename tmp → destination
    fn commit(mut self, destination: &Path) -> Result<(), ExportError> {
        fs::rename(&self.path, destination).map_err(|e| ExportError::io(destination, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            log::debug!("removing incomplete export {}", self.path.display());
            let _ = fs::remove_file(&self.path);
        }
    }
}
