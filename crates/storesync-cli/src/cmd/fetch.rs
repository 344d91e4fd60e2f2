//! Fetch subcommand - download a resource and export it by category

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use storesync_core::fmt_num;
use storesync_export::{ExportOptions, Exporter, WidthRule};

use super::{print_summary, Session};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Resource collection, e.g. products, orders, customers
    #[arg(default_value = "products")]
    pub resource: String,

    /// Output workbook (default: <resource>_<timestamp>.xlsx in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Items per page (capped at 100)
    #[arg(short, long)]
    pub per_page: Option<u32>,

    /// Status filter, e.g. publish, draft, any
    #[arg(short, long)]
    pub status: Option<String>,

    /// Extra query filter (repeatable), e.g. --filter category=15
    #[arg(short, long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Also write <output>.manifest.json
    #[arg(long)]
    pub manifest: bool,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter key in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn run(args: FetchArgs, config: &Config, session: &Session) -> Result<()> {
    let mut client = session.client.clone();
    if let Some(per_page) = args.per_page {
        client.page_size = per_page;
    }
    let session = Session {
        client,
        progress: session.progress.clone(),
        cancel: session.cancel.clone(),
    };

    let mut filters = args.filters;
    if let Some(status) = args.status {
        filters.push(("status".to_string(), status));
    }

    let output = args.output.unwrap_or_else(|| {
        config
            .output
            .default_dir
            .join(default_file_name(&args.resource, chrono::Local::now()))
    });

    let start = Instant::now();
    let fetch_pb = session.progress.stage_line("fetch");
    let connector = session.connector(fetch_pb.clone())?;
    let result = connector
        .fetch_all_entities(&args.resource, &filters)
        .with_context(|| format!("Failed to fetch {}", args.resource))?;
    fetch_pb.finish_and_clear();
    let fetch_elapsed = start.elapsed();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = ExportOptions {
        delimiter: config.output.delimiter.clone(),
        widths: WidthRule {
            max_width: config.output.max_column_width,
            ..WidthRule::default()
        },
        uncategorized_title: config.output.uncategorized_title.clone(),
    };
    let export_pb = session.progress.stage_line("export");
    let manifest = Exporter::new(options)
        .cancel_token(session.cancel.clone())
        .progress(export_pb.clone())
        .on_sheet(|sheet| {
            log::info!("  {:<31} {:>8} rows", sheet.title, fmt_num(sheet.row_count));
        })
        .export(&result, &output)
        .with_context(|| format!("Failed to export {}", output.display()))?;
    export_pb.finish_and_clear();

    if args.manifest {
        let path = manifest_path(&output);
        manifest.write_json(&path)?;
        log::info!("Manifest written to {}", path.display());
    }

    let mut rows = vec![
        ("Resource", result.resource.clone()),
        ("Entities", fmt_num(result.len())),
        ("Page requests", result.pages.to_string()),
        ("Sheets", manifest.sheets.len().to_string()),
        ("Rows written", fmt_num(manifest.total_rows())),
        ("Fetch time", format!("{:.1}s", fetch_elapsed.as_secs_f64())),
        ("Total time", format!("{:.1}s", start.elapsed().as_secs_f64())),
        ("Output", output.display().to_string()),
    ];
    if let Some(total) = result.reported_total {
        rows.insert(2, ("Server total", fmt_num(total as usize)));
    }
    print_summary("Fetch", &rows);
    Ok(())
}

/// `<resource>_<YYYYmmdd_HHMMSS>.xlsx`; nested resources use `_` for `/`.
fn default_file_name<Tz: chrono::TimeZone>(resource: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stem = resource.trim_matches('/').replace('/', "_");
    format!("{stem}_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

fn manifest_path(output: &Path) -> PathBuf {
    output.with_extension("manifest.json")
}
