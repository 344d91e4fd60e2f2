//! Subcommands

pub mod fetch;
pub mod probe;
pub mod show;

use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use indicatif::ProgressBar;
use storesync_core::{CancelToken, ClientConfig, Connector, SharedProgress};

/// State shared by every subcommand of one invocation.
pub struct Session {
    pub client: ClientConfig,
    pub progress: SharedProgress,
    pub cancel: CancelToken,
}

impl Session {
    /// Validated connector reporting on `pb`.
    pub fn connector(&self, pb: ProgressBar) -> Result<Connector> {
        let connector = Connector::new(self.client.clone())
            .context("Invalid store configuration")?
            .with_cancel(self.cancel.clone())
            .with_progress(pb);
        Ok(connector)
    }
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
