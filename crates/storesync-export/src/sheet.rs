//! Worksheet titles
//!
//! xlsx titles are at most 31 characters, may not contain `\ / * ? : [ ]`,
//! may not start or end with an apostrophe, and are unique ignoring case.

use std::collections::HashSet;

/// Hard title length limit of the xlsx format, in characters.
pub const MAX_TITLE_LEN: usize = 31;

const FORBIDDEN: [char; 7] = ['\\', '/', '*', '?', ':', '[', ']'];

/// Excel reserves this title for its change-tracking sheet.
const RESERVED: &str = "history";

const FALLBACK_TITLE: &str = "Sheet";

/// Make `raw` a legal title. Already-legal titles come back unchanged.
pub fn sanitize_sheet_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !FORBIDDEN.contains(c) && !c.is_control())
        .collect();
    let trimmed = trim_title(&cleaned);
    let truncated: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    let title = trim_title(&truncated);
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    }
}

fn trim_title(s: &str) -> &str {
    s.trim().trim_matches('\'').trim()
}

/// Hands out unique titles for one workbook.
#[derive(Debug)]
pub struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    pub fn new() -> Self {
        Self {
            used: HashSet::from([RESERVED.to_string()]),
        }
    }

    /// Sanitized, unique title for `raw`; collisions get `-2`, `-3`, ...
    pub fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_title(raw);
        if self.used.insert(base.to_lowercase()) {
            return base;
        }
        let mut n = 2u32;
        loop {
            let suffix = format!("-{n}");
            let room = MAX_TITLE_LEN - suffix.len();
            let stem: String = base.chars().take(room).collect();
            let candidate = format!("{}{suffix}", trim_title(&stem));
            if self.used.insert(candidate.to_lowercase()) {
                log::debug!("sheet title '{base}' taken, using '{candidate}'");
                return candidate;
            }
            n += 1;
        }
    }
}

impl Default for SheetNamer {
    fn default() -> Self {
        Self::new()
    }
}
