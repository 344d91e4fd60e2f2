//! Entity → row flattening, column derivation and width sizing

use std::collections::HashSet;

use storesync_core::{AttributeBag, AttributeValue, Entity, Scalar};

/// Excel's per-cell text limit, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// One worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn from_scalar(s: &Scalar) -> Self {
        match s {
            Scalar::Null => Self::Empty,
            Scalar::Bool(b) => Self::Bool(*b),
            Scalar::Int(i) => Self::Int(*i),
            Scalar::Float(x) => Self::Float(*x),
            Scalar::Text(t) if t.is_empty() => Self::Empty,
            Scalar::Text(t) => Self::Text(t.clone()),
        }
    }

    /// Rendered width in characters.
    pub fn width(&self) -> usize {
        match self {
            Self::Text(t) => t.lines().map(|l| l.chars().count()).max().unwrap_or(0),
            other => other.to_string().len(),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// A flattened entity: `(column, cell)` pairs in attribute order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Cell)>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    fn push(&mut self, column: String, cell: Cell) {
        self.0.push((column, cell));
    }
}

/// Flatten one entity. `id` and `name` come first, then every attribute.
///
/// Nested objects expand one level into `parent.child` columns. Lists of
/// scalars, and lists of objects that all carry a `name`, are joined with
/// `delimiter`. Anything deeper is kept as compact JSON text.
pub fn flatten_entity(entity: &Entity, delimiter: &str) -> Row {
    let mut row = Row::default();
    row.push("id".to_string(), Cell::Int(entity.id));
    row.push("name".to_string(), text_cell(&entity.name));

    for (key, value) in entity.attributes.iter() {
        match value {
            AttributeValue::Object(child) => {
                for (child_key, child_value) in child.iter() {
                    row.push(format!("{key}.{child_key}"), leaf_cell(child_value, delimiter));
                }
            }
            other => row.push(key.to_string(), leaf_cell(other, delimiter)),
        }
    }
    for (column, cell) in &mut row.0 {
        if let Cell::Text(text) = cell {
            if truncate_chars(text, MAX_CELL_CHARS) {
                log::warn!(
                    "entity {}: column '{column}' cut to {MAX_CELL_CHARS} characters",
                    entity.id
                );
            }
        }
    }
    row
}

/// Cut `s` to at most `max` characters; true if anything was removed.
fn truncate_chars(s: &mut String, max: usize) -> bool {
    match s.char_indices().nth(max) {
        Some((byte, _)) => {
            s.truncate(byte);
            true
        }
        None => false,
    }
}

fn leaf_cell(value: &AttributeValue, delimiter: &str) -> Cell {
    match value {
        AttributeValue::Scalar(s) => Cell::from_scalar(s),
        AttributeValue::List(items) => list_cell(items, delimiter),
        AttributeValue::Object(_) => text_cell(&value.to_json().to_string()),
    }
}

fn list_cell(items: &[AttributeValue], delimiter: &str) -> Cell {
    if items.is_empty() {
        return Cell::Empty;
    }
    if let Some(scalars) = items
        .iter()
        .map(AttributeValue::as_scalar)
        .collect::<Option<Vec<_>>>()
    {
        let parts: Vec<String> = scalars
            .iter()
            .filter(|s| !matches!(s, Scalar::Null))
            .map(ToString::to_string)
            .collect();
        return text_cell(&parts.join(delimiter));
    }
    if let Some(names) = items.iter().map(object_name).collect::<Option<Vec<_>>>() {
        return text_cell(&names.join(delimiter));
    }
    let json = serde_json::Value::Array(items.iter().map(AttributeValue::to_json).collect());
    text_cell(&json.to_string())
}

fn object_name(value: &AttributeValue) -> Option<&str> {
    match value {
        AttributeValue::Object(bag) => bag_name(bag),
        _ => None,
    }
}

fn bag_name(bag: &AttributeBag) -> Option<&str> {
    bag.get("name").and_then(AttributeValue::as_text)
}

fn text_cell(s: &str) -> Cell {
    if s.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

/// Union of the rows' columns: `id`, `name`, then first-seen order.
pub fn derive_columns(rows: &[Row]) -> Vec<String> {
    let mut columns = vec!["id".to_string(), "name".to_string()];
    let mut seen: HashSet<&str> = HashSet::from(["id", "name"]);
    for row in rows {
        for column in row.columns() {
            if seen.insert(column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

/// Column width sizing parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthRule {
    pub padding: usize,
    pub max_width: usize,
}

impl Default for WidthRule {
    fn default() -> Self {
        Self {
            padding: 2,
            max_width: 50,
        }
    }
}

impl WidthRule {
    /// `min(max_width, max(header, widest cell) + padding)` per column.
    pub fn widths(&self, columns: &[String], rows: &[Row]) -> Vec<usize> {
        columns
            .iter()
            .map(|column| {
                let content = rows
                    .iter()
                    .filter_map(|r| r.get(column))
                    .map(Cell::width)
                    .max()
                    .unwrap_or(0);
                let widest = content.max(column.chars().count());
                (widest + self.padding).min(self.max_width)
            })
            .collect()
    }
}
