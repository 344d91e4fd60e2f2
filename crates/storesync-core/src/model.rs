//! Entity model: typed identity fields plus a tagged attribute bag
//!
//! Upstream resources (products, orders, customers) vary in shape, so only
//! `id`, display name, status and categories are typed. Everything else is
//! kept as an ordered bag of scalar / list / object values.

use serde_json::Value;

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One attribute in the bag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(Scalar),
    List(Vec<AttributeValue>),
    Object(AttributeBag),
}

impl AttributeValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Self::Scalar(Scalar::Text(s)),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(AttributeBag::from_map(map)),
        }
    }

    /// Back to JSON (used to render deeply nested values as text).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(Scalar::Null) => Value::Null,
            Self::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Self::Scalar(Scalar::Int(i)) => Value::from(*i),
            Self::Scalar(Scalar::Float(x)) => {
                serde_json::Number::from_f64(*x).map_or(Value::Null, Value::Number)
            }
            Self::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(bag) => Value::Object(
                bag.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(i)) => Some(*i),
            Self::Scalar(Scalar::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Attributes in server key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag(Vec<(String, AttributeValue)>);

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: serde_json::Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, AttributeValue::from_json(v)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(AttributeValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Publication / lifecycle status.
///
/// Catalog resources use the first four; orders and other resources keep
/// their own value in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Published,
    Draft,
    Pending,
    Private,
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "publish" | "published" => Self::Published,
            "draft" => Self::Draft,
            "pending" => Self::Pending,
            "private" => Self::Private,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire value as sent by the API.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Published => "publish",
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// One synchronized record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub status: Status,
    /// Distinct categories, in server order
    pub categories: Vec<Category>,
    /// Every field except `id` and `name`
    pub attributes: AttributeBag,
}

/// Why a JSON item could not become an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityParseError {
    NotAnObject,
    MissingId,
}

impl std::fmt::Display for EntityParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("item is not a JSON object"),
            Self::MissingId => f.write_str("item has no integer 'id'"),
        }
    }
}

impl std::error::Error for EntityParseError {}

impl Entity {
    pub fn from_json(value: Value) -> Result<Self, EntityParseError> {
        let Value::Object(map) = value else {
            return Err(EntityParseError::NotAnObject);
        };
        let mut bag = AttributeBag::from_map(map);

        let id = bag
            .get("id")
            .and_then(AttributeValue::as_i64)
            .ok_or(EntityParseError::MissingId)?;
        let name = display_name(&bag);
        let status = bag
            .text("status")
            .map(Status::parse)
            .unwrap_or_else(|| Status::Other(String::new()));
        let categories = bag.get("categories").map(parse_categories).unwrap_or_default();

        bag.0.retain(|(k, _)| k != "id" && k != "name");

        Ok(Self {
            id,
            name,
            status,
            categories,
            attributes: bag,
        })
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

/// `name`, else first/last name, else billing first/last name, else `#number`.
fn display_name(bag: &AttributeBag) -> String {
    if let Some(name) = bag.text("name") {
        return name.to_string();
    }
    let person = |b: &AttributeBag| {
        let parts: Vec<&str> = ["first_name", "last_name"]
            .iter()
            .filter_map(|k| b.text(k))
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    };
    if let Some(full) = person(bag) {
        return full;
    }
    if let Some(AttributeValue::Object(billing)) = bag.get("billing") {
        if let Some(full) = person(billing) {
            return full;
        }
    }
    match bag.get("number").and_then(AttributeValue::as_scalar) {
        Some(Scalar::Null) | None => String::new(),
        Some(n) => format!("#{n}"),
    }
}

fn parse_categories(value: &AttributeValue) -> Vec<Category> {
    let AttributeValue::List(items) = value else {
        return Vec::new();
    };
    let mut out: Vec<Category> = Vec::with_capacity(items.len());
    for item in items {
        let AttributeValue::Object(obj) = item else {
            continue;
        };
        let Some(id) = obj.get("id").and_then(AttributeValue::as_i64) else {
            continue;
        };
        if out.iter().any(|c| c.id == id) {
            continue;
        }
        let name = obj.text("name").unwrap_or_default().to_string();
        out.push(Category { id, name });
    }
    out
}

/// Every entity of one run, in page order then server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub resource: String,
    pub entities: Vec<Entity>,
    /// Page requests issued
    pub pages: u32,
    /// `X-WP-Total` from the first page, if advertised
    pub reported_total: Option<u64>,
}

impl FetchResult {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Rows a category export must contain: one per category, at least one per entity.
    pub fn expected_export_rows(&self) -> usize {
        self.entities
            .iter()
            .map(|e| e.category_count().max(1))
            .sum()
    }
}
