//! Typed entities extracted from utterances.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Kind of an extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Date,
    Location,
    Keyword,
    Person,
    Object,
    Quantity,
    AlbumName,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date => write!(f, "DATE"),
            Self::Location => write!(f, "LOCATION"),
            Self::Keyword => write!(f, "KEYWORD"),
            Self::Person => write!(f, "PERSON"),
            Self::Object => write!(f, "OBJECT"),
            Self::Quantity => write!(f, "QUANTITY"),
            Self::AlbumName => write!(f, "ALBUM_NAME"),
        }
    }
}

/// Half-open byte range `[start, end)` over the utterance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Closed date range. `exact` marks a phrase that names a single day outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub exact: bool,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            exact: false,
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
            exact: true,
        }
    }

    /// Decoded parameter value: a single `YYYY-MM-DD` for exact days,
    /// otherwise `{start, end}`.
    pub fn to_json(&self) -> Value {
        if self.exact && self.start == self.end {
            Value::String(self.start.format("%Y-%m-%d").to_string())
        } else {
            json!({
                "start": self.start.format("%Y-%m-%d").to_string(),
                "end": self.end.format("%Y-%m-%d").to_string(),
            })
        }
    }
}

/// How a quantity phrase selects its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// "all", "everything"
    All,
    /// "these 5": the caller's current selection
    These,
    /// "the last 5": most recent first
    Last,
    /// "the first 5": oldest first
    First,
    /// A bare count with no ordering cue
    Count,
}

impl Selector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::These => "these",
            Self::Last => "last",
            Self::First => "first",
            Self::Count => "count",
        }
    }
}

/// A quantifier over targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl Quantity {
    pub fn new(selector: Selector, count: Option<u32>) -> Self {
        Self { selector, count }
    }

    /// Selection object understood by target resolvers.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("selector".into(), Value::String(self.selector.as_str().into()));
        if let Some(count) = self.count {
            obj.insert("count".into(), Value::from(count));
        }
        Value::Object(obj)
    }
}

/// Typed value carried by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    Text(String),
    Date(DateRange),
    Quantity(Quantity),
}

impl EntityValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decode into the JSON value bound to a parameter.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Date(range) => range.to_json(),
            Self::Quantity(q) => q.to_json(),
        }
    }
}

/// A typed value span extracted from an utterance.
///
/// Entities may overlap; extraction keeps every plausible reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub kind: EntityKind,
    pub value: EntityValue,
    /// The matched surface text.
    pub text: String,
    pub span: Span,
    pub confidence: f32,
}

impl ExtractedEntity {
    pub fn new(
        kind: EntityKind,
        value: EntityValue,
        text: impl Into<String>,
        span: Span,
        confidence: f32,
    ) -> Self {
        Self {
            kind,
            value,
            text: text.into(),
            span,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
