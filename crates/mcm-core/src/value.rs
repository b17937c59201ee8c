use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A coerced attribute value.
///
/// Lists are homogeneous only by convention; nothing enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Integer(_) | Self::Float(_) | Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Float(_) | Self::String(_) | Self::List(_) => None,
        }
    }

    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Wraps a scalar into a one-element list; lists are returned unchanged.
    #[must_use]
    pub fn into_list(self) -> Vec<AttributeValue> {
        match self {
            Self::List(items) => items,
            scalar @ (Self::Integer(_) | Self::Float(_) | Self::String(_)) => vec![scalar],
        }
    }

    /// Plain textual form without quoting. Lists are joined with `", "`.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::String(value) => value.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_plain_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Integers held by this value: the integer itself, or every integer of a
    /// list. Non-integer list items are skipped.
    #[must_use]
    pub fn integers(&self) -> Vec<i64> {
        match self {
            Self::Integer(value) => vec![*value],
            Self::List(items) => items.iter().filter_map(Self::as_integer).collect(),
            Self::Float(_) | Self::String(_) => Vec::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        Self::List(value)
    }
}

/// Serialized form used on comment lines: strings are quoted so that they
/// coerce back to strings, floats always keep a fractional marker.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => f.write_str(&format_float(*value)),
            Self::String(value) if value.contains('"') => write!(f, "`{value}`"),
            Self::String(value) => write!(f, "\"{value}\""),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    // `{:?}` always keeps a `.` or an exponent, so the text re-parses as a float.
    format!("{value:?}")
}

/// Ordered attribute map with a parallel, sparse inline-comment map and the
/// non-attribute body text of the block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeBlock {
    pub values: IndexMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inline_comments: IndexMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl AttributeBlock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn insert_with_comment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
        comment: Option<String>,
    ) {
        let key = key.into();
        match comment {
            Some(comment) => {
                self.inline_comments.insert(key.clone(), comment);
            }
            None => {
                self.inline_comments.shift_remove(&key);
            }
        }
        self.values.insert(key, value.into());
    }

    /// Removes a key together with its inline comment, keeping the order of
    /// the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<(AttributeValue, Option<String>)> {
        let value = self.values.shift_remove(key)?;
        let comment = self.inline_comments.shift_remove(key);
        Some((value, comment))
    }

    #[must_use]
    pub fn comment(&self, key: &str) -> Option<&str> {
        self.inline_comments.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.body.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue, Option<&str>)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value, self.comment(key)))
    }
}

/// `key=value` display styling carried verbatim by nodes and relations.
pub type StyleMap = IndexMap<String, String>;
