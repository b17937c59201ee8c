#![forbid(unsafe_code)]

mod convert;
mod element;
mod value;

pub use convert::{
    ConversionContext, GraphSnapshot, NodeLocation, NodeLookup, SnapshotIndex, SnapshotModel,
    SnapshotNode, SnapshotRelation,
};
pub use element::{
    BaseAttributes, Configuration, ConfigurationVersion, ElementAttributes, ElementKind,
    HasBaseAttributes, HasElementAttributes, Model, Node, Point, Rect, Relation, RelativePosition,
};
pub use value::{AttributeBlock, AttributeValue, StyleMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zoom level all stored coordinates are rebased to.
pub const REFERENCE_ZOOM: i32 = 10;

/// Horizontal gap between models placed side by side.
pub const MODEL_PADDING: i32 = 50;

pub const RESERVED_KEY_ID: &str = "id";
pub const RESERVED_KEY_TAGS: &str = "tags";
pub const RESERVED_KEY_MODEL: &str = "model";
pub const RESERVED_KEY_MODEL_ID: &str = "modelId";
pub const RESERVED_KEY_PPR_TYPE: &str = "pprType";

/// Every reserved key, in serialization order.
pub const RESERVED_KEYS: [&str; 5] = [
    RESERVED_KEY_ID,
    RESERVED_KEY_TAGS,
    RESERVED_KEY_MODEL,
    RESERVED_KEY_MODEL_ID,
    RESERVED_KEY_PPR_TYPE,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DslErrorCode {
    #[default]
    DuplicateId,
    MissingSource,
    UnresolvedSource,
    MissingRequired,
    UnknownModel,
}

impl DslErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateId => "mcm/error/duplicate-id",
            Self::MissingSource => "mcm/error/missing-source",
            Self::UnresolvedSource => "mcm/error/unresolved-source",
            Self::MissingRequired => "mcm/error/missing-required",
            Self::UnknownModel => "mcm/error/unknown-model",
        }
    }
}

/// Fatal failures of a parse or serialization batch. Recoverable line-level
/// problems never surface here; they are logged and skipped.
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum DslError {
    #[error(
        "duplicate {} id `{id}` at input positions {first} and {second}",
        kind.as_str()
    )]
    DuplicateId {
        kind: ElementKind,
        id: String,
        first: usize,
        second: usize,
    },
    #[error("relation at input position {relation} declares no source")]
    MissingSource { relation: usize },
    #[error("relation at input position {relation} names unknown source `{source_id}`")]
    UnresolvedSource { relation: usize, source_id: String },
    #[error("{} is missing required attribute `{key}`", kind.as_str())]
    MissingRequired { kind: ElementKind, key: String },
    #[error("node `{node}` belongs to unknown model `{model}`")]
    UnknownModel { node: String, model: String },
}

impl DslError {
    #[must_use]
    pub const fn code(&self) -> DslErrorCode {
        match self {
            Self::DuplicateId { .. } => DslErrorCode::DuplicateId,
            Self::MissingSource { .. } => DslErrorCode::MissingSource,
            Self::UnresolvedSource { .. } => DslErrorCode::UnresolvedSource,
            Self::MissingRequired { .. } => DslErrorCode::MissingRequired,
            Self::UnknownModel { .. } => DslErrorCode::UnknownModel,
        }
    }

    #[must_use]
    pub fn missing_id(kind: ElementKind) -> Self {
        Self::MissingRequired {
            kind,
            key: RESERVED_KEY_ID.to_string(),
        }
    }
}

pub type DslResult<T> = Result<T, DslError>;

/// How comma-separated attribute values are split into list items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ListSplitting {
    /// Split on every comma, including commas inside quoted items.
    #[default]
    Naive,
    /// Commas inside `"..."` or `` `...` `` items are kept.
    QuoteAware,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub list_splitting: ListSplitting,
    /// Keys whose values are always lists.
    pub listable_keys: Vec<String>,
    pub reference_zoom: i32,
    pub model_padding: i32,
    /// Id given to the implicit model that collects nodes without a `modelId`.
    pub unassigned_model_id: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            list_splitting: ListSplitting::default(),
            listable_keys: vec![RESERVED_KEY_TAGS.to_string()],
            reference_zoom: REFERENCE_ZOOM,
            model_padding: MODEL_PADDING,
            unassigned_model_id: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn is_listable(&self, key: &str) -> bool {
        self.listable_keys.iter().any(|listable| listable == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let error = DslError::UnresolvedSource {
            relation: 0,
            source_id: "5".to_string(),
        };
        assert_eq!(error.code(), DslErrorCode::UnresolvedSource);
        assert_eq!(error.code().as_str(), "mcm/error/unresolved-source");
        assert_eq!(
            DslError::missing_id(ElementKind::Node).code().as_str(),
            "mcm/error/missing-required"
        );
    }

    #[test]
    fn duplicate_id_message_names_both_positions() {
        let error = DslError::DuplicateId {
            kind: ElementKind::Node,
            id: "n1".to_string(),
            first: 0,
            second: 3,
        };
        assert_eq!(
            error.to_string(),
            "duplicate node id `n1` at input positions 0 and 3"
        );
    }

    #[test]
    fn default_config_lists_tags_only() {
        let config = EngineConfig::default();
        assert!(config.is_listable("tags"));
        assert!(!config.is_listable("id"));
        assert_eq!(config.reference_zoom, REFERENCE_ZOOM);
        assert_eq!(config.model_padding, MODEL_PADDING);
        assert_eq!(config.list_splitting, ListSplitting::Naive);
    }

    #[test]
    fn config_deserializes_partial_documents() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"list-splitting":"quote-aware","model-padding":20}"#)
                .expect("parse config");
        assert_eq!(config.list_splitting, ListSplitting::QuoteAware);
        assert_eq!(config.model_padding, 20);
        assert_eq!(config.listable_keys, vec!["tags".to_string()]);
    }
}
