//! Per-element text documents: one comment-encoded block per model, node
//! or relation.
//!
//! Structural keys (`zoomLevel`, `elementType`, `coordinates`,
//! `additionalAttributes`, `source`, `target`, `points`) are pulled before the
//! reserved keys are bound. Serialization writes reserved keys, structural
//! keys, residual attributes, the title/description body and finally the
//! style lines, in that order.

use mcm_core::{
    AttributeBlock, AttributeValue, BaseAttributes, DslError, DslResult, ElementAttributes,
    ElementKind, EngineConfig, Model, Node, RESERVED_KEYS, Rect, Relation, StyleMap,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::binder::{merge, merge_element, populate, populate_element};
use crate::extract::{
    Extraction, extract_model_with_config, extract_with_config, join_title, split_title,
};

pub const KEY_ZOOM_LEVEL: &str = "zoomLevel";
pub const KEY_ELEMENT_TYPE: &str = "elementType";
pub const KEY_COORDINATES: &str = "coordinates";
pub const KEY_ADDITIONAL_ATTRIBUTES: &str = "additionalAttributes";
pub const KEY_SOURCE: &str = "source";
pub const KEY_TARGET: &str = "target";
pub const KEY_POINTS: &str = "points";

/// A parsed relation together with the id of the node it is attached to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationDocument {
    pub source: Option<String>,
    pub relation: Relation,
}

/// Formats a value for a comment line.
#[must_use]
pub fn format_value(value: &AttributeValue) -> String {
    value.to_string()
}

/// `// key: value`, followed by ` // comment` when there is one.
#[must_use]
pub fn format_attribute_line(key: &str, value: &AttributeValue, comment: Option<&str>) -> String {
    match comment {
        Some(comment) => format!("// {key}: {} // {comment}", format_value(value)),
        None => format!("// {key}: {}", format_value(value)),
    }
}

fn take_plain(attributes: &mut AttributeBlock, key: &str) -> Option<String> {
    attributes
        .remove(key)
        .map(|(value, _)| value.to_plain_string())
}

fn take_integers(attributes: &mut AttributeBlock, key: &str) -> Option<Vec<i64>> {
    attributes.remove(key).map(|(value, _)| value.integers())
}

fn take_rect(attributes: &mut AttributeBlock) -> Rect {
    let Some(values) = take_integers(attributes, KEY_COORDINATES) else {
        return Rect::default();
    };
    let coordinates: Vec<i32> = values
        .into_iter()
        .filter_map(|value| i32::try_from(value).ok())
        .collect();
    match coordinates.as_slice() {
        &[x, y, width, height]
            if x.checked_add(width).is_none() || y.checked_add(height).is_none() =>
        {
            warn!(?coordinates, "coordinates exceed the drawing area");
            Rect::default()
        }
        &[x, y, width, height] => Rect::new(x, y, width, height),
        _ => {
            warn!(?coordinates, "coordinates need exactly four integers");
            Rect::default()
        }
    }
}

fn rect_value(rect: Rect) -> AttributeValue {
    AttributeValue::List(
        [rect.x, rect.y, rect.width, rect.height]
            .into_iter()
            .map(|value| AttributeValue::Integer(i64::from(value)))
            .collect(),
    )
}

fn integers_value(values: &[i64]) -> AttributeValue {
    AttributeValue::List(values.iter().copied().map(AttributeValue::Integer).collect())
}

fn bind_body(mut base: BaseAttributes, text: &str) -> BaseAttributes {
    let (title, description) = split_title(&base.attributes.body);
    base.title = title;
    base.description = description;
    base.original_text = text.to_string();
    base
}

#[must_use]
pub fn parse_model(text: &str) -> Model {
    parse_model_with_config(text, &EngineConfig::default())
}

#[must_use]
pub fn parse_model_with_config(text: &str, config: &EngineConfig) -> Model {
    let mut attributes = extract_model_with_config(text, config);
    let zoom_level = match attributes.remove(KEY_ZOOM_LEVEL) {
        Some((AttributeValue::Integer(zoom), _)) => i32::try_from(zoom).unwrap_or_else(|_| {
            warn!(zoom, "zoom level out of range");
            config.reference_zoom
        }),
        Some((other, _)) => {
            warn!(value = %other, "zoom level is not an integer");
            config.reference_zoom
        }
        None => config.reference_zoom,
    };

    Model {
        attributes: bind_body(populate(attributes, BaseAttributes::default()), text),
        nodes: Vec::new(),
        zoom_level,
    }
}

#[must_use]
pub fn parse_node(text: &str) -> Node {
    parse_node_with_config(text, &EngineConfig::default())
}

#[must_use]
pub fn parse_node_with_config(text: &str, config: &EngineConfig) -> Node {
    let Extraction {
        mut attributes,
        styles,
    } = extract_with_config(text, config);
    let element_type = take_plain(&mut attributes, KEY_ELEMENT_TYPE).unwrap_or_default();
    let position = take_rect(&mut attributes);
    let generated_attributes =
        take_integers(&mut attributes, KEY_ADDITIONAL_ATTRIBUTES).unwrap_or_default();

    let mut element = populate_element(attributes, ElementAttributes::default());
    element.base = bind_body(element.base, text);
    Node {
        attributes: element,
        element_type,
        position,
        styles,
        generated_attributes,
        relations: Vec::new(),
    }
}

#[must_use]
pub fn parse_relation(text: &str) -> RelationDocument {
    parse_relation_with_config(text, &EngineConfig::default())
}

#[must_use]
pub fn parse_relation_with_config(text: &str, config: &EngineConfig) -> RelationDocument {
    let Extraction {
        mut attributes,
        styles,
    } = extract_with_config(text, config);

    let mut relation = Relation::default();
    relation.element_type = take_plain(&mut attributes, KEY_ELEMENT_TYPE).unwrap_or_default();
    relation.position = take_rect(&mut attributes);
    relation.styles = styles;
    let source = take_plain(&mut attributes, KEY_SOURCE);
    relation.target = take_plain(&mut attributes, KEY_TARGET);
    if let Some(points) = take_integers(&mut attributes, KEY_POINTS)
        && !relation.set_points(&points)
    {
        warn!(?points, "relation points rejected");
    }

    let mut element = populate_element(attributes, ElementAttributes::default());
    element.base = bind_body(element.base, text);
    relation.attributes = element;
    RelationDocument { source, relation }
}

struct DocumentWriter {
    out: String,
}

impl DocumentWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn attribute(&mut self, key: &str, value: &AttributeValue, comment: Option<&str>) {
        self.out
            .push_str(&format_attribute_line(key, value, comment));
        self.out.push('\n');
    }

    fn reserved(&mut self, block: &AttributeBlock) {
        for (key, value, comment) in block.iter() {
            if RESERVED_KEYS.contains(&key) {
                self.attribute(key, value, comment);
            }
        }
    }

    fn residual(&mut self, block: &AttributeBlock) {
        for (key, value, comment) in block.iter() {
            if !RESERVED_KEYS.contains(&key) {
                self.attribute(key, value, comment);
            }
        }
    }

    fn body(&mut self, base: &BaseAttributes) {
        self.out
            .push_str(&join_title(&base.title, &base.description));
    }

    fn styles(&mut self, styles: &StyleMap) {
        for (key, value) in styles {
            self.out.push_str(key);
            self.out.push('=');
            self.out.push_str(value);
            self.out.push('\n');
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn element_block(kind: ElementKind, element: &ElementAttributes) -> DslResult<AttributeBlock> {
    if kind != ElementKind::Relation && element.base.id.is_none() {
        return Err(DslError::missing_id(kind));
    }
    Ok(merge_element(element))
}

/// Fails when the model has no id.
pub fn serialize_model(model: &Model) -> DslResult<String> {
    if model.attributes.id.is_none() {
        return Err(DslError::missing_id(ElementKind::Model));
    }
    let block = merge(&model.attributes);
    let mut writer = DocumentWriter::new();
    writer.reserved(&block);
    writer.attribute(
        KEY_ZOOM_LEVEL,
        &AttributeValue::Integer(i64::from(model.zoom_level)),
        None,
    );
    writer.residual(&block);
    writer.body(&model.attributes);
    Ok(writer.finish())
}

/// Fails when the node has no id. Relations are serialized separately.
pub fn serialize_node(node: &Node) -> DslResult<String> {
    let block = element_block(ElementKind::Node, &node.attributes)?;
    let mut writer = DocumentWriter::new();
    writer.reserved(&block);
    if !node.element_type.is_empty() {
        writer.attribute(
            KEY_ELEMENT_TYPE,
            &AttributeValue::string(node.element_type.as_str()),
            None,
        );
    }
    writer.attribute(KEY_COORDINATES, &rect_value(node.position), None);
    if !node.generated_attributes.is_empty() {
        writer.attribute(
            KEY_ADDITIONAL_ATTRIBUTES,
            &integers_value(&node.generated_attributes),
            None,
        );
    }
    writer.residual(&block);
    writer.body(&node.attributes.base);
    writer.styles(&node.styles);
    Ok(writer.finish())
}

/// Relations may lack an id; the source id is always written.
pub fn serialize_relation(relation: &Relation, source: &str) -> DslResult<String> {
    let block = element_block(ElementKind::Relation, &relation.attributes)?;
    let mut writer = DocumentWriter::new();
    writer.reserved(&block);
    if !relation.element_type.is_empty() {
        writer.attribute(
            KEY_ELEMENT_TYPE,
            &AttributeValue::string(relation.element_type.as_str()),
            None,
        );
    }
    writer.attribute(KEY_COORDINATES, &rect_value(relation.position), None);
    writer.attribute(KEY_SOURCE, &AttributeValue::string(source), None);
    if let Some(target) = &relation.target {
        writer.attribute(KEY_TARGET, &AttributeValue::string(target.as_str()), None);
    }
    writer.attribute(
        KEY_POINTS,
        &integers_value(&relation.generated_attributes()),
        None,
    );
    writer.residual(&block);
    writer.body(&relation.attributes.base);
    writer.styles(&relation.styles);
    Ok(writer.finish())
}
