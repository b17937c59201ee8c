//! Binding of reserved attribute keys to typed fields and back.

use mcm_core::{
    AttributeBlock, AttributeValue, BaseAttributes, ElementAttributes, RESERVED_KEY_ID,
    RESERVED_KEY_MODEL, RESERVED_KEY_MODEL_ID, RESERVED_KEY_PPR_TYPE, RESERVED_KEY_TAGS,
};
use tracing::debug;

fn take_string(attributes: &mut AttributeBlock, key: &str) -> Option<String> {
    let (value, _) = attributes.remove(key)?;
    match value {
        AttributeValue::String(value) => Some(value),
        other @ (AttributeValue::Integer(_)
        | AttributeValue::Float(_)
        | AttributeValue::List(_)) => {
            debug!(key, value = %other, "reserved attribute is not a string");
            Some(other.to_plain_string())
        }
    }
}

fn take_list(attributes: &mut AttributeBlock, key: &str) -> Vec<String> {
    attributes
        .remove(key)
        .map(|(value, _)| {
            value
                .into_list()
                .iter()
                .map(AttributeValue::to_plain_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Moves `id` and `tags` out of the attribute block into `target` and stores
/// the remainder as its residual attributes.
#[must_use]
pub fn populate(mut attributes: AttributeBlock, mut target: BaseAttributes) -> BaseAttributes {
    target.id = take_string(&mut attributes, RESERVED_KEY_ID);
    target.tags = take_list(&mut attributes, RESERVED_KEY_TAGS);
    target.attributes = attributes;
    target
}

/// Element variant of [`populate`]; also binds `model`, `modelId` and
/// `pprType`.
#[must_use]
pub fn populate_element(
    mut attributes: AttributeBlock,
    mut target: ElementAttributes,
) -> ElementAttributes {
    target.model = take_string(&mut attributes, RESERVED_KEY_MODEL);
    target.model_id = take_string(&mut attributes, RESERVED_KEY_MODEL_ID);
    target.ppr_type = take_string(&mut attributes, RESERVED_KEY_PPR_TYPE);
    target.base = populate(attributes, target.base);
    target
}

fn insert_string(block: &mut AttributeBlock, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        block.insert(key, value.as_str());
    }
}

fn insert_tags(block: &mut AttributeBlock, tags: &[String]) {
    if !tags.is_empty() {
        block.insert(
            RESERVED_KEY_TAGS,
            tags.iter()
                .map(|tag| AttributeValue::string(tag.as_str()))
                .collect::<Vec<_>>(),
        );
    }
}

fn append_residual(block: &mut AttributeBlock, residual: &AttributeBlock) {
    for (key, value, comment) in residual.iter() {
        block.insert_with_comment(key, value.clone(), comment.map(str::to_string));
    }
    block.body.clone_from(&residual.body);
}

/// Inverse of [`populate`]: `id`, `tags`, then the residual attributes.
#[must_use]
pub fn merge(base: &BaseAttributes) -> AttributeBlock {
    let mut block = AttributeBlock::new();
    insert_string(&mut block, RESERVED_KEY_ID, base.id.as_ref());
    insert_tags(&mut block, &base.tags);
    append_residual(&mut block, &base.attributes);
    block
}

/// Inverse of [`populate_element`]: `id`, `tags`, `model`, `modelId`,
/// `pprType`, then the residual attributes.
#[must_use]
pub fn merge_element(element: &ElementAttributes) -> AttributeBlock {
    let mut block = AttributeBlock::new();
    insert_string(&mut block, RESERVED_KEY_ID, element.base.id.as_ref());
    insert_tags(&mut block, &element.base.tags);
    insert_string(&mut block, RESERVED_KEY_MODEL, element.model.as_ref());
    insert_string(&mut block, RESERVED_KEY_MODEL_ID, element.model_id.as_ref());
    insert_string(&mut block, RESERVED_KEY_PPR_TYPE, element.ppr_type.as_ref());
    append_residual(&mut block, &element.base.attributes);
    block
}
