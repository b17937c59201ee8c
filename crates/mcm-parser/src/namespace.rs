//! Multi-model namespacing: several models' private attributes carried as
//! `// __<modelId>_<attr>: <value>` lines inside one shared super-model text.

use chumsky::prelude::*;
use indexmap::IndexMap;
use mcm_core::{
    AttributeBlock, AttributeValue, BaseAttributes, Configuration, EngineConfig,
    HasBaseAttributes, Model, Node,
};
use mcm_layout::{
    align_models_with_config, denormalize_model_with_config, export_zoom_level,
    normalize_model_with_config,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::binder::{merge, populate};
use crate::coerce::{coerce, parse_value};
use crate::document::format_attribute_line;
use crate::extract::{extract_model_with_config, split_inline_comment};

pub const KEY_CONFIGURATION_ID: &str = "configurationId";
pub const KEY_TITLE: &str = "title";
pub const MODEL_ATTRIBUTES_SEPARATOR: &str = "--Attributes from models--";

const NAMESPACE_PREFIX: &str = "__";

/// A matched `// __<modelId>_<attr>: <value>` line. `value` still carries a
/// trailing inline comment, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespacedLine<'a> {
    pub model_id: &'a str,
    pub attribute: &'a str,
    pub value: &'a str,
}

fn namespaced_line_parser<'a>()
-> impl Parser<'a, &'a str, NamespacedLine<'a>, extra::Err<Rich<'a, char>>> {
    let inline_ws = any().filter(|c: &char| c.is_whitespace()).repeated();

    // [A-Za-z0-9][A-Za-z0-9-]*
    let model_id = any()
        .filter(|c: &char| c.is_ascii_alphanumeric())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '-')
                .repeated(),
        )
        .to_slice();

    // [A-Za-z][A-Za-z0-9]*
    let attribute = any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(any().filter(|c: &char| c.is_ascii_alphanumeric()).repeated())
        .to_slice();

    just("//")
        .ignore_then(inline_ws.clone())
        .ignore_then(just(NAMESPACE_PREFIX))
        .ignore_then(model_id)
        .then_ignore(just('_'))
        .then(attribute)
        .then_ignore(inline_ws)
        .then_ignore(just(':'))
        .then(any().repeated().to_slice())
        .then_ignore(end())
        .map(|((model_id, attribute), value)| NamespacedLine {
            model_id,
            attribute,
            value,
        })
}

/// Matches one line against the namespacing convention. Ordinary attribute
/// lines and anything else yield `None`.
#[must_use]
pub fn match_namespaced_line(line: &str) -> Option<NamespacedLine<'_>> {
    namespaced_line_parser().parse(line).into_result().ok()
}

/// Whether a model id fits the `[A-Za-z0-9][A-Za-z0-9-]*` namespace prefix.
#[must_use]
pub fn is_namespaceable_model_id(model_id: &str) -> bool {
    let mut chars = model_id.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Whether a key can be carried through a namespaced line.
#[must_use]
pub fn is_namespaceable_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

#[must_use]
pub fn extract_namespaced_attributes(text: &str) -> IndexMap<String, AttributeBlock> {
    extract_namespaced_attributes_with_config(text, &EngineConfig::default())
}

/// Groups every namespaced line by model id, coercing the values.
#[must_use]
pub fn extract_namespaced_attributes_with_config(
    text: &str,
    config: &EngineConfig,
) -> IndexMap<String, AttributeBlock> {
    let mut models: IndexMap<String, AttributeBlock> = IndexMap::new();
    for line in text.lines() {
        let Some(matched) = match_namespaced_line(line) else {
            continue;
        };
        let (value, comment) = split_inline_comment(matched.value);
        let value = value.trim();
        if value.is_empty() {
            warn!(
                model = matched.model_id,
                key = matched.attribute,
                "namespaced attribute has no value"
            );
            continue;
        }
        // Titles are free text and never split into a list.
        let value = if matched.attribute == KEY_TITLE {
            coerce(value)
        } else {
            parse_value(matched.attribute, value, config)
        };
        models
            .entry(matched.model_id.to_string())
            .or_default()
            .insert_with_comment(matched.attribute, value, comment);
    }
    models
}

/// Namespaced lines for one model: its title, then its reserved and residual
/// attributes. Models without an id, or with an id the import side cannot
/// match, produce nothing.
#[must_use]
pub fn namespace_model_lines(model: &Model) -> String {
    let Some(model_id) = model.id() else {
        return String::new();
    };
    if !is_namespaceable_model_id(model_id) {
        warn!(
            model = model_id,
            "model id cannot be namespaced, its attributes are not exported"
        );
        return String::new();
    }

    let mut out = String::new();
    let mut push = |key: &str, value: &AttributeValue, comment: Option<&str>| {
        if !is_namespaceable_key(key) {
            warn!(model = model_id, key, "attribute key cannot be namespaced");
            return;
        }
        out.push_str(&format_attribute_line(
            &format!("{NAMESPACE_PREFIX}{model_id}_{key}"),
            value,
            comment,
        ));
        out.push('\n');
    };

    push(
        KEY_TITLE,
        &AttributeValue::string(model.attributes.title.as_str()),
        None,
    );
    for (key, value, comment) in merge(&model.attributes).iter() {
        push(key, value, comment);
    }
    out
}

/// One drawing holding every node of a configuration, with the models'
/// attributes namespaced into its text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuperModel {
    pub text: String,
    pub zoom_level: i32,
    pub nodes: Vec<Node>,
}

#[must_use]
pub fn export_configuration(configuration: &Configuration) -> SuperModel {
    export_configuration_with_config(configuration, &EngineConfig::default())
}

/// Rescales every model to the smallest zoom level among them, moves
/// overlapping models apart and flattens their nodes into one super-model.
/// Nodes without a `modelId` take their model's id.
#[must_use]
pub fn export_configuration_with_config(
    configuration: &Configuration,
    config: &EngineConfig,
) -> SuperModel {
    let zoom_level = if configuration.models.is_empty() {
        config.reference_zoom
    } else {
        export_zoom_level(&configuration.models)
    };

    let mut models = configuration.models.clone();
    for model in &mut models {
        denormalize_model_with_config(model, zoom_level, config);
    }
    align_models_with_config(&mut models, config);

    let mut text = format!(
        "Configuration {name} exported from MCM\n{}\n{MODEL_ATTRIBUTES_SEPARATOR}\n",
        format_attribute_line(
            KEY_CONFIGURATION_ID,
            &AttributeValue::string(configuration.name.as_str()),
            None
        ),
        name = configuration.name,
    );
    let mut nodes = Vec::new();
    for model in models {
        text.push_str(&namespace_model_lines(&model));
        let model_id = model.attributes.id;
        for mut node in model.nodes {
            if node.attributes.model_id.is_none() {
                node.attributes.model_id.clone_from(&model_id);
            }
            nodes.push(node);
        }
    }

    debug!(
        models = configuration.models.len(),
        nodes = nodes.len(),
        zoom_level,
        "exported configuration"
    );
    SuperModel {
        text,
        zoom_level,
        nodes,
    }
}

#[must_use]
pub fn import_configuration(super_model: &SuperModel) -> Configuration {
    import_configuration_with_config(super_model, &EngineConfig::default())
}

/// Splits a super-model back into models. Nodes are grouped by `modelId`
/// and rescaled to the reference zoom; nodes without one land in an implicit
/// unassigned model that comes first.
#[must_use]
pub fn import_configuration_with_config(
    super_model: &SuperModel,
    config: &EngineConfig,
) -> Configuration {
    let own_attributes = extract_model_with_config(&super_model.text, config);
    let name = own_attributes
        .get(KEY_CONFIGURATION_ID)
        .map(AttributeValue::to_plain_string)
        .unwrap_or_default();

    let mut models: Vec<Model> = Vec::new();
    let mut index_by_id: IndexMap<String, usize> = IndexMap::new();
    for (model_id, mut block) in extract_namespaced_attributes_with_config(&super_model.text, config)
    {
        let title = block
            .remove(KEY_TITLE)
            .map(|(value, _)| value.to_plain_string())
            .unwrap_or_default();
        let mut attributes = populate(block, BaseAttributes::default());
        attributes.title = title;
        if attributes.id.is_none() {
            attributes.id = Some(model_id.clone());
        }
        index_by_id.insert(model_id, models.len());
        models.push(Model {
            attributes,
            nodes: Vec::new(),
            zoom_level: super_model.zoom_level,
        });
    }

    let mut unassigned = Model {
        zoom_level: super_model.zoom_level,
        ..Model::default()
    };
    unassigned.attributes.id.clone_from(&config.unassigned_model_id);
    for node in &super_model.nodes {
        let Some(model_id) = node.attributes.model_id.as_deref() else {
            unassigned.nodes.push(node.clone());
            continue;
        };
        let index = match index_by_id.get(model_id) {
            Some(&index) => index,
            None => {
                debug!(model = model_id, "node names a model without attributes");
                index_by_id.insert(model_id.to_string(), models.len());
                models.push(Model::with_id(model_id, super_model.zoom_level));
                models.len() - 1
            }
        };
        models[index].nodes.push(node.clone());
    }

    if !unassigned.nodes.is_empty() {
        models.insert(0, unassigned);
    }
    for model in &mut models {
        normalize_model_with_config(model, config);
    }

    debug!(models = models.len(), name = %name, "imported configuration");
    Configuration {
        name,
        version: None,
        models,
    }
}
