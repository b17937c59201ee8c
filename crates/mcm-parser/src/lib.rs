#![forbid(unsafe_code)]

mod binder;
mod coerce;
mod document;
mod extract;
mod lexer;
mod namespace;
mod resolver;

pub use binder::{merge, merge_element, populate, populate_element};
pub use coerce::{coerce, parse_value, split_list};
pub use document::{
    KEY_ADDITIONAL_ATTRIBUTES, KEY_COORDINATES, KEY_ELEMENT_TYPE, KEY_POINTS, KEY_SOURCE,
    KEY_TARGET, KEY_ZOOM_LEVEL, RelationDocument, format_attribute_line, format_value,
    parse_model, parse_model_with_config, parse_node, parse_node_with_config, parse_relation,
    parse_relation_with_config, serialize_model, serialize_node, serialize_relation,
};
pub use extract::{
    Extraction, TITLE_SEPARATOR, extract, extract_attributes_from_comments, extract_model,
    extract_model_with_config, extract_with_config, join_title, split_title,
};
pub use lexer::{LineKind, Lexer, classify_line, lex};
pub use namespace::{
    KEY_CONFIGURATION_ID, KEY_TITLE, MODEL_ATTRIBUTES_SEPARATOR, NamespacedLine, SuperModel,
    export_configuration, export_configuration_with_config, extract_namespaced_attributes,
    extract_namespaced_attributes_with_config, import_configuration,
    import_configuration_with_config, is_namespaceable_key, is_namespaceable_model_id,
    match_namespaced_line, namespace_model_lines,
};
pub use resolver::{ResolvedNodes, resolve_nodes, resolve_nodes_with_config};

use indexmap::IndexMap;
use mcm_core::{
    Configuration, ConfigurationVersion, DslError, DslResult, ElementKind, EngineConfig,
    HasBaseAttributes, Model,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The stored texts of one configuration: one block per model, node and
/// relation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigurationContents {
    pub models: Vec<String>,
    pub nodes: Vec<String>,
    pub relations: Vec<String>,
}

pub fn parse_configuration<M: AsRef<str>, N: AsRef<str>, R: AsRef<str>>(
    model_texts: &[M],
    node_texts: &[N],
    relation_texts: &[R],
    name: &str,
    version: Option<ConfigurationVersion>,
) -> DslResult<Configuration> {
    parse_configuration_with_config(
        model_texts,
        node_texts,
        relation_texts,
        name,
        version,
        &EngineConfig::default(),
    )
}

/// Parses models, resolves nodes and relations as one batch and assigns
/// every node to the model its `modelId` names. Nodes without a `modelId`
/// are collected in an implicit unassigned model placed first.
pub fn parse_configuration_with_config<M: AsRef<str>, N: AsRef<str>, R: AsRef<str>>(
    model_texts: &[M],
    node_texts: &[N],
    relation_texts: &[R],
    name: &str,
    version: Option<ConfigurationVersion>,
    config: &EngineConfig,
) -> DslResult<Configuration> {
    let mut models: Vec<Model> = Vec::with_capacity(model_texts.len());
    let mut model_index: IndexMap<String, usize> = IndexMap::new();
    for (position, text) in model_texts.iter().enumerate() {
        let model = parse_model_with_config(text.as_ref(), config);
        let Some(id) = model.id().map(str::to_string) else {
            return Err(DslError::missing_id(ElementKind::Model));
        };
        if let Some(&first) = model_index.get(&id) {
            return Err(DslError::DuplicateId {
                kind: ElementKind::Model,
                id,
                first,
                second: position,
            });
        }
        model_index.insert(id, models.len());
        models.push(model);
    }

    let resolved = resolve_nodes_with_config(node_texts, relation_texts, config)?;
    let mut unassigned = Model {
        zoom_level: config.reference_zoom,
        ..Model::default()
    };
    unassigned.attributes.id.clone_from(&config.unassigned_model_id);

    for node in resolved.into_nodes() {
        let Some(model_id) = node.attributes.model_id.as_deref() else {
            unassigned.nodes.push(node);
            continue;
        };
        let Some(&index) = model_index.get(model_id) else {
            return Err(DslError::UnknownModel {
                node: node.id().unwrap_or_default().to_string(),
                model: model_id.to_string(),
            });
        };
        models[index].nodes.push(node);
    }
    if !unassigned.nodes.is_empty() {
        models.insert(0, unassigned);
    }

    debug!(
        models = models.len(),
        nodes = node_texts.len(),
        relations = relation_texts.len(),
        "parsed configuration"
    );
    Ok(Configuration {
        name: name.to_string(),
        version,
        models,
    })
}

/// Writes every model, node and relation of a configuration. Nodes without
/// a `modelId` inherit their model's id and relations without one inherit
/// their source node's. The graph itself is not modified.
pub fn serialize_configuration(configuration: &Configuration) -> DslResult<ConfigurationContents> {
    let mut contents = ConfigurationContents::default();
    for model in &configuration.models {
        if model.id().is_some() {
            contents.models.push(serialize_model(model)?);
        }

        for node in &model.nodes {
            let mut node = node.clone();
            if node.attributes.model_id.is_none() {
                node.attributes.model_id.clone_from(&model.attributes.id);
            }
            let relations = std::mem::take(&mut node.relations);
            contents.nodes.push(serialize_node(&node)?);

            let source = node.id().unwrap_or_default();
            for mut relation in relations {
                if relation.attributes.model_id.is_none() {
                    relation
                        .attributes
                        .model_id
                        .clone_from(&node.attributes.model_id);
                }
                contents
                    .relations
                    .push(serialize_relation(&relation, source)?);
            }
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcm_core::{DslErrorCode, GraphSnapshot, Node, Rect, Relation};

    fn sample_configuration() -> Configuration {
        let mut a = Node::with_id("a");
        a.position = Rect::new(0, 0, 40, 20);
        a.attributes.base.title = "Press".to_string();
        let mut to_b = Relation::to_target("b");
        to_b.position = Rect::new(40, 10, 60, 1);
        a.relations.push(to_b);

        let mut b = Node::with_id("b");
        b.position = Rect::new(100, 0, 40, 20);
        b.relations.push(Relation::to_target("a"));

        let mut model = Model::with_id("m1", 10);
        model.attributes.title = "Line".to_string();
        model.nodes = vec![a, b];

        let mut configuration = Configuration::new("plant");
        configuration.models.push(model);
        configuration
    }

    #[test]
    fn configuration_roundtrips_through_texts() {
        let configuration = sample_configuration();
        let contents = serialize_configuration(&configuration).expect("serializable");
        assert_eq!(contents.models.len(), 1);
        assert_eq!(contents.nodes.len(), 2);
        assert_eq!(contents.relations.len(), 2);

        let parsed = parse_configuration(
            &contents.models,
            &contents.nodes,
            &contents.relations,
            "plant",
            None,
        )
        .expect("parsable");
        assert_eq!(parsed.models.len(), 1);
        let model = &parsed.models[0];
        assert_eq!(model.id(), Some("m1"));
        assert_eq!(model.attributes.title, "Line");
        let a = model.find_node("a").expect("node a");
        assert_eq!(a.attributes.base.title, "Press");
        assert_eq!(a.attributes.model_id.as_deref(), Some("m1"));
        assert_eq!(a.relations[0].target.as_deref(), Some("b"));
        assert_eq!(a.relations[0].position, Rect::new(40, 10, 60, 1));
        assert_eq!(
            a.relations[0].attributes.model_id.as_deref(),
            Some("m1")
        );
    }

    #[test]
    fn serialization_does_not_touch_the_graph() {
        let configuration = sample_configuration();
        let before = configuration.clone();
        serialize_configuration(&configuration).expect("serializable");
        assert_eq!(configuration, before);
    }

    #[test]
    fn node_without_id_blocks_serialization() {
        let mut configuration = sample_configuration();
        configuration.models[0].nodes.push(Node::default());
        let error = serialize_configuration(&configuration).expect_err("id required");
        assert_eq!(error, DslError::missing_id(ElementKind::Node));
    }

    #[test]
    fn duplicate_model_ids_fail_the_batch() {
        let error = parse_configuration(
            &["// id: \"m\"\n", "// id: \"m\"\n"],
            &[] as &[&str],
            &[] as &[&str],
            "c",
            None,
        )
        .expect_err("duplicate model");
        assert_eq!(
            error,
            DslError::DuplicateId {
                kind: ElementKind::Model,
                id: "m".to_string(),
                first: 0,
                second: 1,
            }
        );
    }

    #[test]
    fn node_naming_unknown_model_fails() {
        let error = parse_configuration(
            &["// id: \"m\"\n"],
            &["// id: \"n\"\n// modelId: \"other\"\n"],
            &[] as &[&str],
            "c",
            None,
        )
        .expect_err("unknown model");
        assert_eq!(error.code(), DslErrorCode::UnknownModel);
    }

    #[test]
    fn nodes_without_model_are_collected_first() {
        let parsed = parse_configuration(
            &["// id: \"m\"\n"],
            &["// id: \"loose\"\n"],
            &[] as &[&str],
            "c",
            Some(ConfigurationVersion {
                hash: "abc".to_string(),
                name: "v1".to_string(),
                custom_name: None,
            }),
        )
        .expect("parsable");
        assert_eq!(parsed.models.len(), 2);
        assert_eq!(parsed.models[0].id(), None);
        assert_eq!(parsed.models[0].nodes[0].id(), Some("loose"));
        assert_eq!(parsed.version.map(|version| version.name), Some("v1".to_string()));
    }

    #[test]
    fn parsed_cycle_converts_to_snapshot() {
        let configuration = sample_configuration();
        let contents = serialize_configuration(&configuration).expect("serializable");
        let parsed = parse_configuration(
            &contents.models,
            &contents.nodes,
            &contents.relations,
            "plant",
            None,
        )
        .expect("parsable");

        let snapshot = GraphSnapshot::from_configuration(&parsed);
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.to_configuration(), parsed);
    }
}
