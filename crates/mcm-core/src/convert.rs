//! Identity-preserving conversion between the id-linked [`Configuration`]
//! and the index-linked [`GraphSnapshot`].
//!
//! Relations may form cycles (`A -> B -> A`). Every top-level conversion owns
//! one [`ConversionContext`]; a source object is looked up before its children
//! are visited and recorded as soon as its target slot is allocated, so a
//! re-entrant visit returns the slot instead of recursing again.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::element::{
    BaseAttributes, Configuration, ConfigurationVersion, ElementAttributes, HasBaseAttributes,
    Model, Node, Rect, Relation,
};
use crate::value::StyleMap;

/// Memo table from a stable source key to the already produced target.
#[derive(Debug, Clone)]
pub struct ConversionContext<K, T> {
    known: FxHashMap<K, T>,
}

impl<K: Eq + Hash, T: Copy> ConversionContext<K, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            known: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn mapped(&self, source: &K) -> Option<T> {
        self.known.get(source).copied()
    }

    pub fn store(&mut self, source: K, target: T) {
        self.known.insert(source, target);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl<K: Eq + Hash, T: Copy> Default for ConversionContext<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Arena position of a node inside a [`Configuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeLocation {
    pub model: usize,
    pub node: usize,
}

/// Eagerly built id lookup over every node of a configuration. The first node
/// carrying an id wins.
#[derive(Debug, Clone, Default)]
pub struct NodeLookup {
    by_id: FxHashMap<String, NodeLocation>,
}

impl NodeLookup {
    #[must_use]
    pub fn build(configuration: &Configuration) -> Self {
        let mut by_id = FxHashMap::default();
        for (model_index, model) in configuration.models.iter().enumerate() {
            for (node_index, node) in model.nodes.iter().enumerate() {
                if let Some(id) = node.id() {
                    by_id.entry(id.to_string()).or_insert(NodeLocation {
                        model: model_index,
                        node: node_index,
                    });
                }
            }
        }
        Self { by_id }
    }

    #[must_use]
    pub fn locate(&self, id: &str) -> Option<NodeLocation> {
        self.by_id.get(id).copied()
    }

    #[must_use]
    pub fn resolve<'c>(&self, configuration: &'c Configuration, id: &str) -> Option<&'c Node> {
        let location = self.locate(id)?;
        configuration
            .models
            .get(location.model)?
            .nodes
            .get(location.node)
    }

    /// Target node of a relation, if it is part of this configuration.
    #[must_use]
    pub fn target_of<'c>(
        &self,
        configuration: &'c Configuration,
        relation: &Relation,
    ) -> Option<&'c Node> {
        self.resolve(configuration, relation.target.as_deref()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SnapshotIndex(pub usize);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotRelation {
    pub attributes: ElementAttributes,
    pub element_type: String,
    pub position: Rect,
    pub styles: StyleMap,
    pub points: Vec<i64>,
    pub target: Option<SnapshotIndex>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub attributes: ElementAttributes,
    pub element_type: String,
    pub position: Rect,
    pub styles: StyleMap,
    pub generated_attributes: Vec<i64>,
    pub relations: Vec<SnapshotRelation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotModel {
    pub attributes: BaseAttributes,
    pub zoom_level: i32,
    pub nodes: Vec<SnapshotIndex>,
}

/// Flat, index-linked form of a configuration. Relations point at node slots
/// by index, so the structure can cross a persistence or API boundary as is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub name: String,
    pub version: Option<ConfigurationVersion>,
    pub models: Vec<SnapshotModel>,
    pub nodes: Vec<SnapshotNode>,
}

impl GraphSnapshot {
    #[must_use]
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let mut builder = SnapshotBuilder {
            configuration,
            lookup: NodeLookup::build(configuration),
            context: ConversionContext::new(),
            nodes: Vec::new(),
            pending: Vec::new(),
        };

        let models = configuration
            .models
            .iter()
            .enumerate()
            .map(|(model_index, model)| {
                let nodes = (0..model.nodes.len())
                    .map(|node_index| {
                        builder.convert_node(NodeLocation {
                            model: model_index,
                            node: node_index,
                        })
                    })
                    .collect();
                SnapshotModel {
                    attributes: model.attributes.clone(),
                    zoom_level: model.zoom_level,
                    nodes,
                }
            })
            .collect();

        Self {
            name: configuration.name.clone(),
            version: configuration.version.clone(),
            models,
            nodes: builder.nodes,
        }
    }

    #[must_use]
    pub fn node(&self, index: SnapshotIndex) -> Option<&SnapshotNode> {
        self.nodes.get(index.0)
    }

    /// Rebuilds the id-linked configuration. A slot listed by several models
    /// is materialized once, in the first model that lists it.
    #[must_use]
    pub fn to_configuration(&self) -> Configuration {
        let mut context: ConversionContext<SnapshotIndex, NodeLocation> = ConversionContext::new();
        let mut models: Vec<Model> = Vec::with_capacity(self.models.len());

        for (model_index, snapshot_model) in self.models.iter().enumerate() {
            let mut model = Model {
                attributes: snapshot_model.attributes.clone(),
                nodes: Vec::with_capacity(snapshot_model.nodes.len()),
                zoom_level: snapshot_model.zoom_level,
            };
            for &index in &snapshot_model.nodes {
                if context.mapped(&index).is_some() {
                    continue;
                }
                let Some(snapshot_node) = self.node(index) else {
                    continue;
                };
                context.store(
                    index,
                    NodeLocation {
                        model: model_index,
                        node: model.nodes.len(),
                    },
                );
                model.nodes.push(self.restore_node(snapshot_node));
            }
            models.push(model);
        }

        Configuration {
            name: self.name.clone(),
            version: self.version.clone(),
            models,
        }
    }

    fn restore_node(&self, snapshot_node: &SnapshotNode) -> Node {
        let relations = snapshot_node
            .relations
            .iter()
            .map(|snapshot_relation| {
                let mut relation = Relation::default();
                relation.attributes = snapshot_relation.attributes.clone();
                relation.element_type = snapshot_relation.element_type.clone();
                relation.position = snapshot_relation.position;
                relation.styles = snapshot_relation.styles.clone();
                if !relation.set_points(&snapshot_relation.points) {
                    warn!(
                        points = ?snapshot_relation.points,
                        "snapshot relation points rejected"
                    );
                }
                relation.target = snapshot_relation
                    .target
                    .and_then(|target| self.node(target))
                    .and_then(|target| target.attributes.base.id.clone());
                relation
            })
            .collect();

        Node {
            attributes: snapshot_node.attributes.clone(),
            element_type: snapshot_node.element_type.clone(),
            position: snapshot_node.position,
            styles: snapshot_node.styles.clone(),
            generated_attributes: snapshot_node.generated_attributes.clone(),
            relations,
        }
    }
}

struct SnapshotBuilder<'a> {
    configuration: &'a Configuration,
    lookup: NodeLookup,
    context: ConversionContext<NodeLocation, SnapshotIndex>,
    nodes: Vec<SnapshotNode>,
    /// Slots allocated but whose relations are not filled in yet.
    pending: Vec<(NodeLocation, SnapshotIndex)>,
}

impl SnapshotBuilder<'_> {
    /// Converts the node and everything reachable from it. Chains of any
    /// length are walked with an explicit worklist instead of recursion.
    fn convert_node(&mut self, location: NodeLocation) -> SnapshotIndex {
        let index = self.slot_for(location);
        while let Some((pending, slot)) = self.pending.pop() {
            self.fill_relations(pending, slot);
        }
        index
    }

    /// Returns the memoized slot, or allocates one and queues it.
    fn slot_for(&mut self, location: NodeLocation) -> SnapshotIndex {
        if let Some(existing) = self.context.mapped(&location) {
            return existing;
        }

        let configuration = self.configuration;
        let node = &configuration.models[location.model].nodes[location.node];
        let index = SnapshotIndex(self.nodes.len());
        self.nodes.push(SnapshotNode {
            attributes: node.attributes.clone(),
            element_type: node.element_type.clone(),
            position: node.position,
            styles: node.styles.clone(),
            generated_attributes: node.generated_attributes.clone(),
            relations: Vec::new(),
        });
        self.context.store(location, index);
        self.pending.push((location, index));
        index
    }

    fn fill_relations(&mut self, location: NodeLocation, index: SnapshotIndex) {
        let configuration = self.configuration;
        let node = &configuration.models[location.model].nodes[location.node];
        let mut relations = Vec::with_capacity(node.relations.len());
        for relation in &node.relations {
            let target = relation
                .target
                .as_deref()
                .and_then(|id| self.lookup.locate(id))
                .map(|target| self.slot_for(target));
            relations.push(SnapshotRelation {
                attributes: relation.attributes.clone(),
                element_type: relation.element_type.clone(),
                position: relation.position,
                styles: relation.styles.clone(),
                points: relation.generated_attributes(),
                target,
            });
        }
        self.nodes[index.0].relations = relations;
    }
}
