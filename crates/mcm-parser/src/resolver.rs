//! Rebuilds the node graph from independently stored node and relation
//! texts.

use indexmap::IndexMap;
use mcm_core::{DslError, DslResult, ElementKind, EngineConfig, HasBaseAttributes, Node, Relation};
use tracing::{debug, trace};

use crate::document::{parse_node_with_config, parse_relation_with_config};

/// Resolved nodes in input order, with relations attached to their source,
/// plus the id lookup built while resolving.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedNodes {
    pub nodes: Vec<Node>,
    pub index_by_id: IndexMap<String, usize>,
}

impl ResolvedNodes {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_by_id
            .get(id)
            .and_then(|&index| self.nodes.get(index))
    }

    /// The node a relation points at, when it is part of this batch.
    #[must_use]
    pub fn target_of(&self, relation: &Relation) -> Option<&Node> {
        self.get(relation.target.as_deref()?)
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

pub fn resolve_nodes<N: AsRef<str>, R: AsRef<str>>(
    node_texts: &[N],
    relation_texts: &[R],
) -> DslResult<ResolvedNodes> {
    resolve_nodes_with_config(node_texts, relation_texts, &EngineConfig::default())
}

/// Parses every node, then attaches every relation to its source node in
/// input order. Duplicate node ids, nodes without id and relations without a
/// resolvable source fail the whole batch; unknown targets resolve to `None`.
pub fn resolve_nodes_with_config<N: AsRef<str>, R: AsRef<str>>(
    node_texts: &[N],
    relation_texts: &[R],
    config: &EngineConfig,
) -> DslResult<ResolvedNodes> {
    let mut resolved = ResolvedNodes::default();

    for (position, text) in node_texts.iter().enumerate() {
        let node = parse_node_with_config(text.as_ref(), config);
        let Some(id) = node.id().map(str::to_string) else {
            return Err(DslError::missing_id(ElementKind::Node));
        };
        if let Some(&first) = resolved.index_by_id.get(&id) {
            return Err(DslError::DuplicateId {
                kind: ElementKind::Node,
                id,
                first,
                second: position,
            });
        }
        resolved.index_by_id.insert(id, resolved.nodes.len());
        resolved.nodes.push(node);
    }

    let mut relation_ids: IndexMap<String, usize> = IndexMap::new();
    for (position, text) in relation_texts.iter().enumerate() {
        let document = parse_relation_with_config(text.as_ref(), config);
        let Some(source) = document.source else {
            return Err(DslError::MissingSource { relation: position });
        };
        let Some(&source_index) = resolved.index_by_id.get(&source) else {
            return Err(DslError::UnresolvedSource {
                relation: position,
                source_id: source,
            });
        };
        let mut relation = document.relation;

        if let Some(id) = relation.id().map(str::to_string) {
            if let Some(&first) = relation_ids.get(&id) {
                return Err(DslError::DuplicateId {
                    kind: ElementKind::Relation,
                    id,
                    first,
                    second: position,
                });
            }
            relation_ids.insert(id, position);
        }

        if let Some(target) = relation.target.take() {
            if resolved.index_by_id.contains_key(&target) {
                relation.target = Some(target);
            } else {
                trace!(source = %source, target = %target, "relation target outside batch");
            }
        }
        resolved.nodes[source_index].relations.push(relation);
    }

    debug!(
        nodes = resolved.nodes.len(),
        relations = relation_texts.len(),
        "resolved node batch"
    );
    Ok(resolved)
}
