use serde::{Deserialize, Serialize};

use crate::value::{AttributeBlock, StyleMap};

/// Axis-aligned rectangle in diagram coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "w")]
    pub width: i32,
    #[serde(rename = "h")]
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right(self) -> i32 {
        self.x.saturating_add(self.width)
    }

    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Edges saturate at `i32::MAX`. Touching edges do not count as an
    /// overlap.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A point stored as an offset from the owning relation's top-left corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct RelativePosition {
    pub offset_x: i32,
    pub offset_y: i32,
}

impl RelativePosition {
    #[must_use]
    pub const fn new(offset_x: i32, offset_y: i32) -> Self {
        Self { offset_x, offset_y }
    }

    #[must_use]
    pub const fn resolve(self, origin: Rect) -> Point {
        Point {
            x: origin.x.saturating_add(self.offset_x),
            y: origin.y.saturating_add(self.offset_y),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ElementKind {
    Model,
    #[default]
    Node,
    Relation,
}

impl ElementKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Node => "node",
            Self::Relation => "relation",
        }
    }
}

/// Fields shared by models, nodes and relations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseAttributes {
    pub id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Verbatim text the element was parsed from.
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Residual attributes after the reserved keys were bound.
    #[serde(default)]
    pub attributes: AttributeBlock,
}

/// Fields shared by nodes and relations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementAttributes {
    #[serde(flatten)]
    pub base: BaseAttributes,
    pub model: Option<String>,
    pub model_id: Option<String>,
    pub ppr_type: Option<String>,
}

pub trait HasBaseAttributes {
    fn base(&self) -> &BaseAttributes;
    fn base_mut(&mut self) -> &mut BaseAttributes;

    fn id(&self) -> Option<&str> {
        self.base().id.as_deref()
    }
}

pub trait HasElementAttributes: HasBaseAttributes {
    fn element(&self) -> &ElementAttributes;
    fn element_mut(&mut self) -> &mut ElementAttributes;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub attributes: ElementAttributes,
    #[serde(default)]
    pub element_type: String,
    #[serde(default)]
    pub position: Rect,
    #[serde(default)]
    pub styles: StyleMap,
    #[serde(default)]
    pub generated_attributes: Vec<i64>,
    /// Outgoing relations; this node is their source.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Node {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut node = Self::default();
        node.attributes.base.id = Some(id.into());
        node
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relation {
    #[serde(flatten)]
    pub attributes: ElementAttributes,
    #[serde(default)]
    pub element_type: String,
    #[serde(default)]
    pub position: Rect,
    #[serde(default)]
    pub styles: StyleMap,
    /// Id of the target node. Never an owning handle; resolve it through the
    /// containing graph's lookup.
    pub target: Option<String>,
    #[serde(default)]
    relative_start: RelativePosition,
    #[serde(default)]
    relative_mid_points: Vec<RelativePosition>,
    #[serde(default)]
    relative_end: RelativePosition,
}

impl Relation {
    #[must_use]
    pub fn to_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn relative_start(&self) -> RelativePosition {
        self.relative_start
    }

    #[must_use]
    pub fn relative_mid_points(&self) -> &[RelativePosition] {
        &self.relative_mid_points
    }

    #[must_use]
    pub const fn relative_end(&self) -> RelativePosition {
        self.relative_end
    }

    #[must_use]
    pub const fn start_point(&self) -> Point {
        self.relative_start.resolve(self.position)
    }

    #[must_use]
    pub const fn end_point(&self) -> Point {
        self.relative_end.resolve(self.position)
    }

    /// Sets the line points from a flat offset list: start pair, mid pairs,
    /// end pair. Lists shorter than two points or of odd length are rejected
    /// and leave the relation unchanged.
    pub fn set_points(&mut self, offsets: &[i64]) -> bool {
        if offsets.len() < 4 || offsets.len() % 2 != 0 {
            return false;
        }
        let mut pairs = Vec::with_capacity(offsets.len() / 2);
        for pair in offsets.chunks_exact(2) {
            let (Ok(x), Ok(y)) = (i32::try_from(pair[0]), i32::try_from(pair[1])) else {
                return false;
            };
            pairs.push(RelativePosition::new(x, y));
        }

        let last = pairs.len() - 1;
        self.relative_start = pairs[0];
        self.relative_end = pairs[last];
        self.relative_mid_points = pairs[1..last].to_vec();
        true
    }

    /// Inverse of [`Relation::set_points`].
    #[must_use]
    pub fn generated_attributes(&self) -> Vec<i64> {
        std::iter::once(self.relative_start)
            .chain(self.relative_mid_points.iter().copied())
            .chain(std::iter::once(self.relative_end))
            .flat_map(|point| [i64::from(point.offset_x), i64::from(point.offset_y)])
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(flatten)]
    pub attributes: BaseAttributes,
    #[serde(default)]
    pub nodes: Vec<Node>,
    pub zoom_level: i32,
}

impl Model {
    #[must_use]
    pub fn with_id(id: impl Into<String>, zoom_level: i32) -> Self {
        let mut model = Self {
            zoom_level,
            ..Self::default()
        };
        model.attributes.id = Some(id.into());
        model
    }

    #[must_use]
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == Some(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigurationVersion {
    /// Hash of the stored revision.
    pub hash: String,
    pub name: String,
    pub custom_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub version: Option<ConfigurationVersion>,
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Configuration {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Every node with the model that owns it.
    pub fn nodes(&self) -> impl Iterator<Item = (&Node, &Model)> {
        self.models
            .iter()
            .flat_map(|model| model.nodes.iter().map(move |node| (node, model)))
    }

    /// Every relation with its source node.
    pub fn relations(&self) -> impl Iterator<Item = (&Relation, &Node)> {
        self.nodes()
            .flat_map(|(node, _)| node.relations.iter().map(move |relation| (relation, node)))
    }
}

impl HasBaseAttributes for Model {
    fn base(&self) -> &BaseAttributes {
        &self.attributes
    }

    fn base_mut(&mut self) -> &mut BaseAttributes {
        &mut self.attributes
    }
}

macro_rules! impl_element_attributes {
    ($($ty:ty),+) => {
        $(
            impl HasBaseAttributes for $ty {
                fn base(&self) -> &BaseAttributes {
                    &self.attributes.base
                }

                fn base_mut(&mut self) -> &mut BaseAttributes {
                    &mut self.attributes.base
                }
            }

            impl HasElementAttributes for $ty {
                fn element(&self) -> &ElementAttributes {
                    &self.attributes
                }

                fn element_mut(&mut self) -> &mut ElementAttributes {
                    &mut self.attributes
                }
            }
        )+
    };
}

impl_element_attributes!(Node, Relation);
