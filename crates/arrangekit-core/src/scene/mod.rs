//! Host scene graph abstraction.
//!
//! The arrangement pipeline never owns canvas objects. It reads and writes
//! them through the narrow [`SceneGraph`] capability so the same core can sit
//! on top of any host canvas. [`MemoryScene`] is the in-process implementation
//! used by tests and the command-line tool.

mod color;
mod memory;

pub use color::{Color, ColorParseError};
pub use memory::{MemoryNode, MemoryScene, TextContent};

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier assigned to a node by the scene graph.
pub type NodeId = String;

/// Delimiter that marks a graph-assigned id (`<page>:<seq>`).
pub const STRUCTURED_ID_DELIMITER: char = ':';

/// Whether a reference has the shape of a graph-assigned id.
pub fn is_structured_id(reference: &str) -> bool {
    let Some((page, seq)) = reference.split_once(STRUCTURED_ID_DELIMITER) else {
        return false;
    };
    // Instance sublayers carry an `I` prefix: `I5:7;2:9`.
    let page = page.strip_prefix('I').unwrap_or(page);
    !page.is_empty()
        && !seq.is_empty()
        && page.chars().all(|c| c.is_ascii_digit())
        && seq.chars().all(|c| c.is_ascii_digit() || c == STRUCTURED_ID_DELIMITER || c == ';')
}

/// Scene graph errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("scene graph unavailable: {0}")]
    Unavailable(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("cannot create node of kind {0}")]
    NotCreatable(NodeKind),
    #[error("rejected value for {attribute} on {id}: {reason}")]
    Rejected {
        id: String,
        attribute: &'static str,
        reason: String,
    },
    #[error("font {0} is not available")]
    FontUnavailable(FontName),
    #[error("font {0} has not been loaded")]
    FontNotLoaded(FontName),
}

/// Result type for scene graph operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Kinds of canvas objects the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Frame,
    Group,
    Component,
    Instance,
    Section,
    #[default]
    Rectangle,
    Ellipse,
    Line,
    Vector,
    Text,
    Other,
}

impl NodeKind {
    /// Container kinds can hold child nodes.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeKind::Frame
                | NodeKind::Group
                | NodeKind::Component
                | NodeKind::Instance
                | NodeKind::Section
        )
    }

    /// Kinds the executor may create from an `add` operation.
    pub fn is_creatable(self) -> bool {
        !matches!(self, NodeKind::Group | NodeKind::Instance | NodeKind::Other)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Frame => "frame",
            NodeKind::Group => "group",
            NodeKind::Component => "component",
            NodeKind::Instance => "instance",
            NodeKind::Section => "section",
            NodeKind::Rectangle => "rectangle",
            NodeKind::Ellipse => "ellipse",
            NodeKind::Line => "line",
            NodeKind::Vector => "vector",
            NodeKind::Text => "text",
            NodeKind::Other => "other",
        }
    }

    /// Display name given to freshly created nodes that declare no name.
    pub fn default_node_name(self) -> &'static str {
        match self {
            NodeKind::Frame => "Frame",
            NodeKind::Group => "Group",
            NodeKind::Component => "Component",
            NodeKind::Instance => "Instance",
            NodeKind::Section => "Section",
            NodeKind::Rectangle => "Rectangle",
            NodeKind::Ellipse => "Ellipse",
            NodeKind::Line => "Line",
            NodeKind::Vector => "Vector",
            NodeKind::Text => "Text",
            NodeKind::Other => "Node",
        }
    }

    /// Size a host gives a node on creation.
    pub fn default_size(self) -> Size {
        match self {
            NodeKind::Text => Size::new(100.0, 20.0),
            NodeKind::Line => Size::new(100.0, 0.0),
            _ => Size::new(100.0, 100.0),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frame" => Ok(NodeKind::Frame),
            "group" => Ok(NodeKind::Group),
            "component" => Ok(NodeKind::Component),
            "instance" => Ok(NodeKind::Instance),
            "section" => Ok(NodeKind::Section),
            "rectangle" | "rect" => Ok(NodeKind::Rectangle),
            "ellipse" | "circle" => Ok(NodeKind::Ellipse),
            "line" => Ok(NodeKind::Line),
            "vector" => Ok(NodeKind::Vector),
            "text" => Ok(NodeKind::Text),
            "other" => Ok(NodeKind::Other),
            other => Err(format!("unknown node kind '{other}'")),
        }
    }
}

/// A font face as requested from the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FontName {
    pub family: String,
    pub style: String,
}

impl FontName {
    pub fn new(family: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            style: style.into(),
        }
    }
}

impl fmt::Display for FontName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.style)
    }
}

/// Read-only view of one canvas object.
///
/// Coordinates are absolute canvas coordinates with a top-left origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
}

impl SceneNode {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position(), self.size())
    }
}

/// Capability surface of the host scene graph.
///
/// Every mutation is synchronous; the executor applies one plan at a time.
pub trait SceneGraph {
    /// Id of the page that owns top-level nodes. Fails when the graph is gone.
    fn root(&self) -> SceneResult<NodeId>;

    /// Look up a node by id.
    fn node(&self, id: &str) -> Option<SceneNode>;

    /// Direct children of the page, in page order.
    fn top_level_nodes(&self) -> Vec<SceneNode>;

    /// Every node on the page, depth-first in document order.
    fn all_nodes(&self) -> Vec<SceneNode>;

    /// Create a node of the given kind on the page.
    fn create_node(&mut self, kind: NodeKind) -> SceneResult<NodeId>;

    /// Remove a node and its descendants.
    fn remove_node(&mut self, id: &str) -> SceneResult<()>;

    fn set_name(&mut self, id: &str, name: &str) -> SceneResult<()>;

    fn set_position(&mut self, id: &str, x: f64, y: f64) -> SceneResult<()>;

    fn resize(&mut self, id: &str, width: f64, height: f64) -> SceneResult<()>;

    fn set_fill(&mut self, id: &str, color: Color) -> SceneResult<()>;

    fn set_stroke(&mut self, id: &str, color: Option<Color>, weight: Option<f64>) -> SceneResult<()>;

    fn set_opacity(&mut self, id: &str, opacity: f64) -> SceneResult<()>;

    /// Rotation in degrees.
    fn set_rotation(&mut self, id: &str, degrees: f64) -> SceneResult<()>;

    fn set_corner_radius(&mut self, id: &str, radius: f64) -> SceneResult<()>;

    /// Set text content. The font must have been loaded with [`SceneGraph::load_font`].
    fn set_text(
        &mut self,
        id: &str,
        content: &str,
        font: &FontName,
        font_size: Option<f64>,
    ) -> SceneResult<()>;

    /// Move `child` under `parent`, appending it to the end of its children.
    fn append_child(&mut self, parent: &str, child: &str) -> SceneResult<()>;

    /// Make a font usable for text nodes.
    fn load_font(&mut self, font: &FontName) -> SceneResult<()>;
}
