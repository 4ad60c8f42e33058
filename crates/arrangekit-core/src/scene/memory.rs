//! In-memory scene graph implementation.

use super::{
    Color, FontName, NodeId, NodeKind, SceneError, SceneGraph, SceneNode, SceneResult,
};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Smallest extent the graph accepts for a resized node.
const MIN_EXTENT: f64 = 0.01;

fn default_page_id() -> NodeId {
    "0:1".to_string()
}

fn default_fonts() -> BTreeSet<FontName> {
    ["Regular", "Medium", "Bold"]
        .into_iter()
        .map(|style| FontName::new("Inter", style))
        .collect()
}

fn default_opacity() -> f64 {
    1.0
}

fn default_next_seq() -> u64 {
    2
}

/// Text payload of a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub characters: String,
    pub font: FontName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

/// A node stored in a [`MemoryScene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Parent node; `None` for direct children of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Color>,
    #[serde(default)]
    pub stroke_weight: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub corner_radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
}

impl MemoryNode {
    fn new(id: NodeId, kind: NodeKind, name: &str, bounds: Rect) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            x: bounds.x0,
            y: bounds.y0,
            width: bounds.width(),
            height: bounds.height(),
            parent_id: None,
            children: Vec::new(),
            fill: None,
            stroke: None,
            stroke_weight: 0.0,
            opacity: 1.0,
            rotation: 0.0,
            corner_radius: 0.0,
            text: None,
        }
    }
}

/// Scene graph held entirely in memory.
///
/// Serializes to a JSON document so scenes can be loaded from and written to
/// files. Node ids follow the host convention `<page>:<seq>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryScene {
    #[serde(default = "default_page_id")]
    page_id: NodeId,
    #[serde(default)]
    nodes: HashMap<NodeId, MemoryNode>,
    /// Direct children of the page, in page order.
    #[serde(default)]
    top_level: Vec<NodeId>,
    /// Fonts the host can load.
    #[serde(default = "default_fonts")]
    fonts: BTreeSet<FontName>,
    #[serde(skip)]
    loaded_fonts: HashSet<FontName>,
    #[serde(default = "default_next_seq")]
    next_seq: u64,
    /// Set when the host graph has gone away (e.g. the document was closed).
    #[serde(skip)]
    detached: bool,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Create an empty page with the default font set.
    pub fn new() -> Self {
        Self {
            page_id: default_page_id(),
            nodes: HashMap::new(),
            top_level: Vec::new(),
            fonts: default_fonts(),
            loaded_fonts: HashSet::new(),
            next_seq: default_next_seq(),
            detached: false,
        }
    }

    /// Replace the set of fonts the host can load.
    pub fn with_fonts(mut self, fonts: impl IntoIterator<Item = FontName>) -> Self {
        self.fonts = fonts.into_iter().collect();
        self
    }

    /// Check if a font has been loaded.
    pub fn is_font_loaded(&self, font: &FontName) -> bool {
        self.loaded_fonts.contains(font)
    }

    /// Simulate the host graph disappearing; every call then fails.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// Insert a top-level node directly, bypassing the capability surface.
    pub fn insert(&mut self, kind: NodeKind, name: &str, bounds: Rect) -> NodeId {
        let id = self.allocate_id();
        self.nodes.insert(id.clone(), MemoryNode::new(id.clone(), kind, name, bounds));
        self.top_level.push(id.clone());
        id
    }

    /// Insert a node as the last child of `parent`.
    pub fn insert_into(
        &mut self,
        parent: &str,
        kind: NodeKind,
        name: &str,
        bounds: Rect,
    ) -> SceneResult<NodeId> {
        let id = self.insert(kind, name, bounds);
        self.append_child(parent, &id)?;
        Ok(id)
    }

    /// Full stored state of a node.
    pub fn node_data(&self, id: &str) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    /// Number of nodes on the page (at any depth).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the page has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize the scene to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a scene from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn allocate_id(&mut self) -> NodeId {
        loop {
            let id = format!("1:{}", self.next_seq);
            self.next_seq += 1;
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn check_available(&self) -> SceneResult<()> {
        if self.detached {
            Err(SceneError::Unavailable("document is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn node_mut(&mut self, id: &str) -> SceneResult<&mut MemoryNode> {
        self.check_available()?;
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.to_string()))
    }

    fn view(&self, node: &MemoryNode) -> SceneNode {
        SceneNode {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
            parent_id: Some(node.parent_id.clone().unwrap_or_else(|| self.page_id.clone())),
        }
    }

    fn collect_depth_first(&self, id: &NodeId, out: &mut Vec<SceneNode>) {
        if let Some(node) = self.nodes.get(id) {
            out.push(self.view(node));
            for child in &node.children {
                self.collect_depth_first(child, out);
            }
        }
    }

    /// Check if `ancestor` is `id` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        let mut current = Some(id.to_string());
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.nodes.get(&cur).and_then(|n| n.parent_id.clone());
        }
        false
    }

    fn detach_from_parent(&mut self, id: &str) {
        let parent = self.nodes.get(id).and_then(|n| n.parent_id.clone());
        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| c != id);
                }
            }
            None => self.top_level.retain(|c| c != id),
        }
    }

    fn rejected(id: &str, attribute: &'static str, reason: impl Into<String>) -> SceneError {
        SceneError::Rejected {
            id: id.to_string(),
            attribute,
            reason: reason.into(),
        }
    }
}

impl SceneGraph for MemoryScene {
    fn root(&self) -> SceneResult<NodeId> {
        self.check_available()?;
        Ok(self.page_id.clone())
    }

    fn node(&self, id: &str) -> Option<SceneNode> {
        if self.detached {
            return None;
        }
        self.nodes.get(id).map(|n| self.view(n))
    }

    fn top_level_nodes(&self) -> Vec<SceneNode> {
        if self.detached {
            return Vec::new();
        }
        self.top_level
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| self.view(n))
            .collect()
    }

    fn all_nodes(&self) -> Vec<SceneNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        if self.detached {
            return out;
        }
        for id in &self.top_level {
            self.collect_depth_first(id, &mut out);
        }
        out
    }

    fn create_node(&mut self, kind: NodeKind) -> SceneResult<NodeId> {
        self.check_available()?;
        if !kind.is_creatable() {
            return Err(SceneError::NotCreatable(kind));
        }
        let size = kind.default_size();
        let bounds = Rect::new(0.0, 0.0, size.width, size.height);
        Ok(self.insert(kind, kind.default_node_name(), bounds))
    }

    fn remove_node(&mut self, id: &str) -> SceneResult<()> {
        self.check_available()?;
        if !self.nodes.contains_key(id) {
            return Err(SceneError::NodeNotFound(id.to_string()));
        }
        self.detach_from_parent(id);
        let mut pending = vec![id.to_string()];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children);
            }
        }
        Ok(())
    }

    fn set_name(&mut self, id: &str, name: &str) -> SceneResult<()> {
        self.node_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn set_position(&mut self, id: &str, x: f64, y: f64) -> SceneResult<()> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Self::rejected(id, "position", format!("({x}, {y}) is not finite")));
        }
        let node = self.node_mut(id)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    fn resize(&mut self, id: &str, width: f64, height: f64) -> SceneResult<()> {
        let node = self.node_mut(id)?;
        let min_height = if node.kind == NodeKind::Line { 0.0 } else { MIN_EXTENT };
        if !width.is_finite() || width < MIN_EXTENT {
            return Err(Self::rejected(id, "width", format!("{width} is below {MIN_EXTENT}")));
        }
        if !height.is_finite() || height < min_height {
            return Err(Self::rejected(id, "height", format!("{height} is below {min_height}")));
        }
        node.width = width;
        node.height = height;
        Ok(())
    }

    fn set_fill(&mut self, id: &str, color: Color) -> SceneResult<()> {
        self.node_mut(id)?.fill = Some(color);
        Ok(())
    }

    fn set_stroke(&mut self, id: &str, color: Option<Color>, weight: Option<f64>) -> SceneResult<()> {
        if let Some(w) = weight {
            if !w.is_finite() || w < 0.0 {
                return Err(Self::rejected(id, "strokeWeight", format!("{w} is negative")));
            }
        }
        let node = self.node_mut(id)?;
        if let Some(color) = color {
            node.stroke = Some(color);
        }
        if let Some(w) = weight {
            node.stroke_weight = w;
        }
        Ok(())
    }

    fn set_opacity(&mut self, id: &str, opacity: f64) -> SceneResult<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Self::rejected(id, "opacity", format!("{opacity} is outside 0..=1")));
        }
        self.node_mut(id)?.opacity = opacity;
        Ok(())
    }

    fn set_rotation(&mut self, id: &str, degrees: f64) -> SceneResult<()> {
        if !degrees.is_finite() {
            return Err(Self::rejected(id, "rotation", "not finite"));
        }
        self.node_mut(id)?.rotation = degrees;
        Ok(())
    }

    fn set_corner_radius(&mut self, id: &str, radius: f64) -> SceneResult<()> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Self::rejected(id, "cornerRadius", format!("{radius} is negative")));
        }
        self.node_mut(id)?.corner_radius = radius;
        Ok(())
    }

    fn set_text(
        &mut self,
        id: &str,
        content: &str,
        font: &FontName,
        font_size: Option<f64>,
    ) -> SceneResult<()> {
        self.check_available()?;
        if !self.loaded_fonts.contains(font) {
            return Err(SceneError::FontNotLoaded(font.clone()));
        }
        if let Some(size) = font_size {
            if !size.is_finite() || size < 1.0 {
                return Err(Self::rejected(id, "fontSize", format!("{size} is below 1")));
            }
        }
        let node = self.node_mut(id)?;
        if node.kind != NodeKind::Text {
            return Err(Self::rejected(id, "characters", format!("{} node has no text", node.kind)));
        }
        node.text = Some(TextContent {
            characters: content.to_string(),
            font: font.clone(),
            font_size,
        });
        Ok(())
    }

    fn append_child(&mut self, parent: &str, child: &str) -> SceneResult<()> {
        self.check_available()?;
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child.to_string()));
        }

        if parent == self.page_id {
            self.detach_from_parent(child);
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent_id = None;
            }
            self.top_level.push(child.to_string());
            return Ok(());
        }

        let parent_kind = self
            .nodes
            .get(parent)
            .map(|n| n.kind)
            .ok_or_else(|| SceneError::NodeNotFound(parent.to_string()))?;
        if !parent_kind.is_container() {
            return Err(Self::rejected(child, "parent", format!("{parent} is a {parent_kind}, not a container")));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Self::rejected(child, "parent", format!("{parent} is inside {child}")));
        }

        self.detach_from_parent(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent_id = Some(parent.to_string());
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child.to_string());
        }
        Ok(())
    }

    fn load_font(&mut self, font: &FontName) -> SceneResult<()> {
        self.check_available()?;
        if self.fonts.contains(font) {
            self.loaded_fonts.insert(font.clone());
            Ok(())
        } else {
            Err(SceneError::FontUnavailable(font.clone()))
        }
    }
}
