//! Plans: ordered batches of add/modify operations produced by the oracle.
//!
//! Plans arrive as JSON. On the wire a numeric `0` for a size, position,
//! opacity, stroke weight or corner radius is a placeholder for "not
//! provided"; once deserialized every optional attribute is an explicit
//! `Option`, and the typed API can set any value.

mod order;

pub use order::dependency_order;

use crate::layout::{Alignment, Relationship};
use crate::scene::{Color, NodeKind};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Deserialize an optional number, treating `0` as absent.
fn zero_as_unset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v != 0.0))
}

/// Fatal plan-level errors; nothing is applied when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("scene graph unavailable: {0}")]
    SceneUnavailable(String),
    #[error("dependency cycle between operations: {}", .operations.join(" -> "))]
    DependencyCycle { operations: Vec<String> },
}

/// Why an operation is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("add operation has no kind")]
    MissingKind,
    #[error("cannot create a node of kind {0}")]
    NotCreatable(NodeKind),
    #[error("modify operation has no target")]
    MissingTarget,
    #[error("text content given for a {0} node")]
    TextOnNonText(NodeKind),
    #[error("{attribute} must be {expected}, got {value}")]
    OutOfRange {
        attribute: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("empty {0} reference")]
    EmptyReference(&'static str),
    #[error("undecodable operation: {0}")]
    Undecodable(String),
}

/// What an operation does to the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Modify,
}

/// Geometry fields of an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeometrySpec {
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Rotation in degrees; `0` is a real value here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl GeometrySpec {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn bounds(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            rotation: None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (attribute, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(out_of_range(attribute, "positive", v));
                }
            }
        }
        for (attribute, value) in [("x", self.x), ("y", self.y), ("rotation", self.rotation)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(out_of_range(attribute, "finite", v));
                }
            }
        }
        Ok(())
    }
}

/// Visual style fields of an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Color>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub stroke_weight: Option<f64>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(deserialize_with = "zero_as_unset", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl StyleSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.opacity {
            if !(0.0..=1.0).contains(&v) {
                return Err(out_of_range("opacity", "within 0..=1", v));
            }
        }
        for (attribute, value) in [
            ("strokeWeight", self.stroke_weight),
            ("cornerRadius", self.corner_radius),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(out_of_range(attribute, "non-negative", v));
                }
            }
        }
        if let Some(v) = self.font_size {
            if !v.is_finite() || v < 1.0 {
                return Err(out_of_range("fontSize", "at least 1", v));
            }
        }
        Ok(())
    }
}

fn out_of_range(attribute: &'static str, expected: &'static str, value: f64) -> ValidationError {
    ValidationError::OutOfRange {
        attribute,
        expected,
        value: value.to_string(),
    }
}

/// Place a node relative to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Id or name of the reference node.
    pub relative_to: String,
    pub relationship: Relationship,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub spacing: f64,
}

/// One add or modify step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Node to modify, by id or name.
    #[serde(default, alias = "targetRef", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Name given to the node; later operations in the plan may refer to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometrySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Container to place the node in, by id or name.
    #[serde(default, alias = "containerRef", skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    /// Set when the wire entry could not be decoded; such an operation
    /// fails validation and is reported on its own.
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl Operation {
    fn empty(action: Action) -> Self {
        Self {
            action,
            kind: None,
            target: None,
            name: None,
            geometry: None,
            style: None,
            text_content: None,
            container: None,
            placement: None,
            decode_error: None,
        }
    }

    /// Decode one wire entry. An entry that does not decode still yields an
    /// operation, carrying the error and whatever identifies it for messages.
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Operation>(value.clone()) {
            Ok(op) => op,
            Err(e) => {
                let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
                let action = match value.get("action").and_then(|v| v.as_str()) {
                    Some("add") => Action::Add,
                    _ => Action::Modify,
                };
                Self {
                    name: text("name"),
                    target: text("target").or_else(|| text("targetRef")),
                    decode_error: Some(e.to_string()),
                    ..Self::empty(action)
                }
            }
        }
    }

    /// Create an add operation for a node of `kind`.
    pub fn add(kind: NodeKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::empty(Action::Add)
        }
    }

    /// Create a modify operation targeting a node by id or name.
    pub fn modify(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::empty(Action::Modify)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_geometry(mut self, geometry: GeometrySpec) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_style(mut self, style: StyleSpec) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.text_content = Some(content.into());
        self
    }

    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Whether applying this operation needs a loaded font.
    pub fn needs_font(&self) -> bool {
        self.text_content.is_some() || (self.action == Action::Add && self.kind == Some(NodeKind::Text))
    }

    /// References that must exist before this operation runs: the container
    /// and the placement anchor. A modify target is not one; it resolves
    /// against whatever exists when the operation is reached in plan order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.container
            .as_deref()
            .into_iter()
            .chain(self.placement.as_ref().map(|p| p.relative_to.as_str()))
    }

    /// Check the operation's declared shape before touching the scene.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(reason) = &self.decode_error {
            return Err(ValidationError::Undecodable(reason.clone()));
        }
        match self.action {
            Action::Add => {
                let kind = self.kind.ok_or(ValidationError::MissingKind)?;
                if !kind.is_creatable() {
                    return Err(ValidationError::NotCreatable(kind));
                }
                if self.text_content.is_some() && kind != NodeKind::Text {
                    return Err(ValidationError::TextOnNonText(kind));
                }
            }
            Action::Modify => match self.target.as_deref() {
                None => return Err(ValidationError::MissingTarget),
                Some(t) if t.trim().is_empty() => return Err(ValidationError::EmptyReference("target")),
                Some(_) => {}
            },
        }
        if self.container.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::EmptyReference("container"));
        }
        if let Some(placement) = &self.placement {
            if placement.relative_to.trim().is_empty() {
                return Err(ValidationError::EmptyReference("placement"));
            }
            if !placement.spacing.is_finite() {
                return Err(out_of_range("spacing", "finite", placement.spacing));
            }
        }
        if let Some(geometry) = &self.geometry {
            geometry.validate()?;
        }
        if let Some(style) = &self.style {
            style.validate()?;
        }
        Ok(())
    }

    /// Short human-readable label used in error messages.
    pub fn label(&self) -> String {
        let subject = match self.action {
            Action::Add => self.name.as_deref().or(self.kind.map(NodeKind::name)),
            Action::Modify => self.target.as_deref(),
        };
        match subject {
            Some(s) => format!("{} '{}'", self.action, s),
            None => self.action.to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Add => "add",
            Action::Modify => "modify",
        })
    }
}

/// An ordered batch of operations.
///
/// Entries are decoded one by one, so a single bad entry does not reject
/// the rest of the plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WirePlan")]
pub struct Plan {
    pub operations: Vec<Operation>,
}

#[derive(Deserialize)]
struct WirePlan {
    operations: Vec<serde_json::Value>,
}

impl From<WirePlan> for Plan {
    fn from(wire: WirePlan) -> Self {
        wire.operations.into_iter().collect()
    }
}

impl FromIterator<serde_json::Value> for Plan {
    fn from_iter<I: IntoIterator<Item = serde_json::Value>>(entries: I) -> Self {
        Self::new(entries.into_iter().map(Operation::from_value).collect())
    }
}

impl Plan {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Parse a plan from JSON: either `{"operations": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Wrapped(Plan),
            Bare(Vec<serde_json::Value>),
        }
        Ok(match serde_json::from_str(json)? {
            Wire::Wrapped(plan) => plan,
            Wire::Bare(entries) => entries.into_iter().collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<Vec<Operation>> for Plan {
    fn from(operations: Vec<Operation>) -> Self {
        Self::new(operations)
    }
}
