//! Plan execution against the scene graph.
//!
//! Operations run in dependency order. A failing operation is recorded and
//! skipped; the rest of the plan still applies and nothing that succeeded is
//! rolled back. Only plan-level problems abort the whole call, and they are
//! detected before the first mutation.

use crate::fonts::{FontError, FontFallback, FontLoader};
use crate::layout;
use crate::plan::{Action, Operation, Plan, PlanError, StyleSpec, ValidationError, dependency_order};
use crate::resolver::{NodeResolver, ResolveError};
use crate::scene::{FontName, NodeId, NodeKind, SceneError, SceneGraph, SceneNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single operation failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("invalid operation: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Font(#[from] FontError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Outcome of one plan application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// True when no operation failed.
    pub success: bool,
    pub created_count: usize,
    pub modified_count: usize,
    /// One message per failed operation, in execution order.
    pub errors: Vec<String>,
}

impl ExecutionResult {
    /// Number of operations that took effect.
    pub fn changed(&self) -> usize {
        self.created_count + self.modified_count
    }
}

/// Resolved inputs an operation needs before it touches the scene.
struct Prepared {
    container: Option<NodeId>,
    anchor: Option<SceneNode>,
    font: Option<FontName>,
}

/// Applies plans to a scene graph.
///
/// Loaded fonts are cached for the executor's lifetime; the name cache used
/// for resolution lives for one plan.
#[derive(Debug, Default)]
pub struct OperationExecutor {
    fonts: FontLoader,
}

impl OperationExecutor {
    pub fn new(fallback: FontFallback) -> Self {
        Self {
            fonts: FontLoader::new(fallback),
        }
    }

    /// Apply every operation of `plan`, isolating per-operation failures.
    pub fn apply_plan<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        plan: &Plan,
    ) -> Result<ExecutionResult, PlanError> {
        scene
            .root()
            .map_err(|e| PlanError::SceneUnavailable(e.to_string()))?;
        let order = dependency_order(&plan.operations)?;

        let mut resolver = NodeResolver::new();
        let mut result = ExecutionResult::default();
        for index in order {
            let op = &plan.operations[index];
            match self.apply_operation(scene, &mut resolver, op) {
                Ok(()) => match op.action {
                    Action::Add => result.created_count += 1,
                    Action::Modify => result.modified_count += 1,
                },
                Err(e) => {
                    log::warn!("Operation {} ({}) failed: {}", index + 1, op.label(), e);
                    result
                        .errors
                        .push(format!("operation {} ({}): {}", index + 1, op.label(), e));
                }
            }
        }
        result.success = result.errors.is_empty();

        log::info!(
            "Applied plan: {} of {} operations ({} created, {} modified), {} failed",
            result.changed(),
            plan.len(),
            result.created_count,
            result.modified_count,
            result.errors.len()
        );
        Ok(result)
    }

    fn apply_operation<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        resolver: &mut NodeResolver,
        op: &Operation,
    ) -> Result<(), OperationError> {
        op.validate()?;
        match op.action {
            Action::Add => self.apply_add(scene, resolver, op),
            Action::Modify => self.apply_modify(scene, resolver, op),
        }
    }

    fn prepare<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        resolver: &NodeResolver,
        op: &Operation,
    ) -> Result<Prepared, OperationError> {
        let container = op
            .container
            .as_deref()
            .map(|c| resolver.resolve_container(&*scene, c))
            .transpose()?;
        let anchor = op
            .placement
            .as_ref()
            .map(|p| resolver.resolve_target(&*scene, &p.relative_to))
            .transpose()?;
        let font = if op.needs_font() {
            let requested = self.requested_font(op.style.as_ref());
            Some(self.fonts.acquire(scene, &requested)?)
        } else {
            None
        };
        Ok(Prepared {
            container,
            anchor,
            font,
        })
    }

    fn requested_font(&self, style: Option<&StyleSpec>) -> FontName {
        let default = self.fonts.fallback().default_font();
        let family = style.and_then(|s| s.font_family.clone()).unwrap_or(default.family);
        let style = style.and_then(|s| s.font_style.clone()).unwrap_or(default.style);
        FontName::new(family, style)
    }

    fn apply_add<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        resolver: &mut NodeResolver,
        op: &Operation,
    ) -> Result<(), OperationError> {
        let kind = op.kind.ok_or(ValidationError::MissingKind)?;
        let prepared = self.prepare(scene, resolver, op)?;

        let id = scene.create_node(kind)?;
        if let Err(e) = configure(scene, &id, op, &prepared, true) {
            // Leave no half-configured node behind.
            if let Err(remove) = scene.remove_node(&id) {
                log::warn!("Failed to remove partially created node {}: {}", id, remove);
            }
            return Err(e);
        }

        if let Some(name) = &op.name {
            resolver.remember(name.clone(), id.clone());
        }
        log::debug!("Created {} {}", kind, id);
        Ok(())
    }

    fn apply_modify<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        resolver: &mut NodeResolver,
        op: &Operation,
    ) -> Result<(), OperationError> {
        let reference = op.target.as_deref().ok_or(ValidationError::MissingTarget)?;
        let target = resolver.resolve_target(&*scene, reference)?;
        if op.text_content.is_some() && target.kind != NodeKind::Text {
            return Err(ValidationError::TextOnNonText(target.kind).into());
        }
        let prepared = self.prepare(scene, resolver, op)?;
        configure(scene, &target.id, op, &prepared, false)?;
        log::debug!("Modified {} {}", target.kind, target.id);
        Ok(())
    }
}

/// Apply naming, hierarchy, geometry, style and text to an existing node.
fn configure<S: SceneGraph + ?Sized>(
    scene: &mut S,
    id: &str,
    op: &Operation,
    prepared: &Prepared,
    created: bool,
) -> Result<(), OperationError> {
    if let Some(name) = &op.name {
        scene.set_name(id, name)?;
    }
    if let Some(container) = &prepared.container {
        scene.append_child(container, id)?;
    }

    let geometry = op.geometry.clone().unwrap_or_default();
    let current = current_node(scene, id)?;
    if geometry.width.is_some() || geometry.height.is_some() {
        // A missing dimension keeps its current value.
        scene.resize(
            id,
            geometry.width.unwrap_or(current.width),
            geometry.height.unwrap_or(current.height),
        )?;
    }
    if let Some(degrees) = geometry.rotation {
        scene.set_rotation(id, degrees)?;
    }

    let current = current_node(scene, id)?;
    if let (Some(placement), Some(anchor)) = (&op.placement, &prepared.anchor) {
        let at = layout::position(
            current.size(),
            anchor.bounds(),
            placement.relationship,
            placement.alignment,
            placement.spacing,
        );
        scene.set_position(id, at.x, at.y)?;
    } else if geometry.x.is_some() || geometry.y.is_some() {
        scene.set_position(
            id,
            geometry.x.unwrap_or(current.x),
            geometry.y.unwrap_or(current.y),
        )?;
    } else if created {
        // New children start at their container's origin.
        if let Some(parent) = prepared.container.as_deref().and_then(|c| scene.node(c)) {
            scene.set_position(id, parent.x, parent.y)?;
        }
    }

    if let Some(style) = &op.style {
        apply_style(scene, id, style)?;
    }

    if let Some(font) = &prepared.font {
        let font_size = op.style.as_ref().and_then(|s| s.font_size);
        let content = op.text_content.as_deref().unwrap_or_default();
        scene.set_text(id, content, font, font_size)?;
    } else if !created && has_font_fields(op.style.as_ref()) {
        log::warn!("Font settings on {} ignored without text content", id);
    }
    Ok(())
}

fn current_node<S: SceneGraph + ?Sized>(scene: &S, id: &str) -> Result<SceneNode, SceneError> {
    scene
        .node(id)
        .ok_or_else(|| SceneError::NodeNotFound(id.to_string()))
}

fn has_font_fields(style: Option<&StyleSpec>) -> bool {
    style.is_some_and(|s| s.font_family.is_some() || s.font_style.is_some() || s.font_size.is_some())
}

fn apply_style<S: SceneGraph + ?Sized>(scene: &mut S, id: &str, style: &StyleSpec) -> Result<(), SceneError> {
    if let Some(fill) = style.fill {
        scene.set_fill(id, fill)?;
    }
    if style.stroke.is_some() || style.stroke_weight.is_some() {
        scene.set_stroke(id, style.stroke, style.stroke_weight)?;
    }
    if let Some(opacity) = style.opacity {
        scene.set_opacity(id, opacity)?;
    }
    if let Some(radius) = style.corner_radius {
        scene.set_corner_radius(id, radius)?;
    }
    Ok(())
}
