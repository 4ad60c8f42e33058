//! Layout intents and the corrections proposed to satisfy them.

use crate::plan::{GeometrySpec, Operation};
use crate::scene::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The layout goal inferred from a user action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Intent {
    pub description: String,
    pub target_pattern: String,
    pub alignment_type: String,
    pub spacing_requirement: String,
    pub objects_to_move: BTreeSet<NodeId>,
    /// Objects the convergence loop must never reposition.
    pub objects_to_keep_fixed: BTreeSet<NodeId>,
    pub reasoning: String,
}

impl Intent {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_movable(mut self, ids: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        self.objects_to_move.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_fixed(mut self, ids: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        self.objects_to_keep_fixed.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Pin the object the user moved: it is fixed and never movable.
    pub fn pin(&mut self, moved_id: &str) {
        self.objects_to_move.remove(moved_id);
        self.objects_to_keep_fixed.insert(moved_id.to_string());
    }

    /// Make the two sets disjoint, the fixed set winning.
    ///
    /// Returns the ids that were removed from the movable set.
    pub fn normalize(&mut self) -> Vec<NodeId> {
        let overlap: Vec<NodeId> = self
            .objects_to_move
            .intersection(&self.objects_to_keep_fixed)
            .cloned()
            .collect();
        for id in &overlap {
            self.objects_to_move.remove(id);
        }
        overlap
    }

    pub fn is_fixed(&self, id: &str) -> bool {
        self.objects_to_keep_fixed.contains(id)
    }

    pub fn is_movable(&self, id: &str) -> bool {
        self.objects_to_move.contains(id) && !self.is_fixed(id)
    }
}

/// A proposed new position for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub object_id: NodeId,
    pub new_x: f64,
    pub new_y: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Correction {
    pub fn new(object_id: impl Into<NodeId>, new_x: f64, new_y: f64) -> Self {
        Self {
            object_id: object_id.into(),
            new_x,
            new_y,
            reasoning: String::new(),
        }
    }

    /// Position-only modify operation targeting the object by id.
    pub fn to_operation(&self) -> Operation {
        Operation::modify(self.object_id.clone()).with_geometry(GeometrySpec {
            x: Some(self.new_x),
            y: Some(self.new_y),
            ..GeometrySpec::default()
        })
    }
}

/// The oracle's verdict on the current canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Evaluation {
    pub intent_satisfied: bool,
    pub issues: Vec<String>,
    pub corrections: Vec<Correction>,
}

impl Evaluation {
    pub fn satisfied() -> Self {
        Self {
            intent_satisfied: true,
            ..Self::default()
        }
    }

    pub fn unsatisfied(issues: Vec<String>, corrections: Vec<Correction>) -> Self {
        Self {
            intent_satisfied: false,
            issues,
            corrections,
        }
    }
}
