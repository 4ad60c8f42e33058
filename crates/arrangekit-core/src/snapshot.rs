//! Point-in-time captures of the canvas.

use crate::layout::round_coord;
use crate::scene::{NodeId, NodeKind, SceneGraph, SceneNode, SceneResult};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One object as captured in a snapshot, with integer geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotObject {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
}

impl SnapshotObject {
    /// Capture a scene node, rounding its geometry to whole units.
    pub fn from_node(node: &SceneNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            x: round_coord(node.x) as i64,
            y: round_coord(node.y) as i64,
            width: round_coord(node.width) as i64,
            height: round_coord(node.height) as i64,
            parent_id: node.parent_id.clone(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position(), (self.width as f64, self.height as f64))
    }
}

/// Immutable capture of the objects a page manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub objects: Vec<SnapshotObject>,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Snapshot {
    /// Capture every top-level object on the page.
    ///
    /// Fails only when the scene graph itself is unavailable; an empty page
    /// yields an empty snapshot.
    pub fn capture<S: SceneGraph + ?Sized>(scene: &S) -> SceneResult<Self> {
        scene.root()?;
        let objects: Vec<_> = scene
            .top_level_nodes()
            .iter()
            .map(SnapshotObject::from_node)
            .collect();
        log::debug!("Captured snapshot of {} objects", objects.len());
        Ok(Self::from_objects(objects))
    }

    /// Build a snapshot from already captured objects.
    pub fn from_objects(objects: Vec<SnapshotObject>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            objects,
            timestamp,
        }
    }

    /// Look up an object by id.
    pub fn get(&self, id: &str) -> Option<&SnapshotObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize for hand-off to the oracle.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MemoryScene, SceneError};

    #[test]
    fn test_capture_rounds_geometry() {
        let mut scene = MemoryScene::new();
        let id = scene.insert(
            NodeKind::Rectangle,
            "A",
            Rect::from_origin_size((10.4, 20.5), (99.6, 50.2)),
        );

        let snapshot = Snapshot::capture(&scene).unwrap();
        let obj = snapshot.get(&id).unwrap();
        assert_eq!((obj.x, obj.y, obj.width, obj.height), (10, 21, 100, 50));
    }

    #[test]
    fn test_capture_only_top_level() {
        let mut scene = MemoryScene::new();
        let frame = scene.insert(NodeKind::Frame, "Card", Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = scene
            .insert_into(&frame, NodeKind::Text, "Title", Rect::new(0.0, 0.0, 50.0, 20.0))
            .unwrap();

        let snapshot = Snapshot::capture(&scene).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&frame));
        assert!(!snapshot.contains(&child));
    }

    #[test]
    fn test_empty_canvas_gives_empty_snapshot() {
        let scene = MemoryScene::new();
        assert!(Snapshot::capture(&scene).unwrap().is_empty());
    }

    #[test]
    fn test_detached_scene_fails() {
        let mut scene = MemoryScene::new();
        scene.detach();
        assert!(matches!(Snapshot::capture(&scene), Err(SceneError::Unavailable(_))));
    }

    #[test]
    fn test_preserves_page_order() {
        let mut scene = MemoryScene::new();
        let a = scene.insert(NodeKind::Rectangle, "A", Rect::new(0.0, 0.0, 1.0, 1.0));
        let b = scene.insert(NodeKind::Rectangle, "B", Rect::new(0.0, 0.0, 1.0, 1.0));
        let snapshot = Snapshot::capture(&scene).unwrap();
        let ids: Vec<_> = snapshot.objects.iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
