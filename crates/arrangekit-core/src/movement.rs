//! Movement detection between two snapshots.

use crate::scene::NodeId;
use crate::snapshot::{Snapshot, SnapshotObject};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Default noise threshold in canvas units.
pub const DEFAULT_MOVEMENT_THRESHOLD: i64 = 1;

/// An object that changed position between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub object_id: NodeId,
    pub from: Point,
    pub to: Point,
    pub delta: Vec2,
}

impl Movement {
    fn between(before: &SnapshotObject, after: &SnapshotObject) -> Self {
        let from = before.position();
        let to = after.position();
        Self {
            object_id: after.id.clone(),
            from,
            to,
            delta: to - from,
        }
    }
}

/// Diffs snapshots to attribute a user move to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementDetector {
    /// A move counts only when `|dx|` or `|dy|` exceeds this value.
    threshold: i64,
}

impl Default for MovementDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_THRESHOLD)
    }
}

impl MovementDetector {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold: threshold.max(0),
        }
    }

    fn moved(&self, before: &SnapshotObject, after: &SnapshotObject) -> bool {
        (after.x - before.x).abs() > self.threshold || (after.y - before.y).abs() > self.threshold
    }

    /// First object, in `after` order, whose position moved past the threshold.
    ///
    /// Objects present in only one snapshot are ignored.
    pub fn detect(&self, before: &Snapshot, after: &Snapshot) -> Option<Movement> {
        after.objects.iter().find_map(|now| {
            let then = before.get(&now.id)?;
            self.moved(then, now).then(|| Movement::between(then, now))
        })
    }

    /// Every object, in `after` order, whose position moved past the threshold.
    pub fn detect_all(&self, before: &Snapshot, after: &Snapshot) -> Vec<Movement> {
        after
            .objects
            .iter()
            .filter_map(|now| {
                let then = before.get(&now.id)?;
                self.moved(then, now).then(|| Movement::between(then, now))
            })
            .collect()
    }
}

/// Detect a single movement with the default threshold.
pub fn detect_movement(before: &Snapshot, after: &Snapshot) -> Option<Movement> {
    MovementDetector::default().detect(before, after)
}

/// Detect every movement with the default threshold.
pub fn detect_movements(before: &Snapshot, after: &Snapshot) -> Vec<Movement> {
    MovementDetector::default().detect_all(before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;

    fn object(id: &str, x: i64, y: i64) -> SnapshotObject {
        SnapshotObject {
            id: id.to_string(),
            name: id.to_string(),
            kind: NodeKind::Rectangle,
            x,
            y,
            width: 100,
            height: 50,
            parent_id: None,
        }
    }

    fn snapshot(objects: Vec<SnapshotObject>) -> Snapshot {
        Snapshot::from_objects(objects)
    }

    #[test]
    fn test_detects_move() {
        let before = snapshot(vec![object("1:1", 100, 100), object("1:2", 100, 250)]);
        let after = snapshot(vec![object("1:1", 100, 100), object("1:2", 300, 105)]);

        let movement = detect_movement(&before, &after).unwrap();
        assert_eq!(movement.object_id, "1:2");
        assert_eq!(movement.from, Point::new(100.0, 250.0));
        assert_eq!(movement.to, Point::new(300.0, 105.0));
        assert_eq!(movement.delta, Vec2::new(200.0, -145.0));
    }

    #[test]
    fn test_ignores_noise() {
        let before = snapshot(vec![object("1:1", 100, 100)]);
        let after = snapshot(vec![object("1:1", 101, 99)]);
        assert!(detect_movement(&before, &after).is_none());
    }

    #[test]
    fn test_two_units_is_a_move() {
        let before = snapshot(vec![object("1:1", 100, 100)]);
        let after = snapshot(vec![object("1:1", 100, 102)]);
        assert!(detect_movement(&before, &after).is_some());
    }

    #[test]
    fn test_first_in_after_order_wins() {
        let before = snapshot(vec![object("1:1", 0, 0), object("1:2", 0, 0)]);
        let after = snapshot(vec![object("1:2", 50, 0), object("1:1", 0, 50)]);
        assert_eq!(detect_movement(&before, &after).unwrap().object_id, "1:2");
    }

    #[test]
    fn test_added_and_removed_objects_are_ignored() {
        let before = snapshot(vec![object("1:1", 0, 0), object("1:9", 0, 0)]);
        let after = snapshot(vec![object("1:5", 500, 500), object("1:1", 0, 0)]);
        assert!(detect_movement(&before, &after).is_none());
    }

    #[test]
    fn test_detect_all_reports_every_move() {
        let before = snapshot(vec![object("1:1", 0, 0), object("1:2", 0, 0), object("1:3", 0, 0)]);
        let after = snapshot(vec![object("1:1", 10, 0), object("1:2", 0, 0), object("1:3", 0, -10)]);
        let ids: Vec<_> = detect_movements(&before, &after).into_iter().map(|m| m.object_id).collect();
        assert_eq!(ids, vec!["1:1", "1:3"]);
    }

    #[test]
    fn test_custom_threshold() {
        let before = snapshot(vec![object("1:1", 0, 0)]);
        let after = snapshot(vec![object("1:1", 4, 0)]);
        assert!(MovementDetector::new(5).detect(&before, &after).is_none());
        assert!(MovementDetector::new(3).detect(&before, &after).is_some());
    }
}
