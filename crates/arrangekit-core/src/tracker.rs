//! Polling state machine.
//!
//! ```text
//!   Idle --start--> Tracking --begin_convergence--> Converging
//!    ^                 |  ^                            |
//!    +------stop-------+  +----finish_convergence------+
//! ```
//!
//! A stop requested while converging is deferred until the cycle finishes.

use crate::movement::{Movement, MovementDetector};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerState {
    #[default]
    Idle,
    Tracking,
    Converging,
}

/// Tracks user movement between polls.
#[derive(Debug, Default)]
pub struct Tracker {
    state: TrackerState,
    detector: MovementDetector,
    baseline: Option<Snapshot>,
    stop_requested: bool,
}

impl Tracker {
    pub fn new(detector: MovementDetector) -> Self {
        Self {
            detector,
            ..Self::default()
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    pub fn is_stop_pending(&self) -> bool {
        self.stop_requested
    }

    /// Start tracking from `baseline`. Returns false unless idle.
    pub fn start(&mut self, baseline: Snapshot) -> bool {
        if self.state != TrackerState::Idle {
            return false;
        }
        self.baseline = Some(baseline);
        self.stop_requested = false;
        self.state = TrackerState::Tracking;
        true
    }

    /// Stop tracking. While converging the stop is deferred.
    pub fn stop(&mut self) {
        match self.state {
            TrackerState::Idle => {}
            TrackerState::Tracking => {
                self.state = TrackerState::Idle;
                self.baseline = None;
            }
            TrackerState::Converging => self.stop_requested = true,
        }
    }

    /// Diff `current` against the baseline.
    ///
    /// Only diffs while tracking; a convergence cycle's own moves are never
    /// attributed to the user. A quiet poll advances the baseline. A detected
    /// move stays pending until a convergence cycle re-baselines, so it is
    /// reported again if the cycle never starts.
    pub fn observe(&mut self, current: Snapshot) -> Option<Movement> {
        if self.state != TrackerState::Tracking {
            return None;
        }
        let movement = self
            .baseline
            .as_ref()
            .and_then(|before| self.detector.detect(before, &current));
        if movement.is_none() {
            self.baseline = Some(current);
        }
        movement
    }

    /// Enter convergence. Returns false if a cycle is already running.
    pub fn begin_convergence(&mut self) -> bool {
        if self.state == TrackerState::Converging {
            return false;
        }
        self.state = TrackerState::Converging;
        true
    }

    /// Leave convergence, re-baselining on `current`.
    ///
    /// Returns to tracking, or to idle when a stop was requested meanwhile or
    /// the cycle was started without tracking.
    pub fn finish_convergence(&mut self, current: Snapshot) {
        if self.state != TrackerState::Converging {
            return;
        }
        if self.stop_requested || self.baseline.is_none() {
            self.state = TrackerState::Idle;
            self.baseline = None;
            self.stop_requested = false;
        } else {
            self.state = TrackerState::Tracking;
            self.baseline = Some(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;
    use crate::snapshot::SnapshotObject;

    fn snap(x: i64) -> Snapshot {
        Snapshot::from_objects(vec![SnapshotObject {
            id: "1:2".into(),
            name: "A".into(),
            kind: NodeKind::Rectangle,
            x,
            y: 0,
            width: 10,
            height: 10,
            parent_id: None,
        }])
    }

    #[test]
    fn test_start_and_stop() {
        let mut tracker = Tracker::default();
        assert!(tracker.start(snap(0)));
        assert_eq!(tracker.state(), TrackerState::Tracking);
        assert!(!tracker.start(snap(0)));
        tracker.stop();
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert!(tracker.baseline().is_none());
    }

    #[test]
    fn test_quiet_poll_advances_baseline() {
        let mut tracker = Tracker::default();
        tracker.start(snap(0));
        // Sub-threshold jitter is absorbed into the baseline.
        assert!(tracker.observe(snap(1)).is_none());
        assert_eq!(tracker.baseline().unwrap().get("1:2").unwrap().x, 1);
    }

    #[test]
    fn test_move_stays_pending_until_convergence() {
        let mut tracker = Tracker::default();
        tracker.start(snap(0));
        assert_eq!(tracker.observe(snap(50)).unwrap().object_id, "1:2");
        // No cycle ran: the same move is reported again.
        assert_eq!(tracker.observe(snap(50)).unwrap().object_id, "1:2");

        tracker.begin_convergence();
        tracker.finish_convergence(snap(50));
        assert!(tracker.observe(snap(50)).is_none());
    }

    #[test]
    fn test_no_diff_while_converging() {
        let mut tracker = Tracker::default();
        tracker.start(snap(0));
        assert!(tracker.begin_convergence());
        assert!(!tracker.begin_convergence());
        assert!(tracker.observe(snap(80)).is_none());

        tracker.finish_convergence(snap(80));
        assert_eq!(tracker.state(), TrackerState::Tracking);
        // The loop's own move is in the new baseline.
        assert!(tracker.observe(snap(80)).is_none());
    }

    #[test]
    fn test_stop_is_deferred_while_converging() {
        let mut tracker = Tracker::default();
        tracker.start(snap(0));
        tracker.begin_convergence();
        tracker.stop();
        assert_eq!(tracker.state(), TrackerState::Converging);
        assert!(tracker.is_stop_pending());

        tracker.finish_convergence(snap(0));
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert!(!tracker.is_stop_pending());
    }

    #[test]
    fn test_convergence_from_idle_returns_to_idle() {
        let mut tracker = Tracker::default();
        assert!(tracker.begin_convergence());
        tracker.finish_convergence(snap(0));
        assert_eq!(tracker.state(), TrackerState::Idle);
    }
}
