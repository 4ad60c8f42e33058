//! Caller-facing arrangement session.
//!
//! An [`ArrangeSession`] owns the scene handle, the oracle and the executor,
//! and wires the snapshotter, detector, convergence loop and executor
//! together. It is driven either tick by tick or by [`ArrangeSession::run`].

use crate::config::ArrangeConfig;
use crate::convergence::{ConvergenceLoop, ConvergenceOutcome};
use crate::error::{ArrangeError, ArrangeResult};
use crate::events::{ArrangeEvent, EventSink};
use crate::executor::{ExecutionResult, OperationExecutor};
use crate::intent::Intent;
use crate::oracle::SemanticOracle;
use crate::plan::Plan;
use crate::scene::SceneGraph;
use crate::snapshot::Snapshot;
use crate::tracker::{Tracker, TrackerState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

/// Cloneable handle that ends [`ArrangeSession::run`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ArrangeSession<S: SceneGraph, O: SemanticOracle> {
    scene: S,
    oracle: O,
    executor: OperationExecutor,
    tracker: Tracker,
    events: EventSink,
    config: ArrangeConfig,
    stop: StopHandle,
}

impl<S: SceneGraph, O: SemanticOracle> ArrangeSession<S, O> {
    pub fn new(scene: S, oracle: O) -> Self {
        Self::with_config(scene, oracle, ArrangeConfig::default())
    }

    pub fn with_config(scene: S, oracle: O, config: ArrangeConfig) -> Self {
        Self {
            scene,
            oracle,
            executor: OperationExecutor::new(config.font_fallback()),
            tracker: Tracker::new(config.movement_detector()),
            events: EventSink::new(),
            config,
            stop: StopHandle::default(),
        }
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn into_scene(self) -> S {
        self.scene
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &ArrangeConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.tracker.state()
    }

    /// Receive progress events from now on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ArrangeEvent> {
        self.events.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Capture a baseline and start watching for user moves.
    pub fn start_tracking(&mut self) -> ArrangeResult<()> {
        if self.tracker.state() != TrackerState::Idle {
            return Ok(());
        }
        let baseline = Snapshot::capture(&self.scene)?;
        let objects = baseline.len();
        self.tracker.start(baseline);
        log::info!("Tracking {} objects", objects);
        self.events.emit(ArrangeEvent::TrackingStarted { objects });
        Ok(())
    }

    /// Stop watching. A running convergence cycle finishes first.
    pub fn stop_tracking(&mut self) {
        let was = self.tracker.state();
        self.tracker.stop();
        if was == TrackerState::Tracking {
            log::info!("Tracking stopped");
            self.events.emit(ArrangeEvent::TrackingStopped);
        }
    }

    /// Apply a plan to the scene.
    pub fn apply_plan(&mut self, plan: &Plan) -> ArrangeResult<ExecutionResult> {
        let result = self.executor.apply_plan(&mut self.scene, plan)?;
        self.events.emit(ArrangeEvent::PlanApplied {
            created: result.created_count,
            modified: result.modified_count,
            failed: result.errors.len(),
        });
        Ok(result)
    }

    /// Ask the oracle for a plan and apply it.
    pub async fn request_plan(&mut self, request: &str) -> ArrangeResult<ExecutionResult> {
        let snapshot = Snapshot::capture(&self.scene)?;
        let oracle = &self.oracle;
        let plan = self
            .config
            .retry_policy()
            .run("plan", || oracle.plan(request, &snapshot))
            .await
            .inspect_err(|e| {
                self.events.emit(ArrangeEvent::OracleFailed { message: e.to_string() });
            })?;
        self.apply_plan(&plan)
    }

    /// Converge the scene toward `intent`.
    ///
    /// Fails with [`ArrangeError::Busy`] if a cycle is already running.
    pub async fn run_convergence(&mut self, mut intent: Intent) -> ArrangeResult<ConvergenceOutcome> {
        let overlap = intent.normalize();
        if !overlap.is_empty() {
            log::warn!("Objects both movable and fixed, keeping them fixed: {:?}", overlap);
        }
        if !self.tracker.begin_convergence() {
            return Err(ArrangeError::Busy);
        }

        let result = ConvergenceLoop::new(&self.oracle)
            .with_max_iterations(self.config.max_iterations)
            .with_settle_delay(self.config.settle_delay())
            .with_retry(self.config.retry_policy())
            .run(&mut self.scene, &mut self.executor, &intent, &mut self.events)
            .await;

        match Snapshot::capture(&self.scene) {
            Ok(current) => self.tracker.finish_convergence(current),
            Err(e) => {
                log::warn!("Could not re-baseline after convergence: {}", e);
                self.tracker.stop();
                self.tracker.finish_convergence(Snapshot::from_objects(Vec::new()));
            }
        }
        result
    }

    /// Poll once: detect a user move and, if there is one, arrange around it.
    ///
    /// Returns the convergence outcome when a cycle ran.
    pub async fn tick(&mut self) -> ArrangeResult<Option<ConvergenceOutcome>> {
        if self.tracker.state() != TrackerState::Tracking {
            return Ok(None);
        }
        let current = Snapshot::capture(&self.scene)?;
        let Some(movement) = self.tracker.observe(current.clone()) else {
            return Ok(None);
        };
        log::info!(
            "Detected move of {} by ({}, {})",
            movement.object_id,
            movement.delta.x,
            movement.delta.y
        );
        self.events.emit(ArrangeEvent::MovementDetected {
            object_id: movement.object_id.clone(),
            dx: movement.delta.x,
            dy: movement.delta.y,
        });

        let oracle = &self.oracle;
        let mut intent = self
            .config
            .retry_policy()
            .run("infer intent", || oracle.infer_intent(&movement, &current))
            .await
            .inspect_err(|e| {
                self.events.emit(ArrangeEvent::OracleFailed { message: e.to_string() });
            })?;
        intent.pin(&movement.object_id);
        self.events.emit(ArrangeEvent::IntentInferred {
            description: intent.description.clone(),
        });

        self.run_convergence(intent).await.map(Some)
    }

    /// Track and arrange until the stop handle fires.
    ///
    /// Oracle failures are logged and polling continues; scene and plan
    /// failures end the session.
    pub async fn run(&mut self) -> ArrangeResult<()> {
        self.stop.reset();
        self.start_tracking()?;

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if self.stop.is_stopped() {
                self.stop_tracking();
                return Ok(());
            }
            match self.tick().await {
                Ok(Some(outcome)) => log::debug!("Cycle ended {:?}", outcome.state),
                Ok(None) => {}
                Err(e) if e.is_recoverable() => log::warn!("Arrangement cycle failed: {}", e),
                Err(e) => {
                    self.stop_tracking();
                    return Err(e);
                }
            }
            if self.tracker.state() == TrackerState::Idle {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceState;
    use crate::intent::{Correction, Evaluation};
    use crate::oracle::{OracleError, ScriptedOracle};
    use crate::plan::Operation;
    use crate::scene::{MemoryScene, NodeKind};
    use kurbo::Rect;

    #[tokio::test(start_paused = true)]
    async fn test_tick_without_movement_does_nothing() {
        let mut scene = MemoryScene::new();
        scene.insert(NodeKind::Rectangle, "A", Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut session = ArrangeSession::new(scene, ScriptedOracle::new());
        session.start_tracking().unwrap();
        assert_eq!(session.tick().await.unwrap(), None);
        assert_eq!(session.state(), TrackerState::Tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_pins_moved_object() {
        let mut scene = MemoryScene::new();
        let a = scene.insert(NodeKind::Rectangle, "A", Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = scene.insert(NodeKind::Rectangle, "B", Rect::new(0.0, 50.0, 10.0, 60.0));

        let oracle = ScriptedOracle::from_evaluations([
            // Tries to move the pinned object back, and B into line.
            Evaluation::unsatisfied(
                vec![],
                vec![Correction::new(a.clone(), 0.0, 0.0), Correction::new(b.clone(), 200.0, 0.0)],
            ),
            Evaluation::satisfied(),
        ]);
        // The oracle forgot to list the moved object as fixed.
        oracle.push_intent(Ok(Intent::new("row").with_movable([a.clone(), b.clone()])));

        let mut session = ArrangeSession::new(scene, oracle);
        session.start_tracking().unwrap();
        session.scene_mut().set_position(&a, 100.0, 0.0).unwrap();

        let outcome = session.tick().await.unwrap().unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.applied, 1);
        assert_eq!(session.scene().node(&a).unwrap().x, 100.0);
        assert_eq!(session.scene().node(&b).unwrap().x, 200.0);
        assert_eq!(session.state(), TrackerState::Tracking);

        // The loop's own correction is not mistaken for a user move.
        assert_eq!(session.tick().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_survives_failed_intent_call() {
        let mut scene = MemoryScene::new();
        let a = scene.insert(NodeKind::Rectangle, "A", Rect::new(0.0, 0.0, 10.0, 10.0));
        let oracle = ScriptedOracle::new().repeating(Evaluation::satisfied());
        oracle.push_intent(Err(OracleError::Rejected("overloaded".into())));
        oracle.push_intent(Ok(Intent::new("leave it")));

        let mut session = ArrangeSession::new(scene, oracle);
        session.start_tracking().unwrap();
        session.scene_mut().set_position(&a, 100.0, 0.0).unwrap();

        assert!(matches!(session.tick().await, Err(ArrangeError::Oracle(_))));
        assert_eq!(session.state(), TrackerState::Tracking);

        let outcome = session.tick().await.unwrap().unwrap();
        assert_eq!(outcome.state, ConvergenceState::Satisfied);
        let seen = session.oracle().seen_snapshots();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].get(&a).unwrap().x, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycle_is_busy() {
        let mut session = ArrangeSession::new(
            MemoryScene::new(),
            ScriptedOracle::new().repeating(Evaluation::satisfied()),
        );
        // A cycle is already in flight.
        assert!(session.tracker.begin_convergence());

        let result = session.run_convergence(Intent::new("row")).await;
        assert!(matches!(result, Err(ArrangeError::Busy)));
        assert!(ArrangeError::Busy.is_recoverable());
        assert_eq!(session.state(), TrackerState::Converging);
        assert!(session.oracle().seen_snapshots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_plan_applies_the_oracle_plan() {
        let config = ArrangeConfig {
            max_iterations: 3,
            ..ArrangeConfig::default()
        };
        let oracle = ScriptedOracle::new();
        oracle.push_plan(Ok(Plan::new(vec![
            Operation::add(NodeKind::Frame).named("Card"),
            Operation::modify("Missing"),
        ])));
        let mut session = ArrangeSession::with_config(MemoryScene::new(), oracle, config);
        assert_eq!(session.config().max_iterations, 3);
        let mut events = session.subscribe();

        let result = session.request_plan("add a card").await.unwrap();
        assert_eq!(result.created_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            events.try_recv(),
            Ok(ArrangeEvent::PlanApplied { created: 1, modified: 0, failed: 1 })
        ));

        let scene = session.into_scene();
        assert_eq!(scene.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_handle() {
        let mut session = ArrangeSession::new(MemoryScene::new(), ScriptedOracle::new());
        let stop = session.stop_handle();
        stop.stop();
        // A stale stop from before `run` is cleared; stop again from a task.
        let handle = session.stop_handle();
        let stopper = async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            handle.stop();
        };
        let (result, ()) = tokio::join!(session.run(), stopper);
        assert!(result.is_ok());
        assert_eq!(session.state(), TrackerState::Idle);
    }
}
