//! Convergence loop behavior with scripted and adversarial oracles.

use arrangekit_core::oracle::BoxFuture;
use arrangekit_core::{
    ArrangeConfig, ArrangeEvent, ArrangeSession, ConvergenceLoop, ConvergenceState, Correction, EventSink,
    Evaluation, Intent, MemoryScene, Movement, NodeKind, OperationExecutor, OracleError, OracleResult, Plan,
    RetryPolicy, SceneGraph, ScriptedOracle, SemanticOracle, Snapshot, TrackerState,
};
use kurbo::Rect;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Always unsatisfied; tries to move every object, fixed ones included.
struct StubbornOracle {
    evaluations: AtomicUsize,
}

impl SemanticOracle for StubbornOracle {
    fn infer_intent(&self, movement: &Movement, _snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Intent>> {
        let moved = movement.object_id.clone();
        Box::pin(async move { Ok(Intent::new("stubborn").with_fixed([moved])) })
    }

    fn evaluate(&self, _intent: &Intent, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Evaluation>> {
        let corrections = snapshot
            .objects
            .iter()
            .map(|o| Correction::new(o.id.clone(), (o.x + 10) as f64, o.y as f64))
            .collect();
        Box::pin(async move {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Ok(Evaluation::unsatisfied(vec!["still wrong".into()], corrections))
        })
    }

    fn plan(&self, _request: &str, _snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Plan>> {
        Box::pin(async { Err(OracleError::Rejected("no plans".into())) })
    }
}

fn three_boxes() -> (MemoryScene, Vec<String>) {
    let mut scene = MemoryScene::new();
    let ids = (0..3)
        .map(|i| {
            let x = i as f64 * 100.0;
            scene.insert(NodeKind::Rectangle, &format!("Box {i}"), Rect::new(x, 0.0, x + 50.0, 50.0))
        })
        .collect();
    (scene, ids)
}

#[tokio::test(start_paused = true)]
async fn adversarial_oracle_terminates_within_budget_and_never_moves_fixed_objects() {
    let (mut scene, ids) = three_boxes();
    let oracle = StubbornOracle {
        evaluations: AtomicUsize::new(0),
    };
    let intent = Intent::new("row")
        .with_movable([ids[1].clone(), ids[2].clone()])
        .with_fixed([ids[0].clone()]);
    let fixed_before = scene.node(&ids[0]).unwrap().position();

    let mut events = EventSink::new();
    let mut rx = events.subscribe();
    let outcome = ConvergenceLoop::new(&oracle)
        .with_max_iterations(4)
        .run(&mut scene, &mut OperationExecutor::default(), &intent, &mut events)
        .await
        .unwrap();

    assert_eq!(outcome.state, ConvergenceState::Exhausted);
    assert_eq!(outcome.iterations, 4);
    assert_eq!(oracle.evaluations.load(Ordering::SeqCst), 4);
    assert_eq!(outcome.skipped, 4);
    assert_eq!(outcome.applied, 8);
    assert_eq!(scene.node(&ids[0]).unwrap().position(), fixed_before);
    assert_eq!(scene.node(&ids[1]).unwrap().x, 140.0);

    let mut rejected = 0;
    while let Ok(event) = rx.try_recv() {
        if let ArrangeEvent::CorrectionRejected { object_id } = event {
            assert_eq!(object_id, ids[0]);
            rejected += 1;
        }
    }
    assert_eq!(rejected, 4);
}

#[tokio::test(start_paused = true)]
async fn transient_oracle_failures_are_retried() {
    let (mut scene, _) = three_boxes();
    let oracle = ScriptedOracle::new();
    oracle.push_evaluation(Err(OracleError::RateLimited { retry_after: None }));
    oracle.push_evaluation(Ok(Evaluation::satisfied()));

    let outcome = ConvergenceLoop::new(&oracle)
        .run(&mut scene, &mut OperationExecutor::default(), &Intent::default(), &mut EventSink::new())
        .await
        .unwrap();
    assert_eq!(outcome.state, ConvergenceState::Satisfied);
    assert_eq!(outcome.iterations, 1);
}

#[tokio::test(start_paused = true)]
async fn retries_exhausted_abort_the_loop() {
    let (mut scene, _) = three_boxes();
    let oracle = ScriptedOracle::new().repeating(Evaluation::satisfied());
    for _ in 0..2 {
        oracle.push_evaluation(Err(OracleError::Server { status: 500 }));
    }

    let result = ConvergenceLoop::new(&oracle)
        .with_retry(RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        })
        .run(&mut scene, &mut OperationExecutor::default(), &Intent::default(), &mut EventSink::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn every_evaluation_sees_the_current_canvas() {
    let (mut scene, ids) = three_boxes();
    let oracle = ScriptedOracle::from_evaluations([
        Evaluation::unsatisfied(vec![], vec![Correction::new(ids[2].clone(), 0.0, 300.0)]),
        Evaluation::satisfied(),
    ]);
    let intent = Intent::new("stack").with_movable([ids[2].clone()]);

    ConvergenceLoop::new(&oracle)
        .with_settle_delay(Duration::from_millis(50))
        .run(&mut scene, &mut OperationExecutor::default(), &intent, &mut EventSink::new())
        .await
        .unwrap();

    let seen = oracle.seen_snapshots();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].get(&ids[2]).unwrap().y, 0);
    assert_eq!(seen[1].get(&ids[2]).unwrap().y, 300);
}

#[tokio::test(start_paused = true)]
async fn session_tick_pins_the_moved_object_and_returns_to_tracking() {
    let (scene, ids) = three_boxes();
    let oracle = StubbornOracle {
        evaluations: AtomicUsize::new(0),
    };
    let config = ArrangeConfig {
        max_iterations: 2,
        ..ArrangeConfig::default()
    };
    let mut session = ArrangeSession::with_config(scene, oracle, config);
    session.start_tracking().unwrap();

    session.scene_mut().set_position(&ids[1], 100.0, 400.0).unwrap();
    let outcome = session.tick().await.unwrap().unwrap();

    assert_eq!(outcome.state, ConvergenceState::Exhausted);
    // The moved object was pinned by the session.
    assert_eq!(session.scene().node(&ids[1]).unwrap().y, 400.0);
    assert_eq!(session.scene().node(&ids[1]).unwrap().x, 100.0);
    assert_eq!(session.state(), TrackerState::Tracking);
    assert_eq!(session.tick().await.unwrap(), None);
}
