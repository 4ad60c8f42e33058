//! Iterative arrangement toward an intent.
//!
//! Each iteration captures the canvas, asks the oracle whether the intent is
//! met, and applies the corrections it proposes. Corrections for objects the
//! intent keeps fixed are dropped before anything is applied. The iteration
//! budget guarantees termination whatever the oracle answers.

use crate::error::ArrangeError;
use crate::events::{ArrangeEvent, EventSink};
use crate::executor::OperationExecutor;
use crate::intent::{Correction, Intent};
use crate::oracle::{RetryPolicy, SemanticOracle};
use crate::plan::Plan;
use crate::scene::SceneGraph;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Where a convergence run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConvergenceState {
    Running,
    /// The oracle reported the intent satisfied.
    Satisfied,
    /// The iteration budget ran out.
    Exhausted,
    /// The oracle was unsatisfied but proposed nothing.
    NoProgress,
}

impl ConvergenceState {
    pub fn is_terminal(self) -> bool {
        self != ConvergenceState::Running
    }
}

/// Result of one convergence run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceOutcome {
    pub state: ConvergenceState,
    pub iterations: usize,
    /// Issues from the last evaluation.
    pub issues: Vec<String>,
    /// Corrections that took effect.
    pub applied: usize,
    /// Corrections dropped because they targeted fixed objects.
    pub skipped: usize,
}

impl Default for ConvergenceOutcome {
    fn default() -> Self {
        Self {
            state: ConvergenceState::Running,
            iterations: 0,
            issues: Vec::new(),
            applied: 0,
            skipped: 0,
        }
    }
}

/// Drives the oracle and the executor until the intent is met.
pub struct ConvergenceLoop<'o, O: SemanticOracle + ?Sized> {
    oracle: &'o O,
    max_iterations: usize,
    settle_delay: Duration,
    retry: RetryPolicy,
}

impl<'o, O: SemanticOracle + ?Sized> ConvergenceLoop<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run until satisfied, stuck, or out of iterations.
    ///
    /// Oracle errors that survive the retry policy abort the run.
    pub async fn run<S: SceneGraph + ?Sized>(
        &self,
        scene: &mut S,
        executor: &mut OperationExecutor,
        intent: &Intent,
        events: &mut EventSink,
    ) -> Result<ConvergenceOutcome, ArrangeError> {
        let mut outcome = ConvergenceOutcome::default();

        for iteration in 1..=self.max_iterations {
            outcome.iterations = iteration;
            events.emit(ArrangeEvent::IterationStarted {
                iteration,
                max_iterations: self.max_iterations,
            });

            let snapshot = Snapshot::capture(&*scene)?;
            let evaluation = match self
                .retry
                .run("evaluate", || self.oracle.evaluate(intent, &snapshot))
                .await
            {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    events.emit(ArrangeEvent::OracleFailed { message: e.to_string() });
                    return Err(e.into());
                }
            };
            outcome.issues = evaluation.issues;

            if evaluation.intent_satisfied {
                outcome.state = ConvergenceState::Satisfied;
                break;
            }
            if evaluation.corrections.is_empty() {
                outcome.state = ConvergenceState::NoProgress;
                break;
            }

            let (rejected, allowed): (Vec<Correction>, Vec<Correction>) = evaluation
                .corrections
                .into_iter()
                .partition(|c| intent.is_fixed(&c.object_id));
            for correction in &rejected {
                log::warn!(
                    "Dropping correction for fixed object {} ({})",
                    correction.object_id,
                    correction.reasoning
                );
                events.emit(ArrangeEvent::CorrectionRejected {
                    object_id: correction.object_id.clone(),
                });
            }
            outcome.skipped += rejected.len();

            let plan = Plan::new(allowed.iter().map(Correction::to_operation).collect());
            let result = executor.apply_plan(scene, &plan)?;
            outcome.applied += result.modified_count;
            events.emit(ArrangeEvent::CorrectionsApplied {
                iteration,
                applied: result.modified_count,
                failed: result.errors.len(),
            });

            tokio::time::sleep(self.settle_delay).await;
        }

        if !outcome.state.is_terminal() {
            outcome.state = ConvergenceState::Exhausted;
        }
        log::info!(
            "Convergence finished: {:?} after {} iterations ({} applied, {} skipped)",
            outcome.state,
            outcome.iterations,
            outcome.applied,
            outcome.skipped
        );
        events.emit(ArrangeEvent::ConvergenceFinished {
            state: outcome.state,
            iterations: outcome.iterations,
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Evaluation;
    use crate::oracle::{OracleError, ScriptedOracle};
    use crate::scene::{MemoryScene, NodeKind};
    use kurbo::Rect;

    fn scene() -> (MemoryScene, String, String) {
        let mut scene = MemoryScene::new();
        let a = scene.insert(NodeKind::Rectangle, "A", Rect::new(100.0, 100.0, 200.0, 150.0));
        let b = scene.insert(NodeKind::Rectangle, "B", Rect::new(300.0, 105.0, 400.0, 155.0));
        (scene, a, b)
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_after_one_correction() {
        let (mut scene, a, b) = scene();
        let oracle = ScriptedOracle::from_evaluations([
            Evaluation::unsatisfied(vec!["A is not aligned".into()], vec![Correction::new(a.clone(), 100.0, 105.0)]),
            Evaluation::satisfied(),
        ]);
        let intent = Intent::new("align tops").with_movable([a.clone()]).with_fixed([b]);

        let outcome = ConvergenceLoop::new(&oracle)
            .run(&mut scene, &mut OperationExecutor::default(), &intent, &mut EventSink::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, ConvergenceState::Satisfied);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.applied, 1);
        assert_eq!(scene.node(&a).unwrap().y, 105.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_corrections_is_no_progress() {
        let (mut scene, _, _) = scene();
        let oracle = ScriptedOracle::from_evaluations([Evaluation::unsatisfied(vec!["stuck".into()], vec![])]);
        let outcome = ConvergenceLoop::new(&oracle)
            .run(&mut scene, &mut OperationExecutor::default(), &Intent::default(), &mut EventSink::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, ConvergenceState::NoProgress);
        assert_eq!(outcome.issues, vec!["stuck".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_error_aborts() {
        let (mut scene, _, _) = scene();
        let oracle = ScriptedOracle::new();
        oracle.push_evaluation(Err(OracleError::Rejected("quota".into())));
        let mut events = EventSink::new();
        let mut rx = events.subscribe();

        let result = ConvergenceLoop::new(&oracle)
            .run(&mut scene, &mut OperationExecutor::default(), &Intent::default(), &mut events)
            .await;
        assert!(matches!(result, Err(ArrangeError::Oracle(OracleError::Rejected(_)))));

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            saw_failure |= matches!(event, ArrangeEvent::OracleFailed { .. });
        }
        assert!(saw_failure);
    }
}
