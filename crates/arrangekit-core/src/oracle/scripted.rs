//! Oracle that replays queued responses.

use super::{BoxFuture, OracleError, OracleResult, SemanticOracle};
use crate::intent::{Evaluation, Intent};
use crate::movement::Movement;
use crate::plan::Plan;
use crate::snapshot::Snapshot;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays responses in the order they were queued, for tests and offline
/// replays of recorded sessions.
///
/// Once the evaluation queue is empty, the `repeat` evaluation (if set) is
/// returned for every further call.
#[derive(Default)]
pub struct ScriptedOracle {
    intents: Mutex<VecDeque<OracleResult<Intent>>>,
    evaluations: Mutex<VecDeque<OracleResult<Evaluation>>>,
    plans: Mutex<VecDeque<OracleResult<Plan>>>,
    repeat: Option<Evaluation>,
    seen: Mutex<Vec<Snapshot>>,
}

fn lock_error<T>(e: std::sync::PoisonError<T>) -> OracleError {
    OracleError::Transport(format!("Lock error: {}", e))
}

fn next<T>(queue: &Mutex<VecDeque<OracleResult<T>>>, what: &str) -> OracleResult<T> {
    queue
        .lock()
        .map_err(lock_error)?
        .pop_front()
        .unwrap_or_else(|| Err(OracleError::InvalidResponse(format!("no scripted {what} left"))))
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue evaluations to be returned in order.
    pub fn from_evaluations(evaluations: impl IntoIterator<Item = Evaluation>) -> Self {
        let oracle = Self::new();
        for evaluation in evaluations {
            oracle.push_evaluation(Ok(evaluation));
        }
        oracle
    }

    /// Return `evaluation` forever once the queue runs dry.
    pub fn repeating(mut self, evaluation: Evaluation) -> Self {
        self.repeat = Some(evaluation);
        self
    }

    pub fn push_intent(&self, response: OracleResult<Intent>) {
        if let Ok(mut queue) = self.intents.lock() {
            queue.push_back(response);
        }
    }

    pub fn push_evaluation(&self, response: OracleResult<Evaluation>) {
        if let Ok(mut queue) = self.evaluations.lock() {
            queue.push_back(response);
        }
    }

    pub fn push_plan(&self, response: OracleResult<Plan>) {
        if let Ok(mut queue) = self.plans.lock() {
            queue.push_back(response);
        }
    }

    /// Snapshots passed to the oracle so far, oldest first.
    pub fn seen_snapshots(&self) -> Vec<Snapshot> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, snapshot: &Snapshot) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(snapshot.clone());
        }
    }
}

impl SemanticOracle for ScriptedOracle {
    fn infer_intent(&self, _movement: &Movement, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Intent>> {
        self.record(snapshot);
        Box::pin(async move { next(&self.intents, "intent") })
    }

    fn evaluate(&self, _intent: &Intent, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Evaluation>> {
        self.record(snapshot);
        Box::pin(async move {
            let queued = self.evaluations.lock().map_err(lock_error)?.pop_front();
            match (queued, &self.repeat) {
                (Some(response), _) => response,
                (None, Some(evaluation)) => Ok(evaluation.clone()),
                (None, None) => Err(OracleError::InvalidResponse("no scripted evaluation left".into())),
            }
        })
    }

    fn plan(&self, _request: &str, snapshot: &Snapshot) -> BoxFuture<'_, OracleResult<Plan>> {
        self.record(snapshot);
        Box::pin(async move { next(&self.plans, "plan") })
    }
}
