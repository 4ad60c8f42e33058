//! Progress events for callers that display status.

use crate::convergence::ConvergenceState;
use crate::scene::NodeId;
use std::fmt;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Something the pipeline did that a caller may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrangeEvent {
    /// Tracking started with a baseline of this many objects
    TrackingStarted { objects: usize },
    /// Tracking stopped
    TrackingStopped,
    /// The user moved an object
    MovementDetected { object_id: NodeId, dx: f64, dy: f64 },
    /// The oracle described the layout goal
    IntentInferred { description: String },
    /// A convergence iteration began
    IterationStarted { iteration: usize, max_iterations: usize },
    /// A correction targeted a fixed object and was dropped
    CorrectionRejected { object_id: NodeId },
    /// Corrections from one iteration were applied
    CorrectionsApplied { iteration: usize, applied: usize, failed: usize },
    /// The convergence loop reached a terminal state
    ConvergenceFinished { state: ConvergenceState, iterations: usize },
    /// A plan was applied
    PlanApplied { created: usize, modified: usize, failed: usize },
    /// An oracle call failed after retries
    OracleFailed { message: String },
}

impl fmt::Display for ArrangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrackingStarted { objects } => write!(f, "Tracking {objects} objects"),
            Self::TrackingStopped => write!(f, "Tracking stopped"),
            Self::MovementDetected { object_id, dx, dy } => {
                write!(f, "Detected move of {object_id} by ({dx}, {dy})")
            }
            Self::IntentInferred { description } => write!(f, "Intent: {description}"),
            Self::IterationStarted {
                iteration,
                max_iterations,
            } => write!(f, "Arranging (iteration {iteration}/{max_iterations})"),
            Self::CorrectionRejected { object_id } => {
                write!(f, "Skipped correction for fixed object {object_id}")
            }
            Self::CorrectionsApplied {
                iteration,
                applied,
                failed,
            } => {
                write!(f, "Applied {applied} corrections in iteration {iteration}")?;
                if *failed > 0 {
                    write!(f, " ({failed} failed)")?;
                }
                Ok(())
            }
            Self::ConvergenceFinished { state, iterations } => match state {
                ConvergenceState::Satisfied => write!(f, "Layout satisfied after {iterations} iterations"),
                ConvergenceState::Exhausted => {
                    write!(f, "Stopped after {iterations} iterations without satisfying the layout")
                }
                ConvergenceState::NoProgress => {
                    write!(f, "No further corrections after {iterations} iterations")
                }
                ConvergenceState::Running => write!(f, "Arranging"),
            },
            Self::PlanApplied {
                created,
                modified,
                failed,
            } => write!(f, "Created {created}, modified {modified}, failed {failed}"),
            Self::OracleFailed { message } => write!(f, "Oracle error: {message}"),
        }
    }
}

/// Fan-out of events to every live subscriber.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Vec<UnboundedSender<ArrangeEvent>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new receiver for every future event.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ArrangeEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: ArrangeEvent) {
        log::debug!("{}", event);
        // Dropped receivers are pruned.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        let event = ArrangeEvent::CorrectionsApplied {
            iteration: 2,
            applied: 3,
            failed: 1,
        };
        assert_eq!(event.to_string(), "Applied 3 corrections in iteration 2 (1 failed)");
        let event = ArrangeEvent::ConvergenceFinished {
            state: ConvergenceState::Satisfied,
            iterations: 1,
        };
        assert_eq!(event.to_string(), "Layout satisfied after 1 iterations");
    }

    #[test]
    fn test_fan_out_and_prune() {
        let mut sink = EventSink::new();
        let mut kept = sink.subscribe();
        let dropped = sink.subscribe();
        drop(dropped);

        sink.emit(ArrangeEvent::TrackingStopped);
        assert_eq!(kept.try_recv().unwrap(), ArrangeEvent::TrackingStopped);
        assert_eq!(sink.subscribers.len(), 1);
    }
}
