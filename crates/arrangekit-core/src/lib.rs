//! ArrangeKit Core Library
//!
//! Arrangement pipeline for 2-D design canvases: detect what the user moved,
//! compute exact positions from spatial relationships, converge the canvas
//! toward a layout intent, and apply plans of add/modify operations to a
//! host scene graph.

pub mod config;
pub mod convergence;
pub mod error;
pub mod events;
pub mod executor;
pub mod fonts;
pub mod intent;
pub mod layout;
pub mod movement;
pub mod oracle;
pub mod plan;
pub mod resolver;
pub mod scene;
pub mod session;
pub mod snapshot;
pub mod tracker;

pub use config::{ArrangeConfig, ConfigError, RetryConfig};
pub use convergence::{ConvergenceLoop, ConvergenceOutcome, ConvergenceState};
pub use error::{ArrangeError, ArrangeResult};
pub use events::{ArrangeEvent, EventSink};
pub use executor::{ExecutionResult, OperationError, OperationExecutor};
pub use fonts::{FontError, FontFallback, FontLoader};
pub use intent::{Correction, Evaluation, Intent};
pub use layout::{Alignment, Relationship, position, target_rect};
pub use movement::{Movement, MovementDetector, detect_movement, detect_movements};
pub use oracle::{OracleError, OracleResult, RetryPolicy, ScriptedOracle, SemanticOracle};
pub use plan::{Action, GeometrySpec, Operation, Placement, Plan, PlanError, StyleSpec, ValidationError};
pub use resolver::{NodeResolver, ResolveError};
pub use scene::{Color, FontName, MemoryScene, NodeId, NodeKind, SceneError, SceneGraph, SceneNode};
pub use session::{ArrangeSession, StopHandle};
pub use snapshot::{Snapshot, SnapshotObject};
pub use tracker::{Tracker, TrackerState};
