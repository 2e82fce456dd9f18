//! Playbook automation: trigger evaluation, action execution, and the
//! execution audit trail.

pub mod defaults;
pub mod engine;
pub mod executor;
pub mod gateways;
pub mod model;
pub mod recorder;
pub mod store;

pub use engine::PlaybookEngine;
pub use executor::{ExecutionResult, PlaybookExecutor};
pub use gateways::Gateways;
pub use model::{Action, ActionOutcome, NewPlaybook, OutcomeStatus, Playbook, Trigger};
pub use recorder::ExecutionRecorder;
pub use store::PlaybookStore;
