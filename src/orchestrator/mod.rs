//! Run orchestration: serialization gates and the per-task pipeline.
//!
//! The orchestrator owns the end-to-end run for a task and the two gates
//! that serialize access to the fetch backend. Scheduled runs and
//! interactive previews never contend with each other; within each class,
//! at most one run is in flight at a time.

pub mod gate;
pub mod run;

pub use gate::RunGate;
pub use run::{Orchestrator, RunOutcome};
