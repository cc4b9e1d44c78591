//! The orchestration loop.
//!
//! One cycle: consult the control channel, scan, short-circuit when idle or
//! complete, ask the planner, dispatch exactly one collaborator, fold the
//! result into the Matrix and scaffold the next unit when everything is
//! locked. `Orchestrator::run` repeats cycles with the configured delays and
//! stops on STOP, a planner stop, or too many consecutive failures.

pub mod runner;
pub mod update;

pub use runner::{CycleOutcome, Orchestrator, RunSummary, StopReason};
