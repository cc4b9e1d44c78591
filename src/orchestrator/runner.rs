use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::update::{apply_verdict, clear_continuity_flag, set_paused};
use crate::collaborators::{
    ActionType, Agent, Assignment, CollaboratorStatus, Collaborators, Decision, GenerationRequest,
    OverrideRequest, ValidationRequest,
};
use crate::config::ProjectContext;
use crate::control::{ControlChannel, ControlDocument, SystemStatus};
use crate::errors::OrchestratorError;
use crate::matrix::{ActiveTask, Matrix, MatrixStore, ProjectStatus};
use crate::outline::{Outline, scaffold_next_unit};
use crate::scanner::{MemoryIndex, Scanner};

/// Why the loop ended without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The control document said STOP
    ControlStop,
    /// The planner returned a stop decision
    PlannerStop(String),
    /// `run_cycles` reached its limit
    CycleLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ControlStop => write!(f, "stop requested via control document"),
            StopReason::PlannerStop(reason) if reason.is_empty() => {
                write!(f, "planner requested stop")
            }
            StopReason::PlannerStop(reason) => write!(f, "planner requested stop: {}", reason),
            StopReason::CycleLimit => write!(f, "cycle limit reached"),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Stopped(StopReason),
    /// Every unit is LOCKED; nothing was planned
    Complete,
    /// No override and nothing actionable; planning was skipped
    Idle,
    /// The planner asked to wait, or failed and the cycle was skipped
    Waited { reason: String },
    /// One collaborator was invoked. `success` is false for handled failures.
    Dispatched {
        agent: Agent,
        target: String,
        success: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub dispatches: u64,
    pub stop_reason: StopReason,
}

enum ControlState {
    Stop,
    Proceed(Option<OverrideRequest>),
}

/// The long-lived plan → dispatch → update loop for one project.
pub struct Orchestrator {
    ctx: ProjectContext,
    scanner: Scanner,
    store: MatrixStore,
    control: Arc<dyn ControlChannel>,
    collaborators: Collaborators,
    consecutive_errors: u32,
}

impl Orchestrator {
    pub fn new(
        ctx: ProjectContext,
        control: Arc<dyn ControlChannel>,
        collaborators: Collaborators,
        memory: Arc<dyn MemoryIndex>,
    ) -> Self {
        let scanner = Scanner::new(&ctx, memory);
        let store = MatrixStore::new(ctx.matrix_file.clone());
        Self {
            ctx,
            scanner,
            store,
            control,
            collaborators,
            consecutive_errors: 0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Run until STOP, a planner stop, or too many consecutive failures.
    pub async fn run(&mut self) -> Result<RunSummary, OrchestratorError> {
        self.run_cycles(None).await
    }

    /// Like `run`, but ends after `limit` cycles when one is given.
    pub async fn run_cycles(&mut self, limit: Option<u64>) -> Result<RunSummary, OrchestratorError> {
        let settings = self.ctx.settings.loop_settings.clone();
        let mut cycles = 0u64;
        let mut dispatches = 0u64;
        info!(project = %self.ctx.name(), root = %self.ctx.root.display(), "orchestrator started");

        loop {
            if limit.is_some_and(|max| cycles >= max) {
                return Ok(self.finish(cycles, dispatches, StopReason::CycleLimit));
            }
            cycles += 1;

            let delay = match self.step().await {
                Ok(outcome) => {
                    self.consecutive_errors = 0;
                    match outcome {
                        CycleOutcome::Stopped(reason) => {
                            return Ok(self.finish(cycles, dispatches, reason));
                        }
                        CycleOutcome::Dispatched { .. } => {
                            dispatches += 1;
                            settings.cycle_delay()
                        }
                        CycleOutcome::Complete
                        | CycleOutcome::Idle
                        | CycleOutcome::Waited { .. } => settings.idle_delay(),
                    }
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    error!(
                        cycle = cycles,
                        failures = self.consecutive_errors,
                        error = %e,
                        "cycle failed"
                    );
                    if self.consecutive_errors >= settings.max_consecutive_errors {
                        error!(
                            count = self.consecutive_errors,
                            "too many consecutive failures, shutting down"
                        );
                        return Err(OrchestratorError::ConsecutiveFailures {
                            count: self.consecutive_errors,
                            last_error: e.to_string(),
                        });
                    }
                    settings.error_backoff()
                }
            };
            sleep(delay).await;
        }
    }

    fn finish(&self, cycles: u64, dispatches: u64, stop_reason: StopReason) -> RunSummary {
        info!(cycles, dispatches, reason = %stop_reason, "orchestrator stopped");
        RunSummary {
            cycles,
            dispatches,
            stop_reason,
        }
    }

    /// Execute one cycle: control, scan, plan, dispatch, update.
    pub async fn step(&mut self) -> Result<CycleOutcome, OrchestratorError> {
        // Phase 0: control
        let override_request = match self.check_control().await? {
            ControlState::Stop => {
                info!(phase = "control", "STOP received");
                return Ok(CycleOutcome::Stopped(StopReason::ControlStop));
            }
            ControlState::Proceed(request) => request,
        };

        // Phase 1: scan
        let matrix = self.scanner.scan()?;
        if matrix.is_complete() {
            debug!(phase = "scan", "all units locked");
            self.maybe_scaffold(&matrix);
            return Ok(CycleOutcome::Complete);
        }
        let auto_continue = self.ctx.settings.loop_settings.auto_continue_drafting;
        if override_request.is_none() && !matrix.has_actionable_work(auto_continue) {
            debug!(phase = "scan", "no actionable work, skipping planning");
            return Ok(CycleOutcome::Idle);
        }

        // Phase 2: plan
        let decision = self.plan(&matrix, override_request.as_ref()).await?;
        let assignment = match decision {
            Decision::Stop { reason } => {
                info!(phase = "plan", reason = %reason, "planner requested stop");
                return Ok(CycleOutcome::Stopped(StopReason::PlannerStop(reason)));
            }
            Decision::Wait { reason } => {
                info!(phase = "plan", reason = %reason, "planner requested wait");
                return Ok(CycleOutcome::Waited { reason });
            }
            Decision::Dispatch(assignment) => assignment,
        };

        // Phases 3 and 4: dispatch and update
        self.dispatch(&matrix, assignment).await
    }

    /// Read the control document, blocking while it says PAUSED.
    async fn check_control(&self) -> Result<ControlState, OrchestratorError> {
        let poll = self.ctx.settings.loop_settings.pause_poll();
        let mut paused = false;
        loop {
            let doc = match self.control.read().await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(phase = "control", error = %e, "unreadable control document, treating as RUNNING");
                    ControlDocument::default()
                }
            };
            match doc.system_status {
                SystemStatus::Stop => return Ok(ControlState::Stop),
                SystemStatus::Paused => {
                    if !paused {
                        info!(phase = "control", "paused by operator, waiting");
                        self.store.update(|m| {
                            set_paused(m, true);
                        })?;
                        paused = true;
                    }
                    sleep(poll).await;
                }
                SystemStatus::Running => {
                    if paused {
                        info!(phase = "control", "resumed by operator");
                    }
                    self.lift_pause()?;
                    return Ok(ControlState::Proceed(doc.pending_override()));
                }
            }
        }
    }

    /// Restore ACTIVE if the Matrix still carries a mirrored pause.
    fn lift_pause(&self) -> Result<(), OrchestratorError> {
        let matrix = self.store.load()?;
        if matrix.meta.project_status == ProjectStatus::Paused {
            self.store.update(|m| {
                set_paused(m, false);
            })?;
        }
        Ok(())
    }

    /// Call the planner, then retire the override it was given whether or not
    /// the call succeeded. A planner failure skips the cycle like a wait.
    async fn plan(
        &self,
        matrix: &Matrix,
        override_request: Option<&OverrideRequest>,
    ) -> Result<Decision, OrchestratorError> {
        if let Some(request) = override_request {
            info!(
                phase = "plan",
                instruction = request.instruction.as_deref().unwrap_or(""),
                target = request.force_target.as_deref().unwrap_or(""),
                "planning with operator override"
            );
        }
        let result = self.collaborators.planner.plan(matrix, override_request).await;
        if let Some(request) = override_request {
            self.control.consume_override(request).await?;
        }
        match result {
            Ok(decision) => Ok(decision),
            Err(e) => {
                error!(
                    phase = "plan",
                    error = %format!("{:#}", e),
                    with_override = override_request.is_some(),
                    "planner failed, skipping cycle"
                );
                Ok(Decision::wait(format!("planner failed: {:#}", e)))
            }
        }
    }

    async fn dispatch(
        &self,
        matrix: &Matrix,
        assignment: Assignment,
    ) -> Result<CycleOutcome, OrchestratorError> {
        let Assignment {
            action,
            agent,
            target_file,
            context_notes,
        } = assignment;
        let unit_id = matrix.resolve_target(&target_file);
        let unit = unit_id.as_deref().unwrap_or(&target_file);

        let task = ActiveTask::new(agent, &target_file, action);
        info!(
            phase = "dispatch",
            task_id = %task.task_id,
            agent = %agent,
            action = %action,
            target = %target_file,
            "dispatching"
        );
        self.store.update(|m| m.active_task = Some(task))?;

        let project_root = self.ctx.root.clone();
        // Exactly one collaborator per cycle; the exhaustive match is the routing table.
        let verdict = match agent {
            Agent::Narrator => {
                let editor_notes = unit_id
                    .as_ref()
                    .and_then(|id| matrix.content.get(id))
                    .map(|r| r.editor_notes.clone())
                    .unwrap_or_default();
                let request = GenerationRequest {
                    target_file: target_file.clone(),
                    action,
                    mode: action.into(),
                    context_notes,
                    editor_notes,
                    project_root,
                };
                match self.collaborators.narrator.generate(&request).await {
                    Ok(outcome) if outcome.status == CollaboratorStatus::Success => {
                        debug!(files = ?outcome.modified_files, mode = ?outcome.operation_mode, "narrator finished");
                        Ok(None)
                    }
                    Ok(outcome) => Err(format!(
                        "narrator returned {}: {}",
                        outcome.status,
                        outcome.message.unwrap_or_default()
                    )),
                    Err(e) => Err(format!("narrator failed: {:#}", e)),
                }
            }
            Agent::Editor => {
                let request = ValidationRequest {
                    target_file: target_file.clone(),
                    context_notes,
                    project_root,
                };
                match self.collaborators.editor.validate(&request).await {
                    Ok(outcome) if outcome.status == CollaboratorStatus::Success => {
                        Ok(Some((outcome.verdict, outcome.editor_notes)))
                    }
                    Ok(outcome) => Err(format!(
                        "editor returned {}: {}",
                        outcome.status,
                        outcome.message.unwrap_or_default()
                    )),
                    Err(e) => Err(format!("editor failed: {:#}", e)),
                }
            }
        };

        // Phase 4: update
        let failure = verdict.as_ref().err().cloned();
        let mut unresolved = false;
        self.store.update(|m| {
            m.active_task = None;
            let Ok(verdict) = verdict else {
                return;
            };
            match (&unit_id, verdict) {
                (Some(id), Some((verdict, notes))) => {
                    apply_verdict(m, id, verdict, notes);
                }
                (None, Some(_)) => unresolved = true,
                (Some(id), None) if action == ActionType::Edit => {
                    clear_continuity_flag(m, id);
                }
                _ => {}
            }
        })?;

        if let Some(reason) = failure {
            warn!(phase = "update", agent = %agent, target = %target_file, error = %reason, "dispatch failed, unit left unchanged");
            return Ok(CycleOutcome::Dispatched {
                agent,
                target: target_file,
                success: false,
            });
        }
        if unresolved {
            warn!(phase = "update", target = %target_file, "verdict for unknown unit ignored");
        }

        let matrix = self.scanner.scan()?;
        self.maybe_scaffold(&matrix);
        info!(phase = "update", agent = %agent, unit = %unit, "dispatch complete");
        Ok(CycleOutcome::Dispatched {
            agent,
            target: target_file,
            success: true,
        })
    }

    /// Create the next planned unit once everything is locked. Failures are
    /// logged; the unit will be attempted again on a later cycle.
    fn maybe_scaffold(&self, matrix: &Matrix) {
        if !matrix.all_locked() {
            return;
        }
        let default_units = self.ctx.settings.scanner.default_planned_units;
        let outline = match Outline::load(&self.ctx.story_brief_file, default_units) {
            Ok(outline) => outline,
            Err(e) => {
                warn!(phase = "update", error = %format!("{:#}", e), "cannot read outline, not scaffolding");
                return;
            }
        };
        match scaffold_next_unit(&self.ctx.manuscripts_dir, matrix, &outline) {
            Ok(Some((unit, _))) => {
                info!(phase = "update", unit = %unit.unit_id, title = %unit.title, "next unit ready")
            }
            Ok(None) => debug!(
                phase = "update",
                planned = outline.planned_units(),
                "no further units planned"
            ),
            Err(e) => warn!(phase = "update", error = %format!("{:#}", e), "failed to scaffold next unit"),
        }
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
