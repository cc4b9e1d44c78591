//! Boundary to the external planning, generation and validation services.
//!
//! The loop only sees these traits and the request/outcome types below. How a
//! collaborator composes prompts or talks to a text-generation provider is
//! its own business; `process` provides implementations that shell out to a
//! configured command and exchange JSON over stdin/stdout.

pub mod decision;
pub mod process;

pub use decision::{Assignment, Decision};
pub use process::{
    CommandEditor, CommandMemoryIndexer, CommandNarrator, CommandPlanner, CommandRunner,
    command_collaborators,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::matrix::Matrix;

/// The collaborator a decision is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    /// Writes and revises prose
    Narrator,
    /// Reviews a unit and returns a verdict
    Editor,
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Agent::Narrator => write!(f, "narrator"),
            Agent::Editor => write!(f, "editor"),
        }
    }
}

impl std::str::FromStr for Agent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "narrator" => Ok(Agent::Narrator),
            "editor" => Ok(Agent::Editor),
            _ => anyhow::bail!("Unknown agent '{}'. Valid values: narrator, editor", s),
        }
    }
}

/// Action requested by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Generate,
    #[serde(alias = "fix")]
    Edit,
    Wait,
    Stop,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Generate => write!(f, "generate"),
            ActionType::Edit => write!(f, "edit"),
            ActionType::Wait => write!(f, "wait"),
            ActionType::Stop => write!(f, "stop"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generate" => Ok(ActionType::Generate),
            "edit" | "fix" => Ok(ActionType::Edit),
            "wait" => Ok(ActionType::Wait),
            "stop" => Ok(ActionType::Stop),
            _ => anyhow::bail!(
                "Unknown action '{}'. Valid values: generate, edit, wait, stop",
                s
            ),
        }
    }
}

/// One-shot operator instruction handed to the planner for a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub instruction: Option<String>,
    pub force_target: Option<String>,
}

/// Whether the narrator drafts new prose or repairs a failed review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Draft,
    Fix,
}

impl From<ActionType> for GenerationMode {
    fn from(action: ActionType) -> Self {
        match action {
            ActionType::Edit => GenerationMode::Fix,
            _ => GenerationMode::Draft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub target_file: String,
    pub action: ActionType,
    pub mode: GenerationMode,
    pub context_notes: String,
    /// Editor notes from the last failed review, for fix passes
    #[serde(default)]
    pub editor_notes: Vec<String>,
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub target_file: String,
    pub context_notes: String,
    pub project_root: PathBuf,
}

/// Status reported by a generation or validation collaborator. Anything
/// other than `success` is a no-op failure for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    Success,
    Warning,
    #[serde(other)]
    Error,
}

impl std::fmt::Display for CollaboratorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorStatus::Success => write!(f, "success"),
            CollaboratorStatus::Warning => write!(f, "warning"),
            CollaboratorStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub status: CollaboratorStatus,
    #[serde(default)]
    pub modified_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerationOutcome {
    pub fn success(modified_files: Vec<String>) -> Self {
        Self {
            status: CollaboratorStatus::Success,
            modified_files,
            operation_mode: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CollaboratorStatus::Error,
            modified_files: Vec::new(),
            operation_mode: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    #[default]
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: CollaboratorStatus,
    /// A success without a verdict counts as FAIL
    #[serde(default)]
    pub verdict: Verdict,
    #[serde(default, alias = "notes")]
    pub editor_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn pass() -> Self {
        Self {
            status: CollaboratorStatus::Success,
            verdict: Verdict::Pass,
            editor_notes: Vec::new(),
            message: None,
        }
    }

    pub fn fail(notes: Vec<String>) -> Self {
        Self {
            status: CollaboratorStatus::Success,
            verdict: Verdict::Fail,
            editor_notes: notes,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CollaboratorStatus::Error,
            verdict: Verdict::Fail,
            editor_notes: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Decides what the loop does next.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        matrix: &Matrix,
        override_request: Option<&OverrideRequest>,
    ) -> Result<Decision>;
}

/// Writes or repairs prose for one unit.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome>;
}

/// Reviews one unit for continuity.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome>;
}

/// The set of collaborators one orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub narrator: Arc<dyn Generator>,
    pub editor: Arc<dyn Validator>,
}
