//! Operator control: run / pause / stop and one-shot planner overrides.
//!
//! The operator is the only writer of `system_status` and the only one who
//! activates an override; the loop only ever clears the override after it
//! has handed it to one planning call.

pub mod file;
pub mod shared;

pub use file::FileControl;
pub use shared::SharedControl;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborators::OverrideRequest;
use crate::errors::ControlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    #[default]
    #[serde(alias = "running")]
    Running,
    #[serde(alias = "paused")]
    Paused,
    #[serde(alias = "stop", alias = "STOPPED")]
    Stop,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Running => write!(f, "RUNNING"),
            SystemStatus::Paused => write!(f, "PAUSED"),
            SystemStatus::Stop => write!(f, "STOP"),
        }
    }
}

/// One-shot instruction for the next planning call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectOverride {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub force_target: Option<String>,
}

impl ArchitectOverride {
    /// The pending request, if the override is active.
    pub fn request(&self) -> Option<OverrideRequest> {
        self.active.then(|| OverrideRequest {
            instruction: self.instruction.clone(),
            force_target: self.force_target.clone(),
        })
    }

    /// Whether this signal is still the active override that `delivered`
    /// was taken from. A replacement queued since then does not match.
    pub fn is_delivery_of(&self, delivered: &OverrideRequest) -> bool {
        self.active
            && self.instruction == delivered.instruction
            && self.force_target == delivered.force_target
    }
}

/// Contents of `control.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDocument {
    #[serde(default)]
    pub system_status: SystemStatus,
    #[serde(default, rename = "architect_override")]
    pub override_signal: ArchitectOverride,
}

impl ControlDocument {
    pub fn pending_override(&self) -> Option<OverrideRequest> {
        self.override_signal.request()
    }
}

/// Where the loop reads operator intent from.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Current control state.
    async fn read(&self) -> Result<ControlDocument, ControlError>;

    /// Retire `delivered` after it reached a planner: reset the signal to
    /// inactive, unless the operator has queued a different override since.
    async fn consume_override(&self, delivered: &OverrideRequest) -> Result<(), ControlError>;
}
