//! Engine configuration read from `textcraft.toml` at the project root.
//!
//! Settings are layered: file → environment → CLI. Every field has a default,
//! so a missing file or a partial file is always valid.
//!
//! # Configuration File Format
//!
//! ```toml
//! [loop]
//! cycle_delay_secs = 2
//! idle_delay_secs = 10
//! pause_poll_secs = 1
//! error_backoff_secs = 5
//! max_consecutive_errors = 3
//! auto_continue_drafting = false
//!
//! [scanner]
//! target_word_count = 2000
//! min_word_count = 50
//! incomplete_markers = ["[TODO]", "[INCOMPLETE]"]
//! extensions = ["md", "txt"]
//! default_planned_units = 10
//!
//! [collaborators]
//! planner_cmd = ["textcraft-architect"]
//! narrator_cmd = ["textcraft-narrator"]
//! editor_cmd = ["textcraft-editor"]
//! memory_cmd = []
//! timeout_secs = 900
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name of the engine configuration, relative to the project root.
pub const CONFIG_FILE: &str = "textcraft.toml";

/// Orchestration loop timing and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopSection {
    /// Delay between productive cycles
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,
    /// Delay when idle, COMPLETE, or when the planner asks to wait
    #[serde(default = "default_idle_delay_secs")]
    pub idle_delay_secs: u64,
    /// Re-poll interval while the control document says PAUSED
    #[serde(default = "default_pause_poll_secs")]
    pub pause_poll_secs: u64,
    /// Delay after a cycle fails with an uncaught error
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Consecutive uncaught failures before the loop shuts down
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Treat DRAFTING units as actionable work
    #[serde(default)]
    pub auto_continue_drafting: bool,
}

fn default_cycle_delay_secs() -> u64 {
    2
}

fn default_idle_delay_secs() -> u64 {
    10
}

fn default_pause_poll_secs() -> u64 {
    1
}

fn default_error_backoff_secs() -> u64 {
    5
}

fn default_max_consecutive_errors() -> u32 {
    3
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            cycle_delay_secs: default_cycle_delay_secs(),
            idle_delay_secs: default_idle_delay_secs(),
            pause_poll_secs: default_pause_poll_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
            auto_continue_drafting: false,
        }
    }
}

impl LoopSection {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.idle_delay_secs)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_secs(self.pause_poll_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Status inference settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerSection {
    /// Fallback target length when project_conf.json does not set one
    #[serde(default = "default_target_word_count")]
    pub target_word_count: usize,
    /// Units below this many words are EMPTY
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,
    /// Text markers that keep a unit in DRAFTING
    #[serde(default = "default_incomplete_markers")]
    pub incomplete_markers: Vec<String>,
    /// File extensions (without dot) treated as content units
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Planned unit count when the story brief has no structure
    #[serde(default = "default_planned_units")]
    pub default_planned_units: usize,
}

fn default_target_word_count() -> usize {
    2000
}

fn default_min_word_count() -> usize {
    50
}

fn default_incomplete_markers() -> Vec<String> {
    vec!["[TODO]".to_string(), "[INCOMPLETE]".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "txt".to_string()]
}

fn default_planned_units() -> usize {
    10
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            target_word_count: default_target_word_count(),
            min_word_count: default_min_word_count(),
            incomplete_markers: default_incomplete_markers(),
            extensions: default_extensions(),
            default_planned_units: default_planned_units(),
        }
    }
}

/// External commands backing the collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaboratorsSection {
    #[serde(default = "default_planner_cmd")]
    pub planner_cmd: Vec<String>,
    #[serde(default = "default_narrator_cmd")]
    pub narrator_cmd: Vec<String>,
    #[serde(default = "default_editor_cmd")]
    pub editor_cmd: Vec<String>,
    /// Retrieval-memory indexer; empty disables indexing
    #[serde(default)]
    pub memory_cmd: Vec<String>,
    /// Wall-clock limit for one collaborator invocation
    #[serde(default = "default_collaborator_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collaborator_timeout_secs() -> u64 {
    900
}

fn default_planner_cmd() -> Vec<String> {
    vec!["textcraft-architect".to_string()]
}

fn default_narrator_cmd() -> Vec<String> {
    vec!["textcraft-narrator".to_string()]
}

fn default_editor_cmd() -> Vec<String> {
    vec!["textcraft-editor".to_string()]
}

impl Default for CollaboratorsSection {
    fn default() -> Self {
        Self {
            planner_cmd: default_planner_cmd(),
            narrator_cmd: default_narrator_cmd(),
            editor_cmd: default_editor_cmd(),
            memory_cmd: Vec::new(),
            timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// The complete textcraft.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineToml {
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSection,
    #[serde(default)]
    pub scanner: ScannerSection,
    #[serde(default)]
    pub collaborators: CollaboratorsSection,
}

impl EngineToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse textcraft.toml")
    }

    /// Load `textcraft.toml` from the project root, or defaults when absent.
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize textcraft.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var("AUTO_CONTINUE_DRAFTING") {
            self.loop_settings.auto_continue_drafting = parse_flag(&value);
        }
        if let Some(target) = std::env::var("TEXTCRAFT_TARGET_WORDS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.scanner.target_word_count = target;
        }
        self
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.loop_settings.cycle_delay_secs == 0 {
            warnings.push("loop.cycle_delay_secs is 0: cycles will run back to back".to_string());
        }
        if self.loop_settings.pause_poll_secs == 0 {
            warnings.push("loop.pause_poll_secs is 0: a paused loop will spin".to_string());
        }
        if self.loop_settings.max_consecutive_errors == 0 {
            warnings.push(
                "loop.max_consecutive_errors is 0: the first failure stops the loop".to_string(),
            );
        }
        if self.scanner.min_word_count >= self.scanner.target_word_count {
            warnings.push(format!(
                "scanner.min_word_count ({}) is not below target_word_count ({}): no unit can become REVIEW_READY without first counting as EMPTY",
                self.scanner.min_word_count, self.scanner.target_word_count
            ));
        }
        if self.scanner.extensions.is_empty() {
            warnings.push("scanner.extensions is empty: no content units will be found".to_string());
        }
        if self.collaborators.timeout_secs == 0 {
            warnings.push("collaborators.timeout_secs is 0: every invocation will time out".to_string());
        }
        for (name, cmd) in [
            ("planner_cmd", &self.collaborators.planner_cmd),
            ("narrator_cmd", &self.collaborators.narrator_cmd),
            ("editor_cmd", &self.collaborators.editor_cmd),
        ] {
            if cmd.is_empty() {
                warnings.push(format!("collaborators.{} is empty", name));
            }
        }

        warnings
    }
}

/// Interpret a boolean-ish environment value. `0`, `false`, `no`, `off` and
/// the empty string are false; anything else is true.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
