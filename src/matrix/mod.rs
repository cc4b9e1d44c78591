//! The Matrix: the single persisted status document of a project.
//!
//! One record per content unit, aggregate metrics, project meta, and the
//! transient description of the task currently in flight. Keys of `content`
//! are unit identifiers kept in a `BTreeMap`, so iteration follows narrative
//! order ("ch01" < "ch02").

pub mod store;

pub use store::MatrixStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::collaborators::{ActionType, Agent};

/// Lifecycle status of a content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Fewer words than the minimum; nothing worth reviewing yet
    #[default]
    Empty,
    /// Being written, or explicitly marked incomplete
    Drafting,
    /// Long enough to hand to the validator
    ReviewReady,
    /// Validated and final. Sticky until the text is physically removed
    Locked,
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitStatus::Empty => write!(f, "EMPTY"),
            UnitStatus::Drafting => write!(f, "DRAFTING"),
            UnitStatus::ReviewReady => write!(f, "REVIEW_READY"),
            UnitStatus::Locked => write!(f, "LOCKED"),
        }
    }
}

/// Verdict of the last continuity review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContinuityCheck {
    #[default]
    Pending,
    Pass,
    Fail,
}

impl std::fmt::Display for ContinuityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContinuityCheck::Pending => write!(f, "PENDING"),
            ContinuityCheck::Pass => write!(f, "PASS"),
            ContinuityCheck::Fail => write!(f, "FAIL"),
        }
    }
}

/// Project-wide status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Active,
    Complete,
    Paused,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "ACTIVE"),
            ProjectStatus::Complete => write!(f, "COMPLETE"),
            ProjectStatus::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Record for one manuscript file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Display name derived from the file name
    pub title: String,
    /// Location relative to the project root
    pub path: String,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub status: UnitStatus,
    #[serde(default)]
    pub continuity_check: ContinuityCheck,
    /// Notes from the last failed review, replaced on every verdict
    #[serde(default)]
    pub editor_notes: Vec<String>,
    /// Modification time of the file at the last scan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ContentRecord {
    pub fn new(title: &str, path: &str) -> Self {
        Self {
            title: title.to_string(),
            path: path.to_string(),
            word_count: 0,
            status: UnitStatus::Empty,
            continuity_check: ContinuityCheck::Pending,
            editor_notes: Vec::new(),
            last_modified: None,
        }
    }

    /// File name component of `path`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }

    /// Whether this unit gives the loop something to do.
    pub fn needs_action(&self, auto_continue_drafting: bool) -> bool {
        matches!(self.status, UnitStatus::Empty | UnitStatus::ReviewReady)
            || self.continuity_check == ContinuityCheck::Fail
            || (auto_continue_drafting && self.status == UnitStatus::Drafting)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub project_status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    #[serde(default)]
    pub total_word_count: usize,
    #[serde(default)]
    pub unit_count: usize,
    #[serde(default)]
    pub locked_units: usize,
}

/// The dispatch currently in flight. Observers only; lifecycle logic never
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub task_id: Uuid,
    pub assigned_to: Agent,
    pub target: String,
    pub action: ActionType,
    pub started_at: DateTime<Utc>,
}

impl ActiveTask {
    pub fn new(assigned_to: Agent, target: &str, action: ActionType) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            assigned_to,
            target: target.to_string(),
            action,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Matrix {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub content: BTreeMap<String, ContentRecord>,
    #[serde(default)]
    pub active_task: Option<ActiveTask>,
}

impl Matrix {
    /// True when there is at least one unit and every unit is LOCKED.
    pub fn all_locked(&self) -> bool {
        !self.content.is_empty()
            && self
                .content
                .values()
                .all(|r| r.status == UnitStatus::Locked)
    }

    pub fn is_complete(&self) -> bool {
        self.meta.project_status == ProjectStatus::Complete
    }

    /// Whether a planning call is worth making this cycle. An empty project
    /// counts as actionable: the planner may create its first unit.
    pub fn has_actionable_work(&self, auto_continue_drafting: bool) -> bool {
        self.content.is_empty()
            || self
                .content
                .values()
                .any(|r| r.needs_action(auto_continue_drafting))
    }

    /// Identifiers of units that currently need action, in narrative order.
    pub fn actionable_units(&self, auto_continue_drafting: bool) -> Vec<&str> {
        self.content
            .iter()
            .filter(|(_, r)| r.needs_action(auto_continue_drafting))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn recompute_metrics(&mut self) {
        self.metrics = Metrics {
            total_word_count: self.content.values().map(|r| r.word_count).sum(),
            unit_count: self.content.len(),
            locked_units: self
                .content
                .values()
                .filter(|r| r.status == UnitStatus::Locked)
                .count(),
        };
    }

    /// Map a collaborator's `target_file` to a unit key.
    ///
    /// Accepts the bare identifier (`ch03`), the file name
    /// (`ch03_The_Storm.md`), or a path ending in that file name.
    pub fn resolve_target(&self, target: &str) -> Option<String> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        if self.content.contains_key(target) {
            return Some(target.to_string());
        }

        let file_name = Path::new(target)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| target.to_string());

        if let Some((id, _)) = self
            .content
            .iter()
            .find(|(_, r)| r.file_name() == file_name)
        {
            return Some(id.clone());
        }

        let derived = crate::scanner::rules::unit_id_from_file_name(&file_name);
        self.content.contains_key(&derived).then_some(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: UnitStatus, words: usize) -> ContentRecord {
        let mut r = ContentRecord::new("Title", "data/manuscripts/x.md");
        r.status = status;
        r.word_count = words;
        r
    }

    fn matrix_with(entries: &[(&str, &str, UnitStatus)]) -> Matrix {
        let mut m = Matrix::default();
        for (id, file, status) in entries {
            let mut r = ContentRecord::new(id, &format!("data/manuscripts/{}", file));
            r.status = *status;
            m.content.insert(id.to_string(), r);
        }
        m
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&UnitStatus::ReviewReady).unwrap();
        assert_eq!(json, "\"REVIEW_READY\"");
        let parsed: ContinuityCheck = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(parsed, ContinuityCheck::Fail);
        assert_eq!(ProjectStatus::Complete.to_string(), "COMPLETE");
    }

    #[test]
    fn test_content_keys_iterate_in_narrative_order() {
        let m = matrix_with(&[
            ("ch10", "ch10_End.md", UnitStatus::Empty),
            ("ch02", "ch02_Middle.md", UnitStatus::Empty),
            ("ch01", "ch01_Start.md", UnitStatus::Empty),
        ]);
        let keys: Vec<_> = m.content.keys().cloned().collect();
        assert_eq!(keys, vec!["ch01", "ch02", "ch10"]);
    }

    #[test]
    fn test_all_locked_requires_units() {
        assert!(!Matrix::default().all_locked());
        let m = matrix_with(&[("ch01", "ch01_A.md", UnitStatus::Locked)]);
        assert!(m.all_locked());
        let m = matrix_with(&[
            ("ch01", "ch01_A.md", UnitStatus::Locked),
            ("ch02", "ch02_B.md", UnitStatus::Drafting),
        ]);
        assert!(!m.all_locked());
    }

    #[test]
    fn test_actionable_work_rules() {
        let drafting = matrix_with(&[("ch01", "ch01_A.md", UnitStatus::Drafting)]);
        assert!(!drafting.has_actionable_work(false));
        assert!(drafting.has_actionable_work(true));

        let review = matrix_with(&[("ch01", "ch01_A.md", UnitStatus::ReviewReady)]);
        assert!(review.has_actionable_work(false));

        let mut failed = matrix_with(&[("ch01", "ch01_A.md", UnitStatus::Drafting)]);
        failed.content.get_mut("ch01").unwrap().continuity_check = ContinuityCheck::Fail;
        assert!(failed.has_actionable_work(false));
        assert_eq!(failed.actionable_units(false), vec!["ch01"]);

        let locked = matrix_with(&[("ch01", "ch01_A.md", UnitStatus::Locked)]);
        assert!(!locked.has_actionable_work(true));

        assert!(Matrix::default().has_actionable_work(false));
    }

    #[test]
    fn test_recompute_metrics() {
        let mut m = Matrix::default();
        m.content.insert("ch01".into(), record(UnitStatus::Locked, 2100));
        m.content.insert("ch02".into(), record(UnitStatus::Drafting, 900));
        m.recompute_metrics();
        assert_eq!(m.metrics.total_word_count, 3000);
        assert_eq!(m.metrics.unit_count, 2);
        assert_eq!(m.metrics.locked_units, 1);
    }

    #[test]
    fn test_resolve_target_variants() {
        let m = matrix_with(&[
            ("ch01", "ch01_Start.md", UnitStatus::Empty),
            ("ch10", "ch10_End.md", UnitStatus::Empty),
        ]);
        assert_eq!(m.resolve_target("ch01").as_deref(), Some("ch01"));
        assert_eq!(m.resolve_target("ch10_End.md").as_deref(), Some("ch10"));
        assert_eq!(
            m.resolve_target("data/manuscripts/ch01_Start.md").as_deref(),
            Some("ch01")
        );
        assert_eq!(m.resolve_target("ch01_Renamed.md").as_deref(), Some("ch01"));
        assert_eq!(m.resolve_target("ch1"), None);
        assert_eq!(m.resolve_target("ch02_Missing.md"), None);
        assert_eq!(m.resolve_target(""), None);
    }

    #[test]
    fn test_matrix_tolerates_missing_fields() {
        let json = r#"{"content": {"ch01": {"title": "Start", "path": "data/manuscripts/ch01_Start.md"}}}"#;
        let m: Matrix = serde_json::from_str(json).unwrap();
        let r = &m.content["ch01"];
        assert_eq!(r.status, UnitStatus::Empty);
        assert_eq!(r.continuity_check, ContinuityCheck::Pending);
        assert!(r.editor_notes.is_empty());
        assert!(m.active_task.is_none());
        assert_eq!(m.meta.project_status, ProjectStatus::Active);
    }

    #[test]
    fn test_active_task_roundtrip() {
        let mut m = Matrix::default();
        m.active_task = Some(ActiveTask::new(Agent::Editor, "ch02", ActionType::Edit));
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"assigned_to\":\"editor\""));
        let back: Matrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
