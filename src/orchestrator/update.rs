//! Post-dispatch mutations of the Matrix.
//!
//! Pure functions over `&mut Matrix`; the runner applies them inside a single
//! `MatrixStore::update` so each result lands in one atomic write.

use tracing::info;

use crate::collaborators::Verdict;
use crate::matrix::{ContinuityCheck, Matrix, ProjectStatus, UnitStatus};

/// Apply an editor verdict. PASS locks the unit; FAIL flags it and replaces
/// its notes without touching `status`. Returns false for an unknown unit.
pub fn apply_verdict(matrix: &mut Matrix, unit_id: &str, verdict: Verdict, notes: Vec<String>) -> bool {
    let Some(record) = matrix.content.get_mut(unit_id) else {
        return false;
    };
    match verdict {
        Verdict::Pass => {
            record.status = UnitStatus::Locked;
            record.continuity_check = ContinuityCheck::Pass;
            record.editor_notes = notes;
            info!(unit = %unit_id, "unit locked after passing review");
        }
        Verdict::Fail => {
            record.continuity_check = ContinuityCheck::Fail;
            info!(unit = %unit_id, notes = notes.len(), "unit failed review");
            record.editor_notes = notes;
        }
    }
    matrix.recompute_metrics();
    true
}

/// After a successful fix pass, put a failed unit back in the review queue.
pub fn clear_continuity_flag(matrix: &mut Matrix, unit_id: &str) -> bool {
    match matrix.content.get_mut(unit_id) {
        Some(record) if record.continuity_check == ContinuityCheck::Fail => {
            record.continuity_check = ContinuityCheck::Pending;
            info!(unit = %unit_id, "continuity flag cleared after fix");
            true
        }
        _ => false,
    }
}

/// Mirror the operator's pause into the Matrix, or lift it. COMPLETE is left
/// alone when resuming; the next scan decides.
pub fn set_paused(matrix: &mut Matrix, paused: bool) -> bool {
    let status = &mut matrix.meta.project_status;
    match (paused, *status) {
        (true, ProjectStatus::Paused) => false,
        (true, _) => {
            *status = ProjectStatus::Paused;
            true
        }
        (false, ProjectStatus::Paused) => {
            *status = ProjectStatus::Active;
            true
        }
        (false, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ContentRecord;

    fn matrix(status: UnitStatus) -> Matrix {
        let mut m = Matrix::default();
        let mut r = ContentRecord::new("Start", "data/manuscripts/ch01_Start.md");
        r.status = status;
        r.word_count = 2200;
        m.content.insert("ch01".to_string(), r);
        m
    }

    #[test]
    fn test_pass_locks_unit() {
        let mut m = matrix(UnitStatus::ReviewReady);
        assert!(apply_verdict(&mut m, "ch01", Verdict::Pass, Vec::new()));
        let r = &m.content["ch01"];
        assert_eq!(r.status, UnitStatus::Locked);
        assert_eq!(r.continuity_check, ContinuityCheck::Pass);
        assert_eq!(m.metrics.locked_units, 1);
    }

    #[test]
    fn test_fail_keeps_status_and_replaces_notes() {
        let mut m = matrix(UnitStatus::ReviewReady);
        m.content.get_mut("ch01").unwrap().editor_notes = vec!["old".to_string()];
        apply_verdict(
            &mut m,
            "ch01",
            Verdict::Fail,
            vec!["Wrong moon phase".to_string(), "Name typo".to_string()],
        );
        let r = &m.content["ch01"];
        assert_eq!(r.status, UnitStatus::ReviewReady);
        assert_eq!(r.continuity_check, ContinuityCheck::Fail);
        assert_eq!(r.editor_notes, vec!["Wrong moon phase", "Name typo"]);
    }

    #[test]
    fn test_verdict_for_unknown_unit() {
        let mut m = matrix(UnitStatus::ReviewReady);
        assert!(!apply_verdict(&mut m, "ch09", Verdict::Pass, Vec::new()));
        assert_eq!(m.content["ch01"].status, UnitStatus::ReviewReady);
    }

    #[test]
    fn test_clear_continuity_flag_only_clears_fail() {
        let mut m = matrix(UnitStatus::Drafting);
        assert!(!clear_continuity_flag(&mut m, "ch01"));
        m.content.get_mut("ch01").unwrap().continuity_check = ContinuityCheck::Fail;
        assert!(clear_continuity_flag(&mut m, "ch01"));
        assert_eq!(m.content["ch01"].continuity_check, ContinuityCheck::Pending);
        assert!(!clear_continuity_flag(&mut m, "missing"));
    }

    #[test]
    fn test_set_paused_transitions() {
        let mut m = Matrix::default();
        assert!(set_paused(&mut m, true));
        assert!(!set_paused(&mut m, true));
        assert_eq!(m.meta.project_status, ProjectStatus::Paused);
        assert!(set_paused(&mut m, false));
        assert_eq!(m.meta.project_status, ProjectStatus::Active);

        m.meta.project_status = ProjectStatus::Complete;
        assert!(!set_paused(&mut m, false));
        assert_eq!(m.meta.project_status, ProjectStatus::Complete);
    }
}
