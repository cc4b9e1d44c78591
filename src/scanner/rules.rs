//! Deterministic status inference for a single content unit.

use std::path::Path;

use crate::matrix::UnitStatus;

/// Thresholds the status rule is evaluated against.
#[derive(Debug, Clone)]
pub struct StatusRules<'a> {
    pub target_word_count: usize,
    pub min_word_count: usize,
    pub incomplete_markers: &'a [String],
}

impl StatusRules<'_> {
    /// Infer the status of a unit from its previous status and current text.
    ///
    /// Evaluated in priority order:
    /// 1. a LOCKED unit stays LOCKED unless it drops below the minimum length
    /// 2. below the minimum length is EMPTY
    /// 3. an incomplete marker keeps the unit DRAFTING
    /// 4. at or above the target length is REVIEW_READY
    /// 5. anything else is DRAFTING
    pub fn determine_status(
        &self,
        previous: Option<UnitStatus>,
        text: &str,
        word_count: usize,
    ) -> UnitStatus {
        if word_count < self.min_word_count || word_count == 0 {
            return UnitStatus::Empty;
        }
        if previous == Some(UnitStatus::Locked) {
            return UnitStatus::Locked;
        }
        if self
            .incomplete_markers
            .iter()
            .any(|m| !m.is_empty() && text.contains(m.as_str()))
        {
            return UnitStatus::Drafting;
        }
        if word_count >= self.target_word_count {
            return UnitStatus::ReviewReady;
        }
        UnitStatus::Drafting
    }
}

/// Whitespace-delimited token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// Unit identifier: the file stem up to the first `_`.
///
/// `ch03_The_Storm.md` → `ch03`
pub fn unit_id_from_file_name(file_name: &str) -> String {
    let stem = stem(file_name);
    stem.split_once('_')
        .map(|(id, _)| id)
        .unwrap_or(stem)
        .to_string()
}

/// Display title: the stem after the first `_`, underscores as spaces.
///
/// `ch03_The_Storm.md` → `The Storm`; a stem without a separator is its own title.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = stem(file_name);
    match stem.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest.replace('_', " "),
        _ => stem.to_string(),
    }
}
