//! Story outline and automatic creation of the next planned unit.
//!
//! Once every existing unit is LOCKED the loop would idle forever; the
//! outline in `story_brief.json` says how many units the book should have,
//! and the next one is scaffolded as an empty file with a heading.

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use crate::matrix::Matrix;

static UNIT_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ch(\d+)$").unwrap());

/// Longest beat excerpt used in a derived title.
const BEAT_TITLE_CHARS: usize = 40;
/// Longest title fragment used in a file name.
const FILE_TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: Option<String>,
}

/// Planned units of the book, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    entries: Vec<OutlineEntry>,
    default_planned_units: usize,
}

impl Outline {
    /// Load `story_brief.json`. A missing file yields the default plan.
    pub fn load(path: &Path, default_planned_units: usize) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::from_value(&Value::Null, default_planned_units));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read story brief: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Story brief is not valid JSON: {}", path.display()))?;
        Ok(Self::from_value(&value, default_planned_units))
    }

    /// Planned units from `structure.chapters`, else `structure.acts[].beats`.
    pub fn from_value(brief: &Value, default_planned_units: usize) -> Self {
        let structure = brief.get("structure");
        let chapters = structure
            .and_then(|s| s.get("chapters"))
            .and_then(|c| c.as_array())
            .filter(|c| !c.is_empty());

        let entries = match chapters {
            Some(chapters) => chapters.iter().map(entry_from_chapter).collect(),
            None => structure
                .and_then(|s| s.get("acts"))
                .and_then(|a| a.as_array())
                .map(|acts| acts.iter().flat_map(entries_from_act).collect())
                .unwrap_or_default(),
        };

        Self {
            entries,
            default_planned_units,
        }
    }

    pub fn planned_units(&self) -> usize {
        if self.entries.is_empty() {
            self.default_planned_units
        } else {
            self.entries.len()
        }
    }

    /// Title of unit `number` (1-based), or `Chapter N` when the outline has none.
    pub fn title_for(&self, number: usize) -> String {
        number
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .and_then(|e| e.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Chapter {}", number))
    }
}

fn entry_from_chapter(chapter: &Value) -> OutlineEntry {
    let title = match chapter {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("title").and_then(|t| t.as_str()).map(String::from),
        _ => None,
    };
    OutlineEntry { title }
}

fn entries_from_act(act: &Value) -> Vec<OutlineEntry> {
    let Some(act) = act.as_object() else {
        return Vec::new();
    };
    let act_name = act.get("name").and_then(|n| n.as_str()).unwrap_or("Act");
    act.get("beats")
        .and_then(|b| b.as_array())
        .map(|beats| {
            beats
                .iter()
                .filter_map(|beat| match beat {
                    Value::String(s) => {
                        let excerpt: String = s.chars().take(BEAT_TITLE_CHARS).collect();
                        Some(OutlineEntry {
                            title: Some(format!("{} - {}", act_name, excerpt)),
                        })
                    }
                    Value::Object(_) => Some(entry_from_chapter(beat)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Highest `chNN` number among the Matrix keys, 0 when there is none.
pub fn max_unit_number(matrix: &Matrix) -> usize {
    matrix
        .content
        .keys()
        .filter_map(|id| UNIT_NUMBER_REGEX.captures(id))
        .filter_map(|c| c[1].parse::<usize>().ok())
        .max()
        .unwrap_or(0)
}

/// Keep alphanumerics, space, `_` and `-`; spaces become `_`; at most 30 chars.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(FILE_TITLE_CHARS)
        .collect()
}

/// The unit that should be created next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub number: usize,
    pub unit_id: String,
    pub title: String,
    pub file_name: String,
}

impl PlannedUnit {
    fn heading(&self) -> String {
        format!("# Chapter {}: {}\n\n", self.number, self.title)
    }
}

/// Next unit to scaffold: only when every unit is LOCKED and the outline
/// plans more units than the highest existing number.
pub fn next_unit(matrix: &Matrix, outline: &Outline) -> Option<PlannedUnit> {
    if !matrix.all_locked() {
        return None;
    }
    let current = max_unit_number(matrix);
    if current >= outline.planned_units() {
        return None;
    }
    let number = current + 1;
    let unit_id = format!("ch{:02}", number);
    let title = outline.title_for(number);
    let file_name = format!("{}_{}.md", unit_id, sanitize_title(&title));
    Some(PlannedUnit {
        number,
        unit_id,
        title,
        file_name,
    })
}

/// Create the next unit's file if one is due. Never overwrites a file.
pub fn scaffold_next_unit(
    manuscripts_dir: &Path,
    matrix: &Matrix,
    outline: &Outline,
) -> Result<Option<(PlannedUnit, PathBuf)>> {
    let Some(unit) = next_unit(matrix, outline) else {
        return Ok(None);
    };
    let path = manuscripts_dir.join(&unit.file_name);
    if path.exists() {
        return Ok(None);
    }
    fs::create_dir_all(manuscripts_dir).with_context(|| {
        format!(
            "Failed to create manuscripts directory: {}",
            manuscripts_dir.display()
        )
    })?;
    fs::write(&path, unit.heading())
        .with_context(|| format!("Failed to create unit file: {}", path.display()))?;
    info!(unit = %unit.unit_id, file = %unit.file_name, "scaffolded next unit");
    Ok(Some((unit, path)))
}
