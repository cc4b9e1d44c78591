//! Status inference over the manuscripts directory.
//!
//! A scan rebuilds the content map of the Matrix from what is on disk,
//! carrying review results over from the previous document, and persists
//! the result atomically. Problems with a single file are logged and
//! isolated; only an unreadable manuscripts directory or a Matrix that
//! cannot be loaded or saved fails the scan.

pub mod memory;
pub mod rules;

pub use memory::{ChannelIndex, IndexRequest, MemoryIndex, NoopIndex};
pub use rules::{StatusRules, count_words, title_from_file_name, unit_id_from_file_name};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ProjectContext;
use crate::engine_config::ScannerSection;
use crate::errors::ScanError;
use crate::matrix::{ContentRecord, Matrix, MatrixStore, ProjectStatus};

pub struct Scanner {
    root: PathBuf,
    manuscripts_dir: PathBuf,
    project_conf_file: PathBuf,
    settings: ScannerSection,
    store: MatrixStore,
    memory: Arc<dyn MemoryIndex>,
}

impl Scanner {
    pub fn new(ctx: &ProjectContext, memory: Arc<dyn MemoryIndex>) -> Self {
        Self {
            root: ctx.root.clone(),
            manuscripts_dir: ctx.manuscripts_dir.clone(),
            project_conf_file: ctx.project_conf_file.clone(),
            settings: ctx.settings.scanner.clone(),
            store: MatrixStore::new(ctx.matrix_file.clone()),
            memory,
        }
    }

    pub fn store(&self) -> &MatrixStore {
        &self.store
    }

    /// Target length for REVIEW_READY: `constraints.chapter_target_word_count`
    /// from project_conf.json when set, else the configured fallback.
    pub fn target_word_count(&self) -> usize {
        let fallback = self.settings.target_word_count;
        if !self.project_conf_file.exists() {
            return fallback;
        }
        let conf = fs::read_to_string(&self.project_conf_file)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_json::from_str::<serde_json::Value>(&s).map_err(|e| e.to_string())
            });
        match conf {
            Ok(value) => value
                .pointer("/constraints/chapter_target_word_count")
                .and_then(|v| v.as_u64())
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(fallback),
            Err(e) => {
                warn!(path = %self.project_conf_file.display(), error = %e, "ignoring unreadable project_conf.json");
                fallback
            }
        }
    }

    /// Scan the manuscripts directory, persist the refreshed Matrix and return it.
    pub fn scan(&self) -> Result<Matrix, ScanError> {
        let previous = self.store.load()?;
        let matrix = self.rebuild(previous)?;
        self.store.save(&matrix)?;
        debug!(
            units = matrix.metrics.unit_count,
            words = matrix.metrics.total_word_count,
            locked = matrix.metrics.locked_units,
            status = %matrix.meta.project_status,
            "scan complete"
        );
        Ok(matrix)
    }

    fn rebuild(&self, previous: Matrix) -> Result<Matrix, ScanError> {
        let target_word_count = self.target_word_count();
        let rules = StatusRules {
            target_word_count,
            min_word_count: self.settings.min_word_count,
            incomplete_markers: &self.settings.incomplete_markers,
        };

        let mut content: BTreeMap<String, ContentRecord> = BTreeMap::new();
        for path in self.unit_files()? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };
            let unit_id = unit_id_from_file_name(file_name);
            if content.contains_key(&unit_id) {
                warn!(unit = %unit_id, file = %file_name, "duplicate unit identifier, skipping file");
                continue;
            }
            let prev = previous.content.get(&unit_id);

            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(unit = %unit_id, path = %path.display(), error = %e, "failed to read unit, keeping previous record");
                    if let Some(prev) = prev {
                        content.insert(unit_id, prev.clone());
                    }
                    continue;
                }
            };

            let word_count = count_words(&text);
            let status = rules.determine_status(prev.map(|p| p.status), &text, word_count);
            let last_modified = modified_time(&path);

            let mut record = ContentRecord::new(
                &title_from_file_name(file_name),
                &self.relative_path(&path),
            );
            record.word_count = word_count;
            record.status = status;
            record.last_modified = last_modified;
            if let Some(prev) = prev {
                record.continuity_check = prev.continuity_check;
                record.editor_notes = prev.editor_notes.clone();
                if prev.status != status {
                    info!(unit = %unit_id, from = %prev.status, to = %status, words = word_count, "unit status changed");
                }
            }

            let changed = prev.is_none_or(|p| p.last_modified != last_modified);
            if changed && word_count > 0 {
                self.memory.submit(IndexRequest {
                    unit_id: unit_id.clone(),
                    path: path.clone(),
                    word_count,
                });
            }

            content.insert(unit_id, record);
        }

        // Units whose file disappeared are kept, driven to zero words.
        for (unit_id, prev) in &previous.content {
            if content.contains_key(unit_id) {
                continue;
            }
            let mut record = prev.clone();
            record.word_count = 0;
            record.status = rules.determine_status(Some(prev.status), "", 0);
            if prev.word_count > 0 {
                warn!(unit = %unit_id, path = %prev.path, "unit file missing, marking EMPTY");
            }
            content.insert(unit_id.clone(), record);
        }

        let mut matrix = Matrix {
            meta: previous.meta,
            metrics: previous.metrics,
            content,
            active_task: previous.active_task,
        };
        matrix.recompute_metrics();
        matrix.meta.last_scan = Some(Utc::now());
        matrix.meta.project_status = if matrix.all_locked() {
            ProjectStatus::Complete
        } else if matrix.meta.project_status == ProjectStatus::Paused {
            ProjectStatus::Paused
        } else {
            ProjectStatus::Active
        };
        Ok(matrix)
    }

    /// Content files directly inside the manuscripts directory, sorted by name.
    fn unit_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        let dir = &self.manuscripts_dir;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| ScanError::ManuscriptsDir {
                path: dir.clone(),
                source,
            })?;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    return Err(ScanError::ManuscriptsDir {
                        path: dir.clone(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "skipping unreadable manuscripts entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let has_extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    self.settings
                        .extensions
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
                });
            if has_extension {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
