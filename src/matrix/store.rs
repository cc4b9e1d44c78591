use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Matrix;
use crate::errors::MatrixError;
use crate::util::write_atomic;

/// Reads and atomically replaces `matrix.json`.
///
/// Every write goes to a sibling temp file that is then renamed over the
/// canonical path, so observers never see a half-written document.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    path: PathBuf,
}

impl MatrixStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the Matrix. A missing file yields an empty Matrix; a malformed
    /// file is an error so that locks are never silently discarded.
    pub fn load(&self) -> Result<Matrix, MatrixError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "matrix missing, starting empty");
            return Ok(Matrix::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| MatrixError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| MatrixError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, matrix: &Matrix) -> Result<(), MatrixError> {
        let mut buf = serde_json::to_string_pretty(matrix).map_err(MatrixError::Serialize)?;
        buf.push('\n');
        write_atomic(&self.path, &buf).map_err(|source| MatrixError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), units = matrix.content.len(), "matrix saved");
        Ok(())
    }

    /// Load, mutate, and save in one step. Returns the saved Matrix.
    pub fn update<F>(&self, f: F) -> Result<Matrix, MatrixError>
    where
        F: FnOnce(&mut Matrix),
    {
        let mut matrix = self.load()?;
        f(&mut matrix);
        self.save(&matrix)?;
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{ContentRecord, ProjectStatus, UnitStatus};
    use tempfile::tempdir;

    fn make_store() -> (MatrixStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("matrix.json");
        (MatrixStore::new(path), dir)
    }

    #[test]
    fn test_load_missing_returns_empty() {
        let (store, _dir) = make_store();
        assert!(!store.exists());
        let m = store.load().unwrap();
        assert!(m.content.is_empty());
        assert_eq!(m.meta.project_status, ProjectStatus::Active);
    }

    #[test]
    fn test_save_then_load() {
        let (store, _dir) = make_store();
        let mut m = Matrix::default();
        let mut r = ContentRecord::new("Opening", "data/manuscripts/ch01_Opening.md");
        r.word_count = 120;
        r.status = UnitStatus::Drafting;
        m.content.insert("ch01".into(), r);
        m.recompute_metrics();
        store.save(&m).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, m);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("\"DRAFTING\""));
    }

    #[test]
    fn test_malformed_matrix_is_an_error() {
        let (store, _dir) = make_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, MatrixError::Parse { .. }));
    }

    #[test]
    fn test_update_persists_mutation() {
        let (store, _dir) = make_store();
        store.save(&Matrix::default()).unwrap();
        let saved = store
            .update(|m| m.meta.project_status = ProjectStatus::Paused)
            .unwrap();
        assert_eq!(saved.meta.project_status, ProjectStatus::Paused);
        assert_eq!(
            store.load().unwrap().meta.project_status,
            ProjectStatus::Paused
        );
    }

    #[test]
    fn test_recovery_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        {
            let store = MatrixStore::new(path.clone());
            store
                .update(|m| {
                    m.content.insert(
                        "ch01".into(),
                        ContentRecord::new("Opening", "data/manuscripts/ch01_Opening.md"),
                    );
                })
                .unwrap();
        }
        {
            let store = MatrixStore::new(path);
            assert!(store.load().unwrap().content.contains_key("ch01"));
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_document() {
        let (store, dir) = make_store();
        store.save(&Matrix::default()).unwrap();
        // A directory squatting on the temp path makes the write fail.
        fs::create_dir_all(dir.path().join("data").join("matrix.json.tmp")).unwrap();

        let mut m = Matrix::default();
        m.meta.project_status = ProjectStatus::Complete;
        assert!(matches!(store.save(&m), Err(MatrixError::Write { .. })));
        assert_eq!(
            store.load().unwrap().meta.project_status,
            ProjectStatus::Active
        );
    }
}
