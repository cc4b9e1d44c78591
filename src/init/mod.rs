//! Initialization of a manuscript project.
//!
//! `textcraft init` lays out the data directory under the project root:
//!
//! ```text
//! textcraft.toml
//! data/
//! ├── matrix.json          # empty Matrix
//! ├── control.json         # RUNNING, no override
//! ├── manuscripts/
//! ├── story_bible/
//! │   └── project_conf.json
//! └── logs/
//! ```
//!
//! Existing files are never overwritten, so running it twice is harmless.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::ProjectContext;
use crate::control::{ControlDocument, FileControl};
use crate::engine_config::{CONFIG_FILE, EngineToml};
use crate::matrix::{Matrix, MatrixStore};

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Whether anything was newly created
    pub created: bool,
}

/// Initialize a project in `project_dir`, filling in whatever is missing.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    std::fs::create_dir_all(project_dir)
        .with_context(|| format!("Failed to create directory: {}", project_dir.display()))?;
    let ctx = ProjectContext::with_settings(project_dir.to_path_buf(), EngineToml::default());
    let mut created = !ctx.data_dir.exists();
    ctx.ensure_directories()?;

    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        EngineToml::default().save(&config_path)?;
        created = true;
    }

    let store = MatrixStore::new(ctx.matrix_file.clone());
    if !store.exists() {
        store.save(&Matrix::default())?;
        created = true;
    }

    let control = FileControl::new(ctx.control_file.clone());
    if !ctx.control_file.exists() {
        control.save(&ControlDocument::default())?;
        created = true;
    }

    if !ctx.project_conf_file.exists() {
        let conf = json!({
            "constraints": {
                "chapter_target_word_count": EngineToml::default().scanner.target_word_count
            }
        });
        let content = serde_json::to_string_pretty(&conf)?;
        std::fs::write(&ctx.project_conf_file, content + "\n").with_context(|| {
            format!("Failed to write {}", ctx.project_conf_file.display())
        })?;
        created = true;
    }

    Ok(InitResult {
        data_dir: ctx.data_dir,
        created,
    })
}

/// Whether both the Matrix and the control document exist.
pub fn is_initialized(project_dir: &Path) -> bool {
    let data_dir = project_dir.join("data");
    data_dir.join("matrix.json").exists() && data_dir.join("control.json").exists()
}
