use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::engine_config::EngineToml;

/// Runtime context for one manuscript project.
///
/// Owns the project root, every path derived from it, and the layered engine
/// settings. It is passed explicitly to the scanner, the control channel and
/// the orchestrator, so several projects can be driven side by side.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub manuscripts_dir: PathBuf,
    pub story_bible_dir: PathBuf,
    pub log_dir: PathBuf,
    pub matrix_file: PathBuf,
    pub control_file: PathBuf,
    pub project_conf_file: PathBuf,
    pub story_brief_file: PathBuf,
    pub settings: EngineToml,
}

impl ProjectContext {
    /// Resolve the project root and load `textcraft.toml` with env overrides.
    pub fn new(root: PathBuf) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", root.display()))?;
        let settings = EngineToml::load_or_default(&root)?.with_env();
        Ok(Self::with_settings(root, settings))
    }

    /// Build a context with explicit settings and no filesystem checks.
    pub fn with_settings(root: PathBuf, settings: EngineToml) -> Self {
        let data_dir = root.join("data");
        let story_bible_dir = data_dir.join("story_bible");
        Self {
            manuscripts_dir: data_dir.join("manuscripts"),
            log_dir: data_dir.join("logs"),
            matrix_file: data_dir.join("matrix.json"),
            control_file: data_dir.join("control.json"),
            project_conf_file: story_bible_dir.join("project_conf.json"),
            story_brief_file: story_bible_dir.join("story_brief.json"),
            story_bible_dir,
            data_dir,
            root,
            settings,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.manuscripts_dir)
            .context("Failed to create manuscripts directory")?;
        std::fs::create_dir_all(&self.story_bible_dir)
            .context("Failed to create story bible directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Path of a unit relative to the project root, as stored in the Matrix.
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Project name, taken from the root directory name.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }
}
