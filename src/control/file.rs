use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ArchitectOverride, ControlChannel, ControlDocument, SystemStatus};
use crate::collaborators::OverrideRequest;
use crate::errors::ControlError;
use crate::util::write_atomic;

/// `control.json` on disk, shared with an operator in another process.
///
/// Every read-modify-write holds an exclusive advisory lock on a sibling
/// `control.json.lock`, so the operator CLI and the loop never overwrite each
/// other's fields.
#[derive(Debug, Clone)]
pub struct FileControl {
    path: PathBuf,
}

impl FileControl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing file means RUNNING with no override.
    pub fn load(&self) -> Result<ControlDocument, ControlError> {
        if !self.path.exists() {
            return Ok(ControlDocument::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| ControlError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ControlError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, doc: &ControlDocument) -> Result<(), ControlError> {
        let mut buf = serde_json::to_string_pretty(doc).map_err(ControlError::Serialize)?;
        buf.push('\n');
        write_atomic(&self.path, &buf).map_err(|source| ControlError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Exclusive lock held until the returned file is dropped.
    fn lock(&self) -> Result<File, ControlError> {
        let lock_path = self.lock_path();
        let lock_error = |source| ControlError::Lock {
            path: lock_path.clone(),
            source,
        };
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(lock_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(lock_error)?;
        file.lock_exclusive().map_err(lock_error)?;
        Ok(file)
    }

    /// Read the current document under the lock, apply `f`, and write it back
    /// only when `f` reports a change.
    fn modify<F>(&self, f: F) -> Result<ControlDocument, ControlError>
    where
        F: FnOnce(&mut ControlDocument) -> bool,
    {
        let _guard = self.lock()?;
        let mut doc = self.load()?;
        if f(&mut doc) {
            self.save(&doc)?;
        }
        Ok(doc)
    }

    /// Operator side: set run / pause / stop.
    pub fn set_status(&self, status: SystemStatus) -> Result<ControlDocument, ControlError> {
        info!(status = %status, "control status set");
        self.modify(|doc| {
            doc.system_status = status;
            true
        })
    }

    /// Operator side: queue a one-shot override for the next planning call.
    pub fn issue_override(
        &self,
        instruction: Option<String>,
        force_target: Option<String>,
    ) -> Result<ControlDocument, ControlError> {
        info!(
            instruction = instruction.as_deref().unwrap_or(""),
            target = force_target.as_deref().unwrap_or(""),
            "override queued"
        );
        self.modify(|doc| {
            doc.override_signal = ArchitectOverride {
                active: true,
                instruction,
                force_target,
            };
            true
        })
    }
}

#[async_trait]
impl ControlChannel for FileControl {
    async fn read(&self) -> Result<ControlDocument, ControlError> {
        self.load()
    }

    async fn consume_override(&self, delivered: &OverrideRequest) -> Result<(), ControlError> {
        // Only the override field is touched; the status is whatever the
        // operator last wrote.
        self.modify(|doc| {
            if !doc.override_signal.is_delivery_of(delivered) {
                debug!("override replaced since delivery, leaving it queued");
                return false;
            }
            doc.override_signal = ArchitectOverride::default();
            true
        })
        .map(|_| ())
    }
}
