use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ArchitectOverride, ControlChannel, ControlDocument, SystemStatus};
use crate::collaborators::OverrideRequest;
use crate::errors::ControlError;

/// In-process control for an operator living in the same process as the
/// loop. Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedControl {
    state: Arc<Mutex<ControlDocument>>,
}

impl SharedControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: ControlDocument) -> Self {
        Self {
            state: Arc::new(Mutex::new(doc)),
        }
    }

    pub fn snapshot(&self) -> Result<ControlDocument, ControlError> {
        self.state
            .lock()
            .map(|doc| doc.clone())
            .map_err(|_| ControlError::LockPoisoned)
    }

    pub fn set_status(&self, status: SystemStatus) -> Result<(), ControlError> {
        let mut doc = self.state.lock().map_err(|_| ControlError::LockPoisoned)?;
        doc.system_status = status;
        Ok(())
    }

    pub fn issue_override(
        &self,
        instruction: Option<String>,
        force_target: Option<String>,
    ) -> Result<(), ControlError> {
        let mut doc = self.state.lock().map_err(|_| ControlError::LockPoisoned)?;
        doc.override_signal = ArchitectOverride {
            active: true,
            instruction,
            force_target,
        };
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for SharedControl {
    async fn read(&self) -> Result<ControlDocument, ControlError> {
        self.snapshot()
    }

    async fn consume_override(&self, delivered: &OverrideRequest) -> Result<(), ControlError> {
        let mut doc = self.state.lock().map_err(|_| ControlError::LockPoisoned)?;
        if doc.override_signal.is_delivery_of(delivered) {
            doc.override_signal = ArchitectOverride::default();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_share_state() {
        let operator = SharedControl::new();
        let loop_side = operator.clone();

        operator.set_status(SystemStatus::Paused).unwrap();
        assert_eq!(
            loop_side.read().await.unwrap().system_status,
            SystemStatus::Paused
        );

        operator
            .issue_override(Some("Add a storm".to_string()), None)
            .unwrap();
        let delivered = loop_side.read().await.unwrap().pending_override().unwrap();

        loop_side.consume_override(&delivered).await.unwrap();
        assert!(operator.snapshot().unwrap().pending_override().is_none());
    }

    #[tokio::test]
    async fn test_consume_keeps_override_queued_after_delivery() {
        let control = SharedControl::new();
        control
            .issue_override(Some("First".to_string()), None)
            .unwrap();
        let delivered = control.snapshot().unwrap().pending_override().unwrap();

        control
            .issue_override(Some("Second".to_string()), Some("ch02".to_string()))
            .unwrap();
        control.consume_override(&delivered).await.unwrap();

        let pending = control.snapshot().unwrap().pending_override().unwrap();
        assert_eq!(pending.instruction.as_deref(), Some("Second"));
        assert_eq!(pending.force_target.as_deref(), Some("ch02"));
    }
}
