//! Fire-and-forget hand-off of changed units to a retrieval-memory indexer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// A unit whose text changed since the previous scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub unit_id: String,
    pub path: PathBuf,
    pub word_count: usize,
}

/// Sink for index requests. `submit` must never block or fail the scan.
pub trait MemoryIndex: Send + Sync {
    fn submit(&self, request: IndexRequest);
}

/// Discards every request. Used when no indexer is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndex;

impl MemoryIndex for NoopIndex {
    fn submit(&self, _request: IndexRequest) {}
}

/// Bounded channel feeding a background indexer task.
#[derive(Debug, Clone)]
pub struct ChannelIndex {
    tx: mpsc::Sender<IndexRequest>,
}

impl ChannelIndex {
    pub fn new(tx: mpsc::Sender<IndexRequest>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<IndexRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl MemoryIndex for ChannelIndex {
    fn submit(&self, request: IndexRequest) {
        match self.tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                debug!(unit = %req.unit_id, "memory index queue full, dropping request");
            }
            Err(TrySendError::Closed(req)) => {
                debug!(unit = %req.unit_id, "memory indexer gone, dropping request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> IndexRequest {
        IndexRequest {
            unit_id: id.to_string(),
            path: PathBuf::from(format!("data/manuscripts/{}_X.md", id)),
            word_count: 100,
        }
    }

    #[test]
    fn test_channel_index_delivers() {
        let (index, mut rx) = ChannelIndex::channel(2);
        index.submit(request("ch01"));
        assert_eq!(rx.try_recv().unwrap().unit_id, "ch01");
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (index, mut rx) = ChannelIndex::channel(1);
        index.submit(request("ch01"));
        index.submit(request("ch02"));
        assert_eq!(rx.try_recv().unwrap().unit_id, "ch01");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (index, rx) = ChannelIndex::channel(1);
        drop(rx);
        index.submit(request("ch01"));
    }
}
