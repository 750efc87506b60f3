//! Outbound seam between the scoreboard core and the network
//!
//! Every objective and team hands its state-sync packets to a [`Transport`]
//! together with the viewers that should receive them. Delivery is
//! fire-and-forget: implementations must not block the caller.

use crate::viewer::ViewerId;
use parking_lot::Mutex;
use shared::ScoreboardPacket;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("outgoing packet channel is closed")]
    ChannelClosed,

    #[error("transport rejected packet for {0}")]
    Rejected(String),
}

pub trait Transport: Send + Sync {
    fn send_update(
        &self,
        packet: &ScoreboardPacket,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError>;
}

/// One packet handed to a [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentUpdate {
    pub packet: ScoreboardPacket,
    pub viewers: Vec<ViewerId>,
}

/// In-memory transport that keeps every packet it is given.
///
/// Used by tests and by embedders that drain packets themselves.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentUpdate>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail with [`TransportError::Rejected`]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentUpdate> {
        self.sent.lock().clone()
    }

    /// Returns and forgets everything recorded so far
    pub fn take(&self) -> Vec<SentUpdate> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Packets addressed to `viewer`, in send order
    pub fn sent_to(&self, viewer: ViewerId) -> Vec<ScoreboardPacket> {
        self.sent
            .lock()
            .iter()
            .filter(|update| update.viewers.contains(&viewer))
            .map(|update| update.packet.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send_update(
        &self,
        packet: &ScoreboardPacket,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(packet.target().to_string()));
        }

        self.sent.lock().push(SentUpdate {
            packet: packet.clone(),
            viewers: viewers.to_vec(),
        });
        Ok(())
    }
}
