//! A single conversation: the channels delivered for one recipient pair.

use crate::bus::ChannelHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// A live conversation with one remote party on one local account.
///
/// Created lazily by the registry on first reference to its recipient pair.
/// Channels are appended as the dispatcher hands them off; `close` is called
/// by whoever ends the conversation and notifies the registry exactly once.
pub struct Conversation {
    id: Uuid,
    local_uid: String,
    remote_uid: String,
    channels: Mutex<Vec<ChannelHandle>>,
    closed: AtomicBool,
    closed_tx: UnboundedSender<Uuid>,
}

impl Conversation {
    pub(crate) fn new(
        local_uid: impl Into<String>,
        remote_uid: impl Into<String>,
        closed_tx: UnboundedSender<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_uid: local_uid.into(),
            remote_uid: remote_uid.into(),
            channels: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            closed_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn local_uid(&self) -> &str {
        &self.local_uid
    }

    pub fn remote_uid(&self) -> &str {
        &self.remote_uid
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of channels delivered so far.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Object paths of the delivered channels, in delivery order.
    pub fn channel_paths(&self) -> Vec<String> {
        self.channels
            .lock()
            .map(|g| g.iter().map(|c| c.object_path.clone()).collect())
            .unwrap_or_default()
    }

    /// Take ownership of a channel handed off by the dispatcher. Channels
    /// arriving after close are dropped; a closed conversation is already on
    /// its way out of the registry.
    pub fn add_channel(&self, channel: ChannelHandle) {
        if self.is_closed() {
            log::debug!(
                "conversation {}: dropping channel {} delivered after close",
                self.id,
                channel.object_path
            );
            return;
        }
        if let Ok(mut g) = self.channels.lock() {
            g.push(channel);
        }
    }

    /// End the conversation and notify the registry. Idempotent; only the
    /// first call sends the close notification.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Receiver gone means the registry itself is shutting down.
        let _ = self.closed_tx.send(self.id);
    }
}
