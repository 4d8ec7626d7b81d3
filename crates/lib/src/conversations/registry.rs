//! Get-or-create registry enforcing one conversation per recipient pair.

use crate::conversations::Conversation;
use crate::matching::{Recipient, RecipientMatcher};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Insertion-ordered list of live conversations, deduplicated under the
/// configured recipient matcher.
///
/// Invariant: no two entries resolve the same effective recipient pair. The
/// linear scan is fine at the scale this runs at (a handful of simultaneous
/// conversations per process).
pub struct ConversationRegistry {
    matcher: Box<dyn RecipientMatcher>,
    conversations: Vec<Arc<Conversation>>,
    closed_tx: UnboundedSender<Uuid>,
}

impl ConversationRegistry {
    /// Create a registry plus the receiver for close notifications. The
    /// caller drains the receiver and feeds each id back to `on_closed`.
    pub fn new(matcher: Box<dyn RecipientMatcher>) -> (Self, UnboundedReceiver<Uuid>) {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        (
            Self {
                matcher,
                conversations: Vec::new(),
                closed_tx,
            },
            closed_rx,
        )
    }

    /// Return the conversation for (local_uid, remote_uid), creating it on
    /// first reference.
    ///
    /// The scan runs in insertion order and the first match wins: the stored
    /// local uid must equal `local_uid` exactly, and the recipient pairs must
    /// match under the matcher. Entries already closed but not yet drained
    /// from the list are skipped.
    pub fn resolve(&mut self, local_uid: &str, remote_uid: &str) -> Arc<Conversation> {
        let wanted = Recipient::new(local_uid, remote_uid);
        for conv in &self.conversations {
            if conv.is_closed() || conv.local_uid() != local_uid {
                continue;
            }
            let stored = Recipient::new(conv.local_uid(), conv.remote_uid());
            if self.matcher.matches(&stored, &wanted) {
                return Arc::clone(conv);
            }
        }

        let conv = Arc::new(Conversation::new(
            local_uid,
            remote_uid,
            self.closed_tx.clone(),
        ));
        self.conversations.push(Arc::clone(&conv));
        conv
    }

    /// Drop the entry for a closed conversation. Unknown ids are ignored;
    /// close notifications can arrive after the entry is already gone.
    pub fn on_closed(&mut self, id: Uuid) {
        self.conversations.retain(|c| c.id() != id);
    }

    /// Live conversations in insertion order.
    pub fn conversations(&self) -> &[Arc<Conversation>] {
        &self.conversations
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Conversation>> {
        self.conversations.iter().find(|c| c.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{ExactMatcher, PhoneAwareMatcher};

    #[test]
    fn resolve_reuses_matching_conversation() {
        let (mut reg, _rx) = ConversationRegistry::new(Box::new(PhoneAwareMatcher));
        let a = reg.resolve("ring/tel", "+358401234567");
        let b = reg.resolve("ring/tel", "040 123 4567");
        assert_eq!(a.id(), b.id());
        assert_eq!(reg.len(), 1);
        // The stored identity is the one from the first reference.
        assert_eq!(a.remote_uid(), "+358401234567");
    }

    #[test]
    fn resolve_requires_exact_local_uid() {
        let (mut reg, _rx) = ConversationRegistry::new(Box::new(PhoneAwareMatcher));
        let a = reg.resolve("ring/tel", "0401234567");
        let b = reg.resolve("ofono/sim2", "0401234567");
        assert_ne!(a.id(), b.id());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn resolve_after_close_creates_a_new_conversation() {
        let (mut reg, mut rx) = ConversationRegistry::new(Box::new(ExactMatcher));
        let a = reg.resolve("ring/tel", "0401234567");
        a.close();
        let id = rx.try_recv().unwrap();
        reg.on_closed(id);
        let b = reg.resolve("ring/tel", "0401234567");
        assert_ne!(a.id(), b.id());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn closed_but_undrained_entries_are_not_resolved() {
        let (mut reg, _rx) = ConversationRegistry::new(Box::new(ExactMatcher));
        let a = reg.resolve("ring/tel", "0401234567");
        a.close();
        // Close notification not yet drained; resolve must still not return it.
        let b = reg.resolve("ring/tel", "0401234567");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn stale_close_notification_is_a_no_op() {
        let (mut reg, _rx) = ConversationRegistry::new(Box::new(ExactMatcher));
        let a = reg.resolve("ring/tel", "0401234567");
        reg.on_closed(Uuid::new_v4());
        assert_eq!(reg.len(), 1);
        reg.on_closed(a.id());
        reg.on_closed(a.id());
        assert!(reg.is_empty());
    }

    #[test]
    fn conversations_keep_insertion_order() {
        let (mut reg, _rx) = ConversationRegistry::new(Box::new(ExactMatcher));
        reg.resolve("ring/tel", "alice");
        reg.resolve("ring/tel", "bob");
        reg.resolve("ring/tel", "carol");
        let remotes: Vec<&str> = reg.conversations().iter().map(|c| c.remote_uid()).collect();
        assert_eq!(remotes, vec!["alice", "bob", "carol"]);
    }
}
