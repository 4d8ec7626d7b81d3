//! Per-recipient conversations and the registry that deduplicates them.
//!
//! One `Conversation` exists per effective (local uid, remote uid) pair; the
//! registry owns them, hands out clones on resolve, and drops its entry when
//! a conversation reports its own close.

mod conversation;
mod registry;

pub use conversation::Conversation;
pub use registry::ConversationRegistry;
