//! Channel manager: bus registration plus conversation resolution.
//!
//! `ChannelManager` owns the conversation registry and the single-assignment
//! handler name. `TextChannelHandler` is the object registered on the bus; it
//! holds only a weak back-reference so a dispatcher that outlives the manager
//! cannot keep it alive.

use crate::bus::{
    BusError, ChannelBatch, ChannelClassFilter, ChannelHandler, ClientRegistrar,
};
use crate::conversations::{Conversation, ConversationRegistry};
use crate::matching::RecipientMatcher;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

/// Owns the conversation registry and mediates all access to it.
///
/// Close notifications from conversations are drained by a task spawned at
/// construction; batch handling and the drain task serialize on the registry
/// lock, so list mutation never overlaps.
pub struct ChannelManager {
    handler_name: RwLock<Option<String>>,
    name_tx: watch::Sender<Option<String>>,
    registry: RwLock<ConversationRegistry>,
    // Handed to the bus-registered handler so it never keeps the manager alive.
    self_weak: Weak<ChannelManager>,
}

impl ChannelManager {
    /// Create a manager using the given recipient matcher. Must run inside a
    /// tokio runtime (spawns the close-notification drain task).
    pub fn new(matcher: Box<dyn RecipientMatcher>) -> Arc<Self> {
        let (registry, mut closed_rx) = ConversationRegistry::new(matcher);
        let (name_tx, _) = watch::channel(None);
        let manager = Arc::new_cyclic(|weak| Self {
            handler_name: RwLock::new(None),
            name_tx,
            registry: RwLock::new(registry),
            self_weak: weak.clone(),
        });

        let weak = Arc::downgrade(&manager);
        tokio::spawn(async move {
            while let Some(id) = closed_rx.recv().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.registry.write().await.on_closed(id);
            }
        });

        manager
    }

    /// The registered handler name, once set.
    pub async fn handler_name(&self) -> Option<String> {
        self.handler_name.read().await.clone()
    }

    /// Watch for the handler name being set. Updates at most once per process
    /// lifetime.
    pub fn handler_name_watch(&self) -> watch::Receiver<Option<String>> {
        self.name_tx.subscribe()
    }

    /// Register this process as the text-channel handler under `name`.
    ///
    /// First call with a non-empty name wins: it registers on the bus,
    /// publishes the name-changed notification, and returns Ok(true). An
    /// empty name, or any call after the name is set, is a no-op returning
    /// Ok(false) with no registration and no notification.
    pub async fn set_handler_name(
        &self,
        name: &str,
        bus: &dyn ClientRegistrar,
    ) -> Result<bool, BusError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        let mut current = self.handler_name.write().await;
        if current.is_some() {
            return Ok(false);
        }

        let handler = Arc::new(TextChannelHandler {
            manager: self.self_weak.clone(),
        });
        bus.register_client(handler, name).await?;

        *current = Some(name.to_string());
        let _ = self.name_tx.send(Some(name.to_string()));
        log::info!("registered text-channel handler as {}", name);
        Ok(true)
    }

    /// Get or create the conversation for (local_uid, remote_uid).
    pub async fn resolve_conversation(
        &self,
        local_uid: &str,
        remote_uid: &str,
    ) -> Arc<Conversation> {
        self.registry.write().await.resolve(local_uid, remote_uid)
    }

    /// Snapshot of the live conversations in insertion order.
    pub async fn conversations(&self) -> Vec<Arc<Conversation>> {
        self.registry.read().await.conversations().to_vec()
    }

    pub async fn conversation(&self, id: Uuid) -> Option<Arc<Conversation>> {
        self.registry.read().await.get(id)
    }
}

/// The handler object registered on the bus for text chat channels.
pub struct TextChannelHandler {
    manager: Weak<ChannelManager>,
}

#[async_trait]
impl ChannelHandler for TextChannelHandler {
    fn channel_filter(&self) -> ChannelClassFilter {
        ChannelClassFilter::text_chat()
    }

    fn bypass_approval(&self) -> bool {
        true
    }

    async fn handle_channels(&self, batch: ChannelBatch) {
        let ChannelBatch {
            account,
            channels,
            context,
            ..
        } = batch;

        let Some(manager) = self.manager.upgrade() else {
            // Manager already gone: nothing to deliver to, but the batch must
            // still be acknowledged.
            context.finish();
            return;
        };

        for channel in channels {
            let Some(target_id) = channel.target_id().map(str::to_string) else {
                log::warn!(
                    "handle_channels: no target id for channel {}",
                    channel.object_path
                );
                continue;
            };
            if account.address.trim().is_empty() {
                log::warn!(
                    "handle_channels: cannot resolve conversation for channel {}: empty account address",
                    channel.object_path
                );
                continue;
            }

            let conversation = manager
                .resolve_conversation(&account.address, &target_id)
                .await;
            conversation.add_channel(channel);
        }

        context.finish();
    }
}
