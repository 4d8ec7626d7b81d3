//! Bus-facing types: channel hand-off batches, handler registration, and an
//! in-process dispatcher.
//!
//! The real session bus lives outside this process; these types model the
//! slice of it the handler consumes. `LocalBus` is the in-process registrar
//! the gateway and tests dispatch through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};

/// Immutable property holding the remote target uid of a channel.
pub const TARGET_ID_PROPERTY: &str = "org.freedesktop.Telepathy.Channel.TargetID";

/// Channel type property value for text channels.
pub const CHANNEL_TYPE_TEXT: &str = "org.freedesktop.Telepathy.Channel.Type.Text";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("handler name must not be empty")]
    EmptyName,
    #[error("handler name already registered: {0}")]
    NameTaken(String),
    #[error("no handler registered under name: {0}")]
    NoSuchHandler(String),
}

/// A channel handed off by the dispatcher: an object path plus the immutable
/// property map captured at creation time.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub object_path: String,
    pub immutable_properties: HashMap<String, serde_json::Value>,
}

impl ChannelHandle {
    pub fn new(
        object_path: impl Into<String>,
        immutable_properties: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            immutable_properties,
        }
    }

    /// Remote target uid from the immutable properties. None when the
    /// property is absent, not a string, or empty.
    pub fn target_id(&self) -> Option<&str> {
        self.immutable_properties
            .get(TARGET_ID_PROPERTY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Account the batch was delivered for. Only the address is consumed here.
#[derive(Debug, Clone)]
pub struct AccountRef {
    /// Account address, e.g. "/org/freedesktop/Telepathy/Account/ring/tel/account0".
    pub address: String,
}

/// Connection the channels belong to. Carried through for completeness; the
/// handler does not consume it.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    pub address: String,
}

/// A channel request satisfied by this hand-off.
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub address: String,
}

/// Dispatcher metadata accompanying a batch.
#[derive(Debug, Clone, Default)]
pub struct HandlerInfo {
    pub details: HashMap<String, serde_json::Value>,
}

/// Completion acknowledgment for one batch. Finished exactly once; consuming
/// `finish` makes a second acknowledgment unrepresentable.
#[derive(Debug)]
pub struct BatchContext {
    tx: oneshot::Sender<()>,
}

impl BatchContext {
    /// Create a context plus the receiver the dispatcher awaits completion on.
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Mark the batch as handled. The dispatcher may already have gone away.
    pub fn finish(self) {
        let _ = self.tx.send(());
    }
}

/// One hand-off from the dispatcher: zero or more new channels on an account.
#[derive(Debug)]
pub struct ChannelBatch {
    pub account: AccountRef,
    pub connection: ConnectionRef,
    pub channels: Vec<ChannelHandle>,
    pub requests_satisfied: Vec<ChannelRequest>,
    pub user_action_time: DateTime<Utc>,
    pub handler_info: HandlerInfo,
    pub context: BatchContext,
}

/// Class of channels a handler declares interest in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelClassFilter {
    pub channel_type: String,
}

impl ChannelClassFilter {
    /// Filter for 1:1 text chat channels.
    pub fn text_chat() -> Self {
        Self {
            channel_type: CHANNEL_TYPE_TEXT.to_string(),
        }
    }
}

/// A registered channel handler: the dispatcher calls `handle_channels` for
/// each batch matching the filter.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Channel class this handler accepts.
    fn channel_filter(&self) -> ChannelClassFilter;

    /// When true, the dispatcher skips the user-approval step for channels of
    /// the handled class.
    fn bypass_approval(&self) -> bool;

    /// Take ownership of a batch of new channels. Must finish the batch
    /// context exactly once, whether or not any channel was processed.
    async fn handle_channels(&self, batch: ChannelBatch);
}

/// Registers a handler under a well-known name on the bus.
#[async_trait]
pub trait ClientRegistrar: Send + Sync {
    async fn register_client(
        &self,
        handler: Arc<dyn ChannelHandler>,
        name: &str,
    ) -> Result<(), BusError>;
}

/// In-process bus: registrar plus dispatch by name. Stands where the session
/// bus dispatcher would; the gateway feeds it decoded batches.
pub struct LocalBus {
    handlers: RwLock<HashMap<String, Arc<dyn ChannelHandler>>>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Deliver a batch to the handler registered under `name` and wait for it
    /// to finish the batch context.
    pub async fn dispatch(&self, name: &str, batch: ChannelBatch) -> Result<(), BusError> {
        let handler = {
            let g = self.handlers.read().await;
            g.get(name).cloned()
        };
        let handler = handler.ok_or_else(|| BusError::NoSuchHandler(name.to_string()))?;
        handler.handle_channels(batch).await;
        Ok(())
    }

    pub async fn handler_names(&self) -> Vec<String> {
        let g = self.handlers.read().await;
        g.keys().cloned().collect()
    }
}

#[async_trait]
impl ClientRegistrar for LocalBus {
    async fn register_client(
        &self,
        handler: Arc<dyn ChannelHandler>,
        name: &str,
    ) -> Result<(), BusError> {
        if name.is_empty() {
            return Err(BusError::EmptyName);
        }
        let mut g = self.handlers.write().await;
        if g.contains_key(name) {
            return Err(BusError::NameTaken(name.to_string()));
        }
        log::debug!(
            "registering {} for {} (bypass approval: {})",
            name,
            handler.channel_filter().channel_type,
            handler.bypass_approval()
        );
        g.insert(name.to_string(), handler);
        Ok(())
    }
}
