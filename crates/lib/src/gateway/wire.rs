//! Gateway wire types: JSON batch ingest and conversation listing.

use crate::bus::{
    AccountRef, BatchContext, ChannelBatch, ChannelHandle, ChannelRequest, ConnectionRef,
    HandlerInfo,
};
use crate::conversations::Conversation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Wire batch: `{ "account", "connection", "channels", "requestsSatisfied", "userActionTime" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBatch {
    pub account: String,
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub channels: Vec<WireChannel>,
    #[serde(default)]
    pub requests_satisfied: Vec<String>,
    /// Absent means "now".
    #[serde(default)]
    pub user_action_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub handler_info: HashMap<String, serde_json::Value>,
}

/// One channel in a wire batch: object path plus immutable properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChannel {
    pub object_path: String,
    #[serde(default)]
    pub immutable_properties: HashMap<String, serde_json::Value>,
}

impl WireBatch {
    /// Build the dispatchable batch plus the receiver that resolves when the
    /// handler finishes it.
    pub fn into_batch(self) -> (ChannelBatch, oneshot::Receiver<()>) {
        let (context, done) = BatchContext::new();
        let batch = ChannelBatch {
            account: AccountRef {
                address: self.account,
            },
            connection: ConnectionRef {
                address: self.connection,
            },
            channels: self
                .channels
                .into_iter()
                .map(|c| ChannelHandle::new(c.object_path, c.immutable_properties))
                .collect(),
            requests_satisfied: self
                .requests_satisfied
                .into_iter()
                .map(|address| ChannelRequest { address })
                .collect(),
            user_action_time: self.user_action_time.unwrap_or_else(Utc::now),
            handler_info: HandlerInfo {
                details: self.handler_info,
            },
            context,
        };
        (batch, done)
    }
}

/// Response for POST /batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAccepted {
    /// Number of channels the batch carried (processed or skipped).
    pub channels: usize,
}

/// One entry of GET /conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub id: Uuid,
    pub local_uid: String,
    pub remote_uid: String,
    pub channels: usize,
}

impl From<&Conversation> for ConversationInfo {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id(),
            local_uid: c.local_uid().to_string(),
            remote_uid: c.remote_uid().to_string(),
            channels: c.channel_count(),
        }
    }
}
