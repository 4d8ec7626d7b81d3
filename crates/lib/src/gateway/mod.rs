//! Gateway: HTTP ingest surface standing where the session bus dispatcher
//! would deliver channel batches.
//!
//! Single port serves health, batch ingest, and conversation inspection.

mod server;
mod wire;

pub use server::run_gateway;
pub use wire::{BatchAccepted, ConversationInfo, WireBatch, WireChannel};
