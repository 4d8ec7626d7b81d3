//! Parley core library — bus types, recipient matching, conversation
//! registry, channel handler, and the gateway ingest surface used by the CLI.

pub mod bus;
pub mod config;
pub mod conversations;
pub mod gateway;
pub mod handler;
pub mod matching;
