//! Chat synchronization core of the UTrabajo client.
//!
//! Live chat-list and message queries from a document store are reconciled
//! into a de-duplicated, recency-sorted chat list and a per-chat message list
//! that shows optimistic (pending) sends until the server echoes them back.

pub mod backend;
pub mod common;
pub mod config;
pub mod error;
pub mod storage;
pub mod sync;
pub mod ui;

pub use error::{ChatError, Result};
