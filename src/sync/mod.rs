//! Chat reconciliation: the merged chat list, the per-chat message merger,
//! and the worker that feeds both from live queries.

pub mod chat_list;
pub mod client;
pub mod merge;
pub mod messages;
pub mod worker;

pub use chat_list::{ChatListReconciler, ChatRecency};
pub use client::ChatClient;
pub use merge::{MergePolicy, MergedView};
pub use messages::{DEFAULT_MATCH_WINDOW_MS, MessageStreamMerger, is_same_message};
pub use worker::SyncWorker;
