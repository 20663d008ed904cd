//! Document-store abstraction the chat client talks to.
//!
//! The store offers live queries (an initial snapshot followed by a full
//! snapshot per change), one-shot reads, atomic batches and single merge
//! writes. `storage::LocalStore` is the SQLite-backed implementation.

pub mod query;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::Result;

pub use query::{Document, Filter, Query};

/// One delivery of a live query. Errors do not end the subscription.
pub type Snapshot = Result<Vec<Document>>;

/// A single document write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub collection: String,
    pub id: String,
    pub data: Map<String, Value>,
    /// Merge top-level fields into an existing document instead of replacing it.
    pub merge: bool,
    /// Fields the store fills with its own commit time (ms since epoch).
    pub server_timestamps: Vec<String>,
}

impl Write {
    pub fn set(
        collection: impl Into<String>,
        id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            data,
            merge: false,
            server_timestamps: Vec::new(),
        }
    }

    pub fn merge(
        collection: impl Into<String>,
        id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            merge: true,
            ..Self::set(collection, id, data)
        }
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamps.push(field.into());
        self
    }
}

/// Writes applied all-or-nothing by `DocumentStore::commit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Live query handle. Dropping it releases the listener in the store.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next snapshot. `None` once the store has gone away.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Take a snapshot that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Backend operations used by the chat client.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Start a live query. The initial snapshot is queued before this returns.
    fn subscribe(&self, query: Query) -> Result<Subscription>;

    /// One-shot read.
    fn query(&self, query: &Query) -> Result<Vec<Document>>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Apply every write of the batch or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Single document write; `merge` keeps fields not present in `data`.
    fn set(&self, collection: &str, id: &str, data: Map<String, Value>, merge: bool) -> Result<()> {
        let write = if merge {
            Write::merge(collection, id, data)
        } else {
            Write::set(collection, id, data)
        };
        let mut batch = WriteBatch::new();
        batch.push(write);
        self.commit(batch)
    }

    /// Fresh id for a document created by the client.
    fn new_document_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
