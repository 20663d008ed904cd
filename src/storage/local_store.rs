use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::backend::{Document, DocumentStore, Query, Snapshot, Subscription, WriteBatch};
use crate::error::{ChatError, Result};

use super::database::Database;

/// Source of server-side commit time, in ms since epoch.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

struct Listener {
    id: u64,
    query: Query,
    sender: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    db: Mutex<Database>,
    listeners: Mutex<Vec<Listener>>,
    denied: Mutex<HashSet<String>>,
    offline: AtomicBool,
    next_listener_id: AtomicU64,
    clock: Clock,
}

/// SQLite-backed document store with live queries.
///
/// Lock order is always `db` then `listeners`, so a commit and a new
/// subscription cannot interleave between snapshot and registration.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalStore {
    /// Open (or create) a store file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    log::error!("Failed to create data dir {}: {err}", parent.display());
                    ChatError::Unavailable
                })?;
            }
        }
        Ok(Self::from_database(Database::new(path)?, system_clock()))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::in_memory()?, system_clock()))
    }

    pub fn from_database(db: Database, clock: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                listeners: Mutex::new(Vec::new()),
                denied: Mutex::new(HashSet::new()),
                offline: AtomicBool::new(false),
                next_listener_id: AtomicU64::new(1),
                clock,
            }),
        }
    }

    /// Deny or restore access to a collection. Live listeners on it receive an
    /// error snapshot when denied and a fresh snapshot when restored.
    pub fn set_denied(&self, collection: &str, denied: bool) {
        {
            let mut set = lock(&self.inner.denied);
            if denied {
                set.insert(collection.to_string());
            } else {
                set.remove(collection);
            }
        }
        log::info!("Access to `{collection}` denied={denied}");

        let db = lock(&self.inner.db);
        let mut listeners = lock(&self.inner.listeners);
        listeners.retain(|listener| {
            if listener.query.collection != collection {
                return true;
            }
            let snapshot = if denied {
                Err(ChatError::PermissionDenied(collection.to_string()))
            } else {
                run_query(db.connection(), &listener.query)
            };
            listener.sender.send(snapshot).is_ok()
        });
    }

    /// While offline every commit fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
        log::info!("Local store offline={offline}");
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn check_access(&self, collection: &str) -> Result<()> {
        if lock(&self.inner.denied).contains(collection) {
            return Err(ChatError::PermissionDenied(collection.to_string()));
        }
        Ok(())
    }

    fn notify(&self, db: &Database, touched: &HashSet<String>) {
        let mut listeners = lock(&self.inner.listeners);
        listeners.retain(|listener| {
            if !touched.contains(&listener.query.collection) {
                return true;
            }
            let snapshot = run_query(db.connection(), &listener.query);
            if let Err(err) = &snapshot {
                log::warn!(
                    "Listener {} on `{}` failed: {err}",
                    listener.id,
                    listener.query.collection
                );
            }
            listener.sender.send(snapshot).is_ok()
        });
    }
}

impl DocumentStore for LocalStore {
    fn subscribe(&self, query: Query) -> Result<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);

        let db = lock(&self.inner.db);
        let initial = match self.check_access(&query.collection) {
            Ok(()) => run_query(db.connection(), &query),
            Err(err) => Err(err),
        };
        // The receiver is still held here, so this cannot fail.
        let _ = sender.send(initial);

        log::debug!("Listener {id} attached to `{}`", query.collection);
        lock(&self.inner.listeners).push(Listener { id, query, sender });
        drop(db);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(receiver, move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).retain(|listener| listener.id != id);
                log::debug!("Listener {id} released");
            }
        }))
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.check_access(&query.collection)?;
        let db = lock(&self.inner.db);
        run_query(db.connection(), query)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check_access(collection)?;
        let db = lock(&self.inner.db);
        load_document(db.connection(), collection, id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ChatError::Unavailable);
        }
        for write in batch.writes() {
            self.check_access(&write.collection)?;
        }
        if batch.is_empty() {
            return Ok(());
        }

        let now = (self.inner.clock)();
        let mut db = lock(&self.inner.db);
        let mut touched = HashSet::new();
        {
            let tx = db.connection_mut().transaction()?;
            for write in batch.writes() {
                let mut data = if write.merge {
                    load_document(&tx, &write.collection, &write.id)?
                        .map(|doc| doc.data)
                        .unwrap_or_default()
                } else {
                    Map::new()
                };
                for (key, value) in &write.data {
                    data.insert(key.clone(), value.clone());
                }
                for field in &write.server_timestamps {
                    data.insert(field.clone(), Value::from(now));
                }

                tx.execute(
                    "INSERT OR REPLACE INTO documents (collection, id, data, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        write.collection,
                        write.id,
                        serde_json::to_string(&data)?,
                        now
                    ],
                )?;
                touched.insert(write.collection.clone());
            }
            tx.commit()?;
        }

        log::debug!("Committed {} write(s)", batch.writes().len());
        self.notify(&db, &touched);
        Ok(())
    }
}

fn parse_data(collection: &str, id: &str, raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(ChatError::InvalidRecord {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: "stored document is not an object".to_string(),
        }),
    }
}

fn load_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(Some(Document::new(id, parse_data(collection, id, &raw)?))),
        None => Ok(None),
    }
}

fn run_query(conn: &Connection, query: &Query) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare("SELECT id, data FROM documents WHERE collection = ?1")?;
    let rows = stmt
        .query_map(params![query.collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let documents = rows
        .into_iter()
        .map(|(id, raw)| -> Result<Document> {
            let data = parse_data(&query.collection, &id, &raw)?;
            Ok(Document::new(id, data))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(query.evaluate(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Filter, Write};
    use serde_json::json;

    fn fixed_clock(ms: i64) -> Clock {
        Arc::new(move || ms)
    }

    fn store() -> LocalStore {
        LocalStore::from_database(Database::in_memory().expect("in-memory db"), fixed_clock(42))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ids(snapshot: Snapshot) -> Vec<String> {
        snapshot
            .expect("snapshot ok")
            .into_iter()
            .map(|doc| doc.id)
            .collect()
    }

    #[test]
    fn subscribe_delivers_initial_and_change_snapshots() {
        let store = store();
        store
            .set("chats", "c1", object(json!({"studentId": "u1"})), false)
            .expect("seed");

        let mut sub = store
            .subscribe(Query::collection("chats").filter(Filter::equals("studentId", "u1")))
            .expect("subscribe");
        assert_eq!(ids(sub.try_recv().expect("initial")), vec!["c1"]);

        store
            .set("chats", "c2", object(json!({"studentId": "u1"})), false)
            .expect("write");
        assert_eq!(ids(sub.try_recv().expect("update")), vec!["c1", "c2"]);
    }

    #[test]
    fn listeners_on_other_collections_are_not_notified() {
        let store = store();
        let mut sub = store.subscribe(Query::collection("chats")).expect("subscribe");
        sub.try_recv().expect("initial");

        store
            .set("users", "u1", object(json!({"name": "Ana"})), false)
            .expect("write");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn merge_write_keeps_existing_fields_and_fills_server_timestamp() {
        let store = store();
        store
            .set("chats", "c1", object(json!({"jobTitle": "Intern", "lastMessage": "a"})), false)
            .expect("seed");

        let mut batch = WriteBatch::new();
        batch.push(
            Write::merge("chats", "c1", object(json!({"lastMessage": "b"})))
                .server_timestamp("lastMessageTime"),
        );
        store.commit(batch).expect("commit");

        let doc = store.get("chats", "c1").expect("get").expect("exists");
        assert_eq!(doc.field("jobTitle"), Some(&json!("Intern")));
        assert_eq!(doc.field("lastMessage"), Some(&json!("b")));
        assert_eq!(doc.field("lastMessageTime"), Some(&json!(42)));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let store = store();
        store.set_denied("chats", true);

        let mut batch = WriteBatch::new();
        batch
            .push(Write::set("chats/c1/messages", "m1", object(json!({"text": "hi"}))))
            .push(Write::merge("chats", "c1", object(json!({"lastMessage": "hi"}))));
        assert!(matches!(
            store.commit(batch),
            Err(ChatError::PermissionDenied(_))
        ));

        let messages = store
            .query(&Query::collection("chats/c1/messages"))
            .expect("query");
        assert!(messages.is_empty());
    }

    #[test]
    fn offline_store_rejects_writes() {
        let store = store();
        store.set_offline(true);
        let result = store.set("chats", "c1", Map::new(), false);
        assert!(matches!(result, Err(ChatError::Unavailable)));
    }

    #[test]
    fn dropping_subscription_releases_listener() {
        let store = store();
        let sub = store.subscribe(Query::collection("chats")).expect("subscribe");
        assert_eq!(store.listener_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn denial_pushes_error_then_fresh_snapshot_on_restore() {
        let store = store();
        store
            .set("chats", "c1", object(json!({"studentId": "u1"})), false)
            .expect("seed");
        let mut sub = store.subscribe(Query::collection("chats")).expect("subscribe");
        sub.try_recv().expect("initial");

        store.set_denied("chats", true);
        assert!(matches!(
            sub.try_recv(),
            Some(Err(ChatError::PermissionDenied(_)))
        ));

        store.set_denied("chats", false);
        assert_eq!(ids(sub.try_recv().expect("restored")), vec!["c1"]);
    }

    #[test]
    fn store_file_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("chat.db");
        {
            let store = LocalStore::open(&path).expect("open");
            store
                .set("chats", "c1", object(json!({"jobTitle": "Backend"})), false)
                .expect("write");
        }
        let reopened = LocalStore::open(&path).expect("reopen");
        let doc = reopened.get("chats", "c1").expect("get").expect("exists");
        assert_eq!(doc.field("jobTitle"), Some(&json!("Backend")));
    }
}
