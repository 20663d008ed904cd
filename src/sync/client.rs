use serde_json::{Map, Value};

use crate::backend::{DocumentStore, Filter, Query, Subscription, Write, WriteBatch};
use crate::common::types::{CHATS_COLLECTION, decode_all, messages_collection};
use crate::common::{Chat, ChatMessage, ChatSource};
use crate::error::{ChatError, Result};

use super::chat_list::ChatListReconciler;

/// Chat operations over an explicitly injected document store.
#[derive(Clone)]
pub struct ChatClient<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ChatClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The live query behind each chat-list source.
    pub fn chat_source_query(source: ChatSource, user_id: &str) -> Query {
        let filter = match source {
            ChatSource::Student => Filter::equals("studentId", user_id),
            ChatSource::Company => Filter::equals("companyId", user_id),
            ChatSource::Participant => Filter::array_contains("participants", user_id),
        };
        Query::collection(CHATS_COLLECTION).filter(filter)
    }

    pub fn messages_query(chat_id: &str) -> Query {
        Query::collection(messages_collection(chat_id)).order_by("timestamp")
    }

    pub fn subscribe_chat_source(&self, source: ChatSource, user_id: &str) -> Result<Subscription> {
        self.store
            .subscribe(Self::chat_source_query(source, user_id))
    }

    pub fn subscribe_messages(&self, chat_id: &str) -> Result<Subscription> {
        self.store.subscribe(Self::messages_query(chat_id))
    }

    /// One-shot merged chat list. A failing source is skipped like a live one.
    pub fn load_chats(&self, user_id: &str) -> Result<Vec<Chat>> {
        let mut list = ChatListReconciler::new();
        for source in ChatSource::ALL {
            match self.store.query(&Self::chat_source_query(source, user_id)) {
                Ok(docs) => {
                    list.apply(source, decode_all(&docs, Chat::from_document));
                }
                Err(err) => {
                    list.apply_error(source, &err.to_string());
                }
            }
        }
        Ok(list.chats().to_vec())
    }

    pub fn load_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let docs = self.store.query(&Self::messages_query(chat_id))?;
        Ok(decode_all(&docs, |doc| ChatMessage::from_document(chat_id, doc)))
    }

    /// Existing chat between the two parties about the job, or a new one.
    pub fn create_or_get_chat(
        &self,
        student_id: &str,
        company_id: &str,
        job_id: &str,
        job_title: &str,
    ) -> Result<Chat> {
        let candidates = self
            .store
            .query(&Self::chat_source_query(ChatSource::Student, student_id))?;
        let existing = decode_all(&candidates, Chat::from_document)
            .into_iter()
            .find(|chat| {
                chat.company_id.as_deref() == Some(company_id)
                    && chat.job_id.as_deref() == Some(job_id)
            });
        if let Some(chat) = existing {
            return Ok(chat);
        }

        let chat_id = self.store.new_document_id();
        let mut fields = Map::new();
        fields.insert("studentId".into(), Value::from(student_id));
        fields.insert("companyId".into(), Value::from(company_id));
        fields.insert(
            "participants".into(),
            Value::from(vec![student_id.to_string(), company_id.to_string()]),
        );
        fields.insert("jobId".into(), Value::from(job_id));
        fields.insert("jobTitle".into(), Value::from(job_title));

        let mut batch = WriteBatch::new();
        batch.push(Write::set(CHATS_COLLECTION, &chat_id, fields).server_timestamp("createdAt"));
        self.store.commit(batch)?;
        log::info!("Created chat {chat_id} for job {job_id}");

        let doc = self
            .store
            .get(CHATS_COLLECTION, &chat_id)?
            .ok_or_else(|| ChatError::NotFound {
                collection: CHATS_COLLECTION.to_string(),
                id: chat_id.clone(),
            })?;
        Chat::from_document(&doc)
    }

    /// Persist `message` (a pending message) together with the chat's
    /// last-message summary in one atomic batch. Returns the server id.
    pub fn send_message(&self, message: &ChatMessage) -> Result<String> {
        let message_id = self.store.new_document_id();

        let mut summary = Map::new();
        summary.insert("lastMessage".into(), Value::from(message.text.clone()));
        summary.insert("lastSenderId".into(), Value::from(message.sender_id.clone()));

        let mut batch = WriteBatch::new();
        batch
            .push(
                Write::set(messages_collection(&message.chat_id), &message_id, message.to_fields())
                    .server_timestamp("timestamp"),
            )
            .push(
                Write::merge(CHATS_COLLECTION, &message.chat_id, summary)
                    .server_timestamp("lastMessageTime"),
            );
        self.store.commit(batch)?;

        log::debug!("Message {} stored as {message_id}", message.id);
        Ok(message_id)
    }
}
