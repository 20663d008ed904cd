use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::Document;
use crate::error::{ChatError, Result};

pub const CHATS_COLLECTION: &str = "chats";

/// Collection path holding the messages of one chat.
pub fn messages_collection(chat_id: &str) -> String {
    format!("{CHATS_COLLECTION}/{chat_id}/messages")
}

/// Conversation between one student and one company about one job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Chat {
    #[serde(skip)]
    pub id: String,
    pub student_id: Option<String>,
    pub company_id: Option<String>,
    pub participants: Vec<String>,
    pub job_id: Option<String>,
    pub job_title: Option<String>,
    pub last_message: Option<String>,
    pub last_sender_id: Option<String>,
    /// ms since epoch
    pub last_message_time: Option<i64>,
    /// ms since epoch
    pub created_at: Option<i64>,
}

impl Chat {
    /// Sort key of the chat list: last message time, else creation time, else 0.
    pub fn effective_timestamp(&self) -> i64 {
        self.last_message_time.or(self.created_at).unwrap_or(0)
    }

    /// The other party of the chat from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.student_id.as_deref() == Some(user_id) {
            return self.company_id.as_deref();
        }
        if self.company_id.as_deref() == Some(user_id) {
            return self.student_id.as_deref();
        }
        self.participants
            .iter()
            .map(String::as_str)
            .find(|participant| *participant != user_id)
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut chat: Chat = decode(CHATS_COLLECTION, doc)?;
        chat.id = doc.id.clone();
        Ok(chat)
    }
}

/// A single chat utterance, either server-confirmed or locally pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    /// ms since epoch; absent until the server stamps it
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl ChatMessage {
    pub fn from_document(chat_id: &str, doc: &Document) -> Result<Self> {
        let mut message: ChatMessage = decode(&messages_collection(chat_id), doc)?;
        message.id = doc.id.clone();
        if message.chat_id.is_empty() {
            message.chat_id = chat_id.to_string();
        }
        Ok(message)
    }

    /// Fields written to the message document; the timestamp is server-assigned.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("chatId".into(), Value::from(self.chat_id.clone()));
        fields.insert("senderId".into(), Value::from(self.sender_id.clone()));
        fields.insert("text".into(), Value::from(self.text.clone()));
        fields
    }
}

/// Local view state of a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Pending,
    Confirmed,
}

/// Message as shown by the chat screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub message: ChatMessage,
    pub state: MessageState,
}

/// Which of the three chat-list queries produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChatSource {
    /// `studentId == user`
    Student,
    /// `companyId == user`
    Company,
    /// `participants` contains user
    Participant,
}

impl ChatSource {
    pub const ALL: [ChatSource; 3] = [
        ChatSource::Student,
        ChatSource::Company,
        ChatSource::Participant,
    ];

    pub fn index(self) -> usize {
        match self {
            ChatSource::Student => 0,
            ChatSource::Company => 1,
            ChatSource::Participant => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChatSource::Student => "student",
            ChatSource::Company => "company",
            ChatSource::Participant => "participant",
        }
    }
}

/// Decode a document into a typed record, rejecting malformed fields.
fn decode<T: for<'de> Deserialize<'de>>(collection: &str, doc: &Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc.data.clone())).map_err(|err| ChatError::InvalidRecord {
        collection: collection.to_string(),
        id: doc.id.clone(),
        reason: err.to_string(),
    })
}

/// Decode every document of a snapshot, logging and skipping malformed ones.
pub fn decode_all<T>(docs: &[Document], decode_one: impl Fn(&Document) -> Result<T>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode_one(doc) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("Skipping document: {err}");
                None
            }
        })
        .collect()
}
