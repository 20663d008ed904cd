use super::types::{Chat, ChatMessage, ChatSource};

/// Events the sync worker pushes to the chat screen.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Latest snapshot of one chat-list source.
    ChatsUpdated {
        source: ChatSource,
        chats: Vec<Chat>,
    },
    /// A chat-list source failed; its previous snapshot stays in use.
    ChatSourceFailed { source: ChatSource, reason: String },
    /// Full confirmed message snapshot of a chat, ascending by timestamp.
    MessagesUpdated {
        chat_id: String,
        messages: Vec<ChatMessage>,
    },
    MessagesFailed { chat_id: String, reason: String },
    /// The write behind a pending message failed; it stays pending.
    SendFailed { temp_id: String, reason: String },
}
