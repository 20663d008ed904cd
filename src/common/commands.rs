use super::types::ChatMessage;

/// Commands the chat screen sends to the sync worker.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Start listening to the messages of a chat, releasing any previous one.
    OpenChat { chat_id: String },
    /// Release the message listener of the open chat.
    CloseChat,
    /// Persist a message already shown as pending under its temporary id.
    SendMessage { message: ChatMessage },
}
