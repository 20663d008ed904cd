use std::collections::HashSet;

use crate::common::{Chat, ChatCommand, DisplayMessage, SyncEvent};
use crate::error::ChatError;
use crate::sync::{ChatListReconciler, MessageStreamMerger};

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub user_id: String,
    pub input_text: String,
    chats: ChatListReconciler,
    open_chat: Option<MessageStreamMerger>,
    /// Pending messages whose write failed. They stay on screen.
    undelivered: HashSet<String>,
    match_window_ms: i64,
}

impl AppState {
    pub fn new(user_id: impl Into<String>, match_window_ms: i64) -> Self {
        Self {
            user_id: user_id.into(),
            input_text: String::new(),
            chats: ChatListReconciler::new(),
            open_chat: None,
            undelivered: HashSet::new(),
            match_window_ms,
        }
    }

    pub fn apply_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::ChatsUpdated { source, chats } => {
                self.chats.apply(source, chats);
            }
            SyncEvent::ChatSourceFailed { source, reason } => {
                self.chats.apply_error(source, &reason);
            }
            SyncEvent::MessagesUpdated { chat_id, messages } => match &mut self.open_chat {
                Some(merger) if merger.chat_id() == chat_id => {
                    merger.apply_snapshot(messages);
                    self.undelivered.retain(|id| merger.is_pending(id));
                }
                _ => log::debug!("Dropping snapshot of chat {chat_id}, not open"),
            },
            SyncEvent::MessagesFailed { chat_id, reason } => {
                log::warn!("Messages of chat {chat_id} unavailable, showing last known: {reason}");
            }
            SyncEvent::SendFailed { temp_id, reason } => {
                log::warn!("Message {temp_id} not delivered: {reason}");
                self.undelivered.insert(temp_id);
            }
        }
    }

    /// The worker never received `command`. A lost send is marked like a
    /// failed write so the pending copy does not wait forever.
    pub fn command_not_queued(&mut self, command: ChatCommand, err: ChatError) {
        match command {
            ChatCommand::SendMessage { message } => self.apply_event(SyncEvent::SendFailed {
                temp_id: message.id,
                reason: err.to_string(),
            }),
            other => log::warn!("Sync worker missed {other:?}: {err}"),
        }
    }

    /// Switch to `chat_id`. `None` if it is already open.
    pub fn open_chat(&mut self, chat_id: &str) -> Option<ChatCommand> {
        if self.open_chat_id() == Some(chat_id) {
            return None;
        }
        self.open_chat = Some(MessageStreamMerger::with_window(
            chat_id,
            self.match_window_ms,
        ));
        self.undelivered.clear();
        Some(ChatCommand::OpenChat {
            chat_id: chat_id.to_string(),
        })
    }

    pub fn close_chat(&mut self) -> Option<ChatCommand> {
        self.open_chat.take().map(|_| ChatCommand::CloseChat)
    }

    /// Show `text` at once as a pending message and return the command that
    /// persists it. Blank input or no open chat yields `None`.
    pub fn submit(&mut self, text: &str, now_ms: i64) -> Option<ChatCommand> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let merger = self.open_chat.as_mut()?;
        let message = merger.stage_outgoing(&self.user_id, text, now_ms);
        Some(ChatCommand::SendMessage { message })
    }

    pub fn chats(&self) -> &[Chat] {
        self.chats.chats()
    }

    pub fn open_chat_id(&self) -> Option<&str> {
        self.open_chat.as_ref().map(MessageStreamMerger::chat_id)
    }

    pub fn open_chat_title(&self) -> Option<String> {
        let chat = self.chats.get(self.open_chat_id()?)?;
        Some(
            chat.job_title
                .clone()
                .unwrap_or_else(|| chat.counterpart(&self.user_id).unwrap_or("Chat").to_string()),
        )
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        self.open_chat
            .as_ref()
            .map(MessageStreamMerger::merged)
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.open_chat.as_ref().map_or(0, |m| m.pending().len())
    }

    pub fn is_undelivered(&self, message_id: &str) -> bool {
        self.undelivered.contains(message_id)
    }

    pub fn take_scroll_request(&mut self) -> bool {
        self.open_chat
            .as_mut()
            .is_some_and(MessageStreamMerger::take_scroll_request)
    }
}
