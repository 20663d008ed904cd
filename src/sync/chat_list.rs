use std::cmp::Ordering;

use crate::common::{Chat, ChatSource};

use super::merge::{MergePolicy, MergedView};

/// Chats keyed by id, newest effective timestamp first, ties by ascending id.
pub struct ChatRecency;

impl MergePolicy for ChatRecency {
    type Item = Chat;
    type Key = String;

    fn key(&self, chat: &Chat) -> String {
        chat.id.clone()
    }

    fn compare(&self, a: &Chat, b: &Chat) -> Ordering {
        b.effective_timestamp()
            .cmp(&a.effective_timestamp())
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Merged chat list of the current user, fed by the three source queries.
pub struct ChatListReconciler {
    view: MergedView<ChatRecency>,
}

impl Default for ChatListReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatListReconciler {
    pub fn new() -> Self {
        Self {
            view: MergedView::new(ChatRecency, ChatSource::ALL.len()),
        }
    }

    /// Replace one source's snapshot and return the recomputed list.
    pub fn apply(&mut self, source: ChatSource, chats: Vec<Chat>) -> &[Chat] {
        log::debug!("Chat source {} delivered {} chat(s)", source.as_str(), chats.len());
        self.view.update(source.index(), chats)
    }

    /// A source query failed: keep what it delivered last.
    pub fn apply_error(&mut self, source: ChatSource, reason: &str) -> &[Chat] {
        log::warn!(
            "Chat source {} failed, keeping last snapshot: {reason}",
            source.as_str()
        );
        self.view.fail(source.index())
    }

    pub fn chats(&self) -> &[Chat] {
        self.view.view()
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats().iter().find(|chat| chat.id == chat_id)
    }
}
