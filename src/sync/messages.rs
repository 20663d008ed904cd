use uuid::Uuid;

use crate::common::{ChatMessage, DisplayMessage, MessageState};

/// Local and server clocks stamp the same message independently.
pub const DEFAULT_MATCH_WINDOW_MS: i64 = 5_000;

pub const TEMP_ID_PREFIX: &str = "local-";

pub fn temp_message_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4().simple())
}

/// Whether `confirmed` is the server copy of the locally `pending` message.
pub fn is_same_message(pending: &ChatMessage, confirmed: &ChatMessage, window_ms: i64) -> bool {
    if !pending.id.is_empty() && pending.id == confirmed.id {
        return true;
    }
    if pending.text != confirmed.text || pending.sender_id != confirmed.sender_id {
        return false;
    }
    match (pending.timestamp, confirmed.timestamp) {
        (Some(local), Some(server)) => local.abs_diff(server) <= window_ms.unsigned_abs(),
        _ => true,
    }
}

/// Display list of one open chat: the confirmed snapshot followed by the
/// pending messages the server has not echoed back yet.
pub struct MessageStreamMerger {
    chat_id: String,
    window_ms: i64,
    confirmed: Vec<ChatMessage>,
    pending: Vec<ChatMessage>,
    merged: Vec<DisplayMessage>,
    scroll_to_latest: bool,
}

impl MessageStreamMerger {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self::with_window(chat_id, DEFAULT_MATCH_WINDOW_MS)
    }

    pub fn with_window(chat_id: impl Into<String>, window_ms: i64) -> Self {
        Self {
            chat_id: chat_id.into(),
            window_ms,
            confirmed: Vec::new(),
            pending: Vec::new(),
            merged: Vec::new(),
            scroll_to_latest: false,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Optimistic echo of a message the user just submitted. The returned
    /// message carries a temporary id and the local clock.
    pub fn stage_outgoing(&mut self, sender_id: &str, text: &str, now_ms: i64) -> ChatMessage {
        let message = ChatMessage {
            id: temp_message_id(),
            chat_id: self.chat_id.clone(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: Some(now_ms),
        };
        self.push_pending(message.clone());
        message
    }

    pub fn push_pending(&mut self, message: ChatMessage) {
        self.pending.push(message);
        self.recompute();
    }

    /// Replace the confirmed snapshot. Pending messages the snapshot confirms
    /// leave the pending set; each confirmed message absorbs at most one.
    pub fn apply_snapshot(&mut self, confirmed: Vec<ChatMessage>) -> &[DisplayMessage] {
        let mut claimed = vec![false; confirmed.len()];
        let pending = std::mem::take(&mut self.pending);

        // Exact id matches first so a content match cannot steal them.
        let mut unmatched = Vec::with_capacity(pending.len());
        for message in pending {
            let by_id = confirmed
                .iter()
                .enumerate()
                .position(|(i, c)| !claimed[i] && !message.id.is_empty() && c.id == message.id);
            match by_id {
                Some(i) => claimed[i] = true,
                None => unmatched.push(message),
            }
        }

        for message in unmatched {
            let by_content = confirmed
                .iter()
                .enumerate()
                .position(|(i, c)| !claimed[i] && is_same_message(&message, c, self.window_ms));
            match by_content {
                Some(i) => {
                    claimed[i] = true;
                    log::debug!(
                        "Pending {} confirmed as {} in chat {}",
                        message.id,
                        confirmed[i].id,
                        self.chat_id
                    );
                }
                None => self.pending.push(message),
            }
        }

        self.confirmed = confirmed;
        self.recompute();
        &self.merged
    }

    pub fn merged(&self) -> &[DisplayMessage] {
        &self.merged
    }

    pub fn pending(&self) -> &[ChatMessage] {
        &self.pending
    }

    pub fn confirmed(&self) -> &[ChatMessage] {
        &self.confirmed
    }

    pub fn is_pending(&self, message_id: &str) -> bool {
        self.pending.iter().any(|m| m.id == message_id)
    }

    /// Returns true once after every recomputation.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_latest)
    }

    fn recompute(&mut self) {
        self.merged = self
            .confirmed
            .iter()
            .map(|message| DisplayMessage {
                message: message.clone(),
                state: MessageState::Confirmed,
            })
            .chain(self.pending.iter().map(|message| DisplayMessage {
                message: message.clone(),
                state: MessageState::Pending,
            }))
            .collect();
        self.scroll_to_latest = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str, text: &str, ts: Option<i64>) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            chat_id: "c1".into(),
            sender_id: sender.into(),
            text: text.into(),
            timestamp: ts,
        }
    }

    fn texts(merger: &MessageStreamMerger) -> Vec<(&str, MessageState)> {
        merger
            .merged()
            .iter()
            .map(|d| (d.message.id.as_str(), d.state))
            .collect()
    }

    #[test]
    fn equal_ids_match_regardless_of_content() {
        let pending = message("m1", "u1", "a", Some(0));
        let confirmed = message("m1", "u1", "b", Some(60_000));
        assert!(is_same_message(&pending, &confirmed, DEFAULT_MATCH_WINDOW_MS));
    }

    #[test]
    fn content_match_respects_window() {
        let pending = message("local-1", "u1", "Hello", Some(10_000));
        let inside = message("srv-1", "u1", "Hello", Some(15_000));
        let outside = message("srv-2", "u1", "Hello", Some(15_001));
        let other_sender = message("srv-3", "u2", "Hello", Some(10_000));
        assert!(is_same_message(&pending, &inside, DEFAULT_MATCH_WINDOW_MS));
        assert!(!is_same_message(&pending, &outside, DEFAULT_MATCH_WINDOW_MS));
        assert!(!is_same_message(&pending, &other_sender, DEFAULT_MATCH_WINDOW_MS));
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let pending = message("local-1", "u1", "hi", Some(1_000));
        let oldest = message("srv-1", "u1", "hi", Some(i64::MIN));
        let newest = message("srv-2", "u1", "hi", Some(i64::MAX));
        assert!(!is_same_message(&pending, &oldest, DEFAULT_MATCH_WINDOW_MS));
        assert!(!is_same_message(&pending, &newest, DEFAULT_MATCH_WINDOW_MS));

        let mut merger = MessageStreamMerger::new("c1");
        merger.push_pending(pending);
        merger.apply_snapshot(vec![oldest, newest]);
        assert!(merger.is_pending("local-1"));
        assert_eq!(merger.merged().len(), 3);
    }

    #[test]
    fn missing_timestamp_matches_on_text_and_sender() {
        let pending = message("local-1", "u1", "Hello", Some(10_000));
        let unstamped = message("srv-1", "u1", "Hello", None);
        assert!(is_same_message(&pending, &unstamped, DEFAULT_MATCH_WINDOW_MS));
    }

    #[test]
    fn ping_is_replaced_by_its_server_copy() {
        let mut merger = MessageStreamMerger::new("c1");
        merger.push_pending(message("local-abc", "u1", "ping", Some(1_000)));
        assert_eq!(texts(&merger), vec![("local-abc", MessageState::Pending)]);

        merger.apply_snapshot(vec![message("srv-123", "u1", "ping", Some(1_200))]);
        assert_eq!(texts(&merger), vec![("srv-123", MessageState::Confirmed)]);
        assert!(merger.pending().is_empty());
    }

    #[test]
    fn unmatched_pending_stays_after_confirmed() {
        let mut merger = MessageStreamMerger::new("c1");
        merger.push_pending(message("local-1", "u1", "still sending", Some(50_000)));
        merger.apply_snapshot(vec![
            message("srv-1", "u2", "hi", Some(1_000)),
            message("srv-2", "u1", "hello", Some(2_000)),
        ]);
        assert_eq!(
            texts(&merger),
            vec![
                ("srv-1", MessageState::Confirmed),
                ("srv-2", MessageState::Confirmed),
                ("local-1", MessageState::Pending),
            ]
        );
        assert!(merger.is_pending("local-1"));
    }

    #[test]
    fn one_confirmation_absorbs_one_of_two_identical_pendings() {
        let mut merger = MessageStreamMerger::new("c1");
        merger.push_pending(message("local-1", "u1", "ok", Some(1_000)));
        merger.push_pending(message("local-2", "u1", "ok", Some(1_100)));

        merger.apply_snapshot(vec![message("srv-1", "u1", "ok", Some(1_050))]);
        assert_eq!(merger.pending().len(), 1);
        assert_eq!(merger.pending()[0].id, "local-2");

        merger.apply_snapshot(vec![
            message("srv-1", "u1", "ok", Some(1_050)),
            message("srv-2", "u1", "ok", Some(1_150)),
        ]);
        assert!(merger.pending().is_empty());
        assert_eq!(merger.merged().len(), 2);
    }

    #[test]
    fn id_match_wins_over_earlier_content_match() {
        let mut merger = MessageStreamMerger::new("c1");
        merger.push_pending(message("local-1", "u1", "ok", Some(1_000)));
        merger.push_pending(message("srv-9", "u1", "ok", Some(1_000)));

        merger.apply_snapshot(vec![message("srv-9", "u1", "ok", Some(1_010))]);
        assert_eq!(merger.pending().len(), 1);
        assert_eq!(merger.pending()[0].id, "local-1");
    }

    #[test]
    fn stage_outgoing_is_visible_before_any_snapshot() {
        let mut merger = MessageStreamMerger::new("c1");
        let staged = merger.stage_outgoing("u1", "hola", 777);
        assert!(staged.id.starts_with(TEMP_ID_PREFIX));
        assert_eq!(staged.chat_id, "c1");
        assert_eq!(merger.merged().len(), 1);
        assert_eq!(merger.merged()[0].state, MessageState::Pending);
    }

    #[test]
    fn every_recompute_requests_scroll_once() {
        let mut merger = MessageStreamMerger::new("c1");
        assert!(!merger.take_scroll_request());
        merger.apply_snapshot(Vec::new());
        assert!(merger.take_scroll_request());
        assert!(!merger.take_scroll_request());
    }
}
