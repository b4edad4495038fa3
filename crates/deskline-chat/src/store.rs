// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observable conversation state shared by every chat view.

use deskline_core::{ChatMessage, ConversationId, ConversationSummary};
use tokio::sync::watch;
use tracing::debug;

use crate::thread::MessageThread;

/// Everything a chat view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub active: Option<ConversationId>,
    pub thread: MessageThread,
}

impl ChatSnapshot {
    pub fn conversation(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }
}

/// Where a realtime broadcast ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Added to the open thread.
    Appended,
    /// Already in the open thread.
    Duplicate,
    /// Counted as unread on an inactive conversation.
    Unread,
    /// No conversation with that id is known.
    Unknown,
}

/// Single owner of conversation state. Views subscribe; services mutate
/// through the methods below.
#[derive(Debug)]
pub struct ConversationStore {
    state: watch::Sender<ChatSnapshot>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ChatSnapshot::default());
        Self { state }
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.state.subscribe()
    }

    pub fn active(&self) -> Option<ConversationId> {
        self.state.borrow().active
    }

    /// Replace the conversation list.
    pub fn set_conversations(&self, conversations: Vec<ConversationSummary>) {
        self.state.send_modify(|s| s.conversations = conversations);
    }

    /// Add or replace one conversation summary.
    pub fn upsert_conversation(&self, conversation: ConversationSummary) {
        self.state.send_modify(|s| {
            match s.conversations.iter_mut().find(|c| c.id == conversation.id) {
                Some(existing) => *existing = conversation,
                None => s.conversations.insert(0, conversation),
            }
        });
    }

    /// Make `id` the open conversation: its thread starts empty and its
    /// unread counter is reset.
    pub fn select(&self, id: ConversationId) {
        self.state.send_modify(|s| {
            s.active = Some(id);
            s.thread.clear();
            if let Some(conversation) = s.conversations.iter_mut().find(|c| c.id == id) {
                conversation.unread = 0;
            }
        });
    }

    /// Close the open conversation.
    pub fn clear_active(&self) {
        self.state.send_modify(|s| {
            s.active = None;
            s.thread.clear();
        });
    }

    /// Install a freshly loaded history for `id`.
    ///
    /// Discarded when `id` is no longer the open conversation, so a slow
    /// load cannot overwrite a thread the user already left. Messages that
    /// arrived by broadcast while the load was in flight are kept.
    pub fn load_thread(&self, id: ConversationId, messages: Vec<ChatMessage>) -> bool {
        self.state.send_if_modified(|s| {
            if s.active != Some(id) {
                debug!(conversation = %id, "discarding history for inactive conversation");
                return false;
            }
            let live = std::mem::take(&mut s.thread);
            let mut thread = MessageThread::from_batch(messages);
            for message in live.into_vec() {
                thread.insert(message);
            }
            s.thread = thread;
            true
        })
    }

    /// Append the server's answer to a local send, if `id` is still open.
    pub fn append_local(&self, id: ConversationId, message: ChatMessage) -> bool {
        self.state.send_if_modified(|s| {
            if s.active != Some(id) {
                return false;
            }
            s.thread.insert(message)
        })
    }

    /// Route a realtime broadcast.
    pub fn receive_broadcast(&self, message: ChatMessage) -> BroadcastOutcome {
        let conversation_id = ConversationId(message.thread_id);
        let mut outcome = BroadcastOutcome::Unknown;
        self.state.send_if_modified(|s| {
            if s.active == Some(conversation_id) {
                outcome = if s.thread.insert(message) {
                    BroadcastOutcome::Appended
                } else {
                    BroadcastOutcome::Duplicate
                };
                return outcome == BroadcastOutcome::Appended;
            }

            let Some(conversation) = s.conversations.iter_mut().find(|c| c.id == conversation_id)
            else {
                return false;
            };
            conversation.last_message = Some(message.text);
            conversation.last_activity = Some(message.timestamp);
            conversation.unread += 1;
            outcome = BroadcastOutcome::Unread;
            true
        });
        debug!(conversation = %conversation_id, ?outcome, "broadcast routed");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_test_utils::fixtures::{at, conversation, message};

    fn store_with(ids: &[u64]) -> ConversationStore {
        let store = ConversationStore::new();
        store.set_conversations(ids.iter().map(|id| conversation(*id)).collect());
        store
    }

    #[test]
    fn broadcast_for_active_conversation_appears_once() {
        let store = store_with(&[1]);
        store.select(ConversationId(1));

        assert!(store.append_local(ConversationId(1), message(Some(10), 1, "ana", "hola", 5)));
        assert_eq!(
            store.receive_broadcast(message(Some(10), 1, "ana", "hola", 5)),
            BroadcastOutcome::Duplicate
        );
        assert_eq!(
            store.receive_broadcast(message(None, 1, "ana", "hola", 5)),
            BroadcastOutcome::Duplicate
        );
        assert_eq!(store.snapshot().thread.len(), 1);
    }

    #[test]
    fn broadcast_for_inactive_conversation_counts_unread_once() {
        let store = store_with(&[1, 2]);
        store.select(ConversationId(1));
        store.append_local(ConversationId(1), message(Some(10), 1, "ana", "mine", 5));
        let before = store.snapshot().thread.clone();

        let outcome = store.receive_broadcast(message(None, 2, "bob", "ping", 7));
        assert_eq!(outcome, BroadcastOutcome::Unread);

        let snapshot = store.snapshot();
        let other = snapshot.conversation(ConversationId(2)).unwrap();
        assert_eq!(other.unread, 1);
        assert_eq!(other.last_message.as_deref(), Some("ping"));
        assert_eq!(other.last_activity, Some(at(7)));
        assert_eq!(snapshot.thread, before);
    }

    #[test]
    fn broadcast_for_unknown_conversation_is_ignored() {
        let store = store_with(&[1]);
        assert_eq!(
            store.receive_broadcast(message(None, 99, "x", "y", 1)),
            BroadcastOutcome::Unknown
        );
    }

    #[test]
    fn select_resets_thread_and_unread() {
        let store = store_with(&[1, 2]);
        store.select(ConversationId(1));
        store.receive_broadcast(message(None, 2, "bob", "a", 1));
        store.receive_broadcast(message(None, 2, "bob", "b", 2));
        assert_eq!(store.snapshot().conversation(ConversationId(2)).unwrap().unread, 2);

        store.select(ConversationId(2));
        let snapshot = store.snapshot();
        assert!(snapshot.thread.is_empty());
        assert_eq!(snapshot.active, Some(ConversationId(2)));
        assert_eq!(snapshot.conversation(ConversationId(2)).unwrap().unread, 0);
    }

    #[test]
    fn stale_history_is_discarded() {
        let store = store_with(&[1, 2]);
        store.select(ConversationId(1));
        store.select(ConversationId(2));
        assert!(!store.load_thread(ConversationId(1), vec![message(Some(1), 1, "a", "old", 1)]));
        assert!(store.snapshot().thread.is_empty());
    }

    #[test]
    fn history_merges_with_early_broadcasts() {
        let store = store_with(&[1]);
        store.select(ConversationId(1));
        store.receive_broadcast(message(None, 1, "bob", "live", 50));
        store.load_thread(
            ConversationId(1),
            vec![
                message(Some(2), 1, "ana", "second", 20),
                message(Some(1), 1, "ana", "first", 10),
            ],
        );
        let texts: Vec<_> = store
            .snapshot()
            .thread
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(texts, ["first", "second", "live"]);
    }

    #[test]
    fn local_append_ignored_after_switching() {
        let store = store_with(&[1, 2]);
        store.select(ConversationId(2));
        assert!(!store.append_local(ConversationId(1), message(Some(1), 1, "a", "late", 1)));
        assert!(store.snapshot().thread.is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let store = store_with(&[1]);
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        store.select(ConversationId(1));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().active, Some(ConversationId(1)));
    }
}
