// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, deduplicated message list.

use deskline_core::ChatMessage;

/// Messages of one thread, ascending by `(timestamp, id)`.
///
/// Every insertion goes through [`MessageThread::insert`], so the order
/// holds no matter which delivery path a message came from or how late it
/// arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageThread {
    messages: Vec<ChatMessage>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a thread from a server batch, sorting and collapsing duplicates.
    pub fn from_batch(batch: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut thread = Self::new();
        for message in batch {
            thread.insert(message);
        }
        thread
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Insert `message` in order. Returns `false` when it was already present.
    ///
    /// A duplicate that carries an id the stored copy lacks replaces it, so
    /// a broadcast seen before its HTTP echo still ends up with the
    /// authoritative id.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if let Some(pos) = self.messages.iter().position(|m| m.same_message(&message)) {
            if self.messages[pos].id.is_none() && message.id.is_some() {
                self.messages.remove(pos);
                self.insert_at_order(message);
            }
            return false;
        }
        self.insert_at_order(message);
        true
    }

    fn insert_at_order(&mut self, message: ChatMessage) {
        let key = message.sort_key();
        let pos = self.messages.partition_point(|m| m.sort_key() <= key);
        self.messages.insert(pos, message);
    }

    pub fn into_vec(self) -> Vec<ChatMessage> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_test_utils::fixtures::message;
    use proptest::prelude::*;

    #[test]
    fn batch_is_sorted_ascending() {
        let thread = MessageThread::from_batch([
            message(Some(3), 1, "ana", "c", 30),
            message(Some(1), 1, "ana", "a", 10),
            message(Some(2), 1, "bob", "b", 20),
        ]);
        let ids: Vec<_> = thread.messages().iter().map(|m| m.id.unwrap().0).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn late_message_is_placed_by_timestamp() {
        let mut thread = MessageThread::from_batch([
            message(Some(1), 1, "ana", "a", 10),
            message(Some(3), 1, "ana", "c", 30),
        ]);
        assert!(thread.insert(message(Some(2), 1, "bob", "b", 20)));
        let texts: Vec<_> = thread.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[test]
    fn same_id_is_not_duplicated() {
        let mut thread = MessageThread::new();
        assert!(thread.insert(message(Some(5), 1, "ana", "hola", 10)));
        assert!(!thread.insert(message(Some(5), 1, "ana", "hola", 10)));
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn idless_broadcast_matches_by_fingerprint() {
        let mut thread = MessageThread::new();
        thread.insert(message(Some(5), 1, "ana", "hola", 10));
        assert!(!thread.insert(message(None, 1, "ana", "hola", 10)));
        assert_eq!(thread.messages()[0].id.map(|id| id.0), Some(5));
    }

    #[test]
    fn id_upgrades_idless_copy() {
        let mut thread = MessageThread::new();
        thread.insert(message(None, 1, "ana", "hola", 10));
        assert!(!thread.insert(message(Some(5), 1, "ana", "hola", 10)));
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.messages()[0].id.map(|id| id.0), Some(5));
    }

    #[test]
    fn equal_timestamps_tie_break_on_id() {
        let thread = MessageThread::from_batch([
            message(Some(9), 1, "ana", "x", 10),
            message(Some(4), 1, "bob", "y", 10),
        ]);
        let ids: Vec<_> = thread.messages().iter().map(|m| m.id.unwrap().0).collect();
        assert_eq!(ids, [4, 9]);
    }

    proptest! {
        #[test]
        fn any_insertion_order_yields_sorted_unique_thread(
            entries in proptest::collection::vec((0u64..20, 0i64..50), 0..40)
        ) {
            let mut thread = MessageThread::new();
            for (id, secs) in &entries {
                thread.insert(message(Some(*id), 1, "ana", "t", *secs));
            }

            let messages = thread.messages();
            for pair in messages.windows(2) {
                prop_assert!(pair[0].sort_key() <= pair[1].sort_key());
            }
            let mut ids: Vec<_> = messages.iter().map(|m| m.id).collect();
            let before = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), before);
        }
    }
}
