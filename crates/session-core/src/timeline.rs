use crate::types::ChatMessage;

/// Ordered in-memory message log for one session.
///
/// Live messages are appended in arrival order. Join history is spliced in
/// front as one contiguous block. Entries are never re-sorted by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    items: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current messages in display order.
    pub fn items(&self) -> &[ChatMessage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append one live message.
    pub fn append(&mut self, message: ChatMessage) {
        self.items.push(message);
    }

    /// Prepend join history so the log becomes `history ++ current`.
    ///
    /// No deduplication against existing entries.
    pub fn prepend_history(&mut self, history: Vec<ChatMessage>) {
        if history.is_empty() {
            return;
        }
        self.items.splice(0..0, history);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn user(body: &str, ts: u64) -> ChatMessage {
        ChatMessage::user("Alice", body, ts)
    }

    #[test]
    fn appends_in_arrival_order_without_sorting() {
        let mut log = MessageLog::new();
        log.append(user("late", 300));
        log.append(user("early", 100));

        let bodies: Vec<_> = log.items().iter().map(ChatMessage::body).collect();
        assert_eq!(bodies, ["late", "early"]);
    }

    #[test]
    fn prepends_history_as_contiguous_prefix() {
        let mut log = MessageLog::new();
        log.append(user("live", 50));
        log.prepend_history(vec![
            ChatMessage::system("Alice created the room", 10),
            user("old", 20),
        ]);

        let bodies: Vec<_> = log.items().iter().map(ChatMessage::body).collect();
        assert_eq!(bodies, ["Alice created the room", "old", "live"]);
    }

    #[test]
    fn keeps_duplicates_from_history() {
        let mut log = MessageLog::new();
        log.append(user("same", 1));
        log.prepend_history(vec![user("same", 1)]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn empty_history_leaves_log_untouched() {
        let mut log = MessageLog::new();
        log.append(user("x", 1));
        let before = log.clone();
        log.prepend_history(Vec::new());
        assert_eq!(log, before);
    }

    fn arb_message() -> impl Strategy<Value = ChatMessage> {
        prop_oneof![
            ("[a-z]{0,8}", any::<u64>()).prop_map(|(body, ts)| ChatMessage::system(body, ts)),
            ("[A-Za-z]{1,6}", "[a-z ]{0,12}", any::<u64>())
                .prop_map(|(nick, body, ts)| ChatMessage::user(nick, body, ts)),
        ]
    }

    proptest! {
        #[test]
        fn append_sequence_preserves_arrival_order(
            prior in prop::collection::vec(arb_message(), 0..8),
            incoming in prop::collection::vec(arb_message(), 0..16),
        ) {
            let mut log = MessageLog::new();
            for message in &prior {
                log.append(message.clone());
            }
            for message in &incoming {
                log.append(message.clone());
            }

            let mut expected = prior.clone();
            expected.extend(incoming);
            prop_assert_eq!(log.items(), expected.as_slice());
        }

        #[test]
        fn history_merge_yields_history_then_current(
            current in prop::collection::vec(arb_message(), 0..8),
            history in prop::collection::vec(arb_message(), 0..8),
        ) {
            let mut log = MessageLog::new();
            for message in &current {
                log.append(message.clone());
            }
            log.prepend_history(history.clone());

            let mut expected = history;
            expected.extend(current);
            prop_assert_eq!(log.items(), expected.as_slice());
        }
    }
}
