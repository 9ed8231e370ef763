use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::state::Message;

/// Append-only, ordered conversation log.
///
/// Appends from the query and upload tasks serialize on the inner mutex.
/// Observers subscribe to the log length and re-render when it changes.
pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    len_tx: watch::Sender<usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            messages: Mutex::new(Vec::new()),
            len_tx,
        }
    }

    pub fn append(&self, message: Message) {
        let len = {
            let mut messages = self.lock();
            messages.push(message);
            messages.len()
        };
        self.len_tx.send_replace(len);
    }

    /// Snapshot of every message in insertion order.
    pub fn all(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Receiver that observes the log length.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.len_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // A panic mid-push cannot leave the Vec half-written, so a poisoned
        // lock still guards a consistent log.
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_preserves_order() {
        let store = ConversationStore::new();
        store.append(Message::user("first"));
        store.append(Message::error("second"));
        store.append(Message::user("first"));

        let all = store.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text(), "first");
        assert_eq!(all[1].text(), "second");
        // No deduplication
        assert_eq!(all[2].text(), "first");
    }

    #[test]
    fn test_empty_store() {
        let store = ConversationStore::default();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_length_changes() {
        let store = ConversationStore::new();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);

        store.append(Message::user("hello"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        store.append(Message::system_notice("ok"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(ConversationStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    store.append(Message::user(format!("{}-{}", i, j)));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store.all();
        assert_eq!(all.len(), 200);
        // Each writer's own messages stay in the order it appended them
        for i in 0..8 {
            let prefix = format!("{}-", i);
            let seq: Vec<usize> = all
                .iter()
                .filter_map(|m| m.text().strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..25).collect::<Vec<_>>());
        }
    }
}
