use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::kafka_types::Message;

/// Bounded FIFO of the latest [`Message`]s consumed by a Worker.
///
/// Once full, the oldest message is dropped to make room for the newest.
pub struct MessageBuffer {
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub async fn extend<I: IntoIterator<Item = Message>>(&self, batch: I) {
        if self.capacity == 0 {
            return;
        }

        let mut guard = self.messages.lock().await;
        for m in batch {
            if guard.len() == self.capacity {
                guard.pop_front();
            }
            guard.push_back(m);
        }
    }

    /// Remove and return every buffered message, oldest first.
    pub async fn drain(&self) -> Vec<Message> {
        self.messages.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }
}
