//! Request-scoped notification queue.

use crate::types::Notification;

/// Server-authored events destined for the next sync response only.
///
/// Order is first-queued, first-delivered. The queue is drained when a
/// response is built; it never reaches back into already-sent history.
#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    pending: Vec<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    /// Drop everything still queued, suppressing it from the next response.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Take the queued notifications in FIFO order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
