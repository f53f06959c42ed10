//! Single-consumer package queue with in-band connection sentinels.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use imulink_pkg::Package;

/// One entry in the session queue. Connection edges travel in-band so a
/// consumer sees them in order relative to the packages around them.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    /// The transport came up.
    Connect,
    /// The transport went down. End of stream only if nothing follows.
    Disconnect,
    Package(Package),
}

/// Unbounded queue filled by the transport task and drained by one
/// consumer, synchronously or asynchronously.
#[derive(Debug, Default)]
pub struct PackageQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
}

impl PackageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: QueueEntry) {
        self.entries.lock().unwrap().push_back(entry);
        self.notify.notify_one();
    }

    /// Re-queue entries at the front, preserving their order. Used when
    /// an init drain keeps packages it is not allowed to discard.
    pub fn push_front_all(&self, entries: Vec<QueueEntry>) {
        let mut queue = self.entries.lock().unwrap();
        for entry in entries.into_iter().rev() {
            queue.push_front(entry);
        }
        drop(queue);
        self.notify.notify_one();
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> Option<QueueEntry> {
        self.entries.lock().unwrap().pop_front()
    }

    /// Wait for the next entry.
    pub async fn pop(&self) -> QueueEntry {
        loop {
            // Register before checking so a push between the check and
            // the await cannot be missed.
            let notified = self.notify.notified();
            if let Some(entry) = self.try_pop() {
                return entry;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_with_sentinels() {
        let queue = PackageQueue::new();
        queue.push(QueueEntry::Connect);
        queue.push(QueueEntry::Package(Package::CmdGetDeviceInfo));
        queue.push(QueueEntry::Disconnect);

        assert_eq!(queue.try_pop(), Some(QueueEntry::Connect));
        assert_eq!(
            queue.try_pop(),
            Some(QueueEntry::Package(Package::CmdGetDeviceInfo))
        );
        assert_eq!(queue.try_pop(), Some(QueueEntry::Disconnect));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn push_front_restores_order() {
        let queue = PackageQueue::new();
        queue.push(QueueEntry::Disconnect);
        queue.push_front_all(vec![
            QueueEntry::Package(Package::CmdStartRecording),
            QueueEntry::Package(Package::CmdStopRecording),
        ]);
        assert_eq!(
            queue.try_pop(),
            Some(QueueEntry::Package(Package::CmdStartRecording))
        );
        assert_eq!(
            queue.try_pop(),
            Some(QueueEntry::Package(Package::CmdStopRecording))
        );
        assert_eq!(queue.try_pop(), Some(QueueEntry::Disconnect));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(PackageQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.push(QueueEntry::Connect);
        assert_eq!(waiter.await.unwrap(), QueueEntry::Connect);
    }
}
