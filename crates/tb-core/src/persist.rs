//! Background snapshot writer.
//!
//! Mutations hand the serialized snapshot to [`SaveQueue::enqueue`] and return
//! immediately. A worker thread writes them to the store, keeping only the
//! latest value per key when several are waiting. [`SaveQueue::flush`] blocks
//! until everything enqueued before it has been written.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::storage::{SharedStore, lock};

enum Command {
    Save { key: String, value: String },
    Flush(Sender<()>),
}

/// Fire-and-forget snapshot persistence.
pub struct SaveQueue {
    tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl SaveQueue {
    /// Starts the worker thread for `store`.
    pub fn spawn(store: SharedStore) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || run_worker(&store, &rx));
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queues `value` to be written under `key`.
    pub fn enqueue(&self, key: &str, value: String) {
        let command = Command::Save {
            key: key.to_string(),
            value,
        };
        if self.send(command).is_err() {
            tracing::warn!(key, "save worker is gone, snapshot dropped");
        }
    }

    /// Waits until every previously queued write has been attempted.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    fn send(&self, command: Command) -> Result<(), ()> {
        match &self.tx {
            Some(tx) => tx.send(command).map_err(|_| ()),
            None => Err(()),
        }
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(store: &SharedStore, rx: &Receiver<Command>) {
    let mut pending: Vec<(String, String)> = Vec::new();
    while let Ok(first) = rx.recv() {
        for command in std::iter::once(first).chain(rx.try_iter()) {
            match command {
                Command::Save { key, value } => {
                    if let Some(slot) = pending.iter_mut().find(|(k, _)| *k == key) {
                        tracing::trace!(key, "coalescing snapshot");
                        slot.1 = value;
                    } else {
                        pending.push((key, value));
                    }
                }
                Command::Flush(ack) => {
                    write_all(store, &mut pending);
                    let _ = ack.send(());
                }
            }
        }
        write_all(store, &mut pending);
    }
}

fn write_all(store: &SharedStore, pending: &mut Vec<(String, String)>) {
    for (key, value) in pending.drain(..) {
        let result = lock(store).and_then(|mut guard| guard.set(&key, &value));
        match result {
            Ok(()) => tracing::debug!(key, bytes = value.len(), "snapshot written"),
            // Not surfaced: the next mutation writes a fresh snapshot.
            Err(error) => tracing::warn!(key, %error, "failed to persist snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, StorageError, shared};

    #[test]
    fn flush_makes_writes_visible() {
        let store = shared(MemoryStore::new());
        let queue = SaveQueue::spawn(store.clone());
        queue.enqueue("a", "1".to_string());
        queue.enqueue("a", "2".to_string());
        queue.enqueue("b", "3".to_string());
        queue.flush();

        let guard = lock(&store).unwrap();
        assert_eq!(guard.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(guard.get("b").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn drop_drains_pending_writes() {
        let store = shared(MemoryStore::new());
        {
            let queue = SaveQueue::spawn(store.clone());
            queue.enqueue("a", "last".to_string());
        }
        assert_eq!(lock(&store).unwrap().get("a").unwrap().as_deref(), Some("last"));
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk full".into()))
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_swallowed() {
        let queue = SaveQueue::spawn(shared(FailingStore));
        queue.enqueue("a", "1".to_string());
        queue.flush();
        queue.enqueue("a", "2".to_string());
        queue.flush();
    }
}
