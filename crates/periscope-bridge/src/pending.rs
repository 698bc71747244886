//! The table of requests waiting on a webview response.
//!
//! Every entry settles exactly once. Resolution, expiry and draining all
//! begin by removing the entry under the lock, so whichever path removes it
//! first owns the outcome and the others see nothing to do.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use periscope_common::HandlerReply;
use tokio::sync::oneshot;
use tracing::debug;

/// How a pending request ended, as seen by its waiter.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Reply(HandlerReply),
    Cancelled,
}

struct Waiter {
    label: String,
    event: String,
    /// Registration order, for the oldest-first fallback.
    seq: u64,
    tx: oneshot::Sender<Settlement>,
}

#[derive(Default)]
struct Table {
    waiters: HashMap<String, Waiter>,
    next_seq: u64,
}

#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<Table>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table survives a panic elsewhere: every mutation leaves it
    /// consistent, so a poisoned lock is taken over rather than refused.
    fn table(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `event` on `label` under `correlation_id`.
    pub fn register(
        &self,
        correlation_id: &str,
        label: &str,
        event: &str,
    ) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.waiters.insert(
            correlation_id.to_string(),
            Waiter {
                label: label.to_string(),
                event: event.to_string(),
                seq,
                tx,
            },
        );
        rx
    }

    /// Settle the waiter a response for `event` belongs to.
    ///
    /// A reply carrying a correlation id only ever settles that id. A reply
    /// without one goes to the oldest waiter for the same event and window.
    /// Returns false when nothing was waiting.
    pub fn resolve(&self, event: &str, reply: HandlerReply) -> bool {
        let waiter = {
            let mut table = self.table();
            let key = match reply.correlation_id.as_deref() {
                Some(id) => Some(id.to_string()),
                None => table
                    .waiters
                    .iter()
                    .filter(|(_, w)| w.event == event)
                    .filter(|(_, w)| {
                        reply
                            .window_label
                            .as_deref()
                            .map_or(true, |label| w.label == label)
                    })
                    .min_by_key(|(_, w)| w.seq)
                    .map(|(id, _)| id.clone()),
            };
            let key = key.filter(|k| table.waiters.get(k).is_some_and(|w| w.event == event));
            key.and_then(|k| table.waiters.remove(&k))
        };
        match waiter {
            Some(w) => w.tx.send(Settlement::Reply(reply)).is_ok(),
            None => false,
        }
    }

    /// Give up on `correlation_id`. Returns true if it was still pending,
    /// false if a response settled it first.
    pub fn expire(&self, correlation_id: &str) -> bool {
        self.table().waiters.remove(correlation_id).is_some()
    }

    /// Cancel every waiter. Returns how many were pending.
    pub fn drain(&self) -> usize {
        let drained: Vec<Waiter> = self.table().waiters.drain().map(|(_, w)| w).collect();
        let count = drained.len();
        for w in drained {
            debug!(label = %w.label, event = %w.event, "cancelling pending request");
            let _ = w.tx.send(Settlement::Cancelled);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.table().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn reply(id: Option<&str>, label: &str, data: i64) -> HandlerReply {
        HandlerReply::ok(json!(data)).correlated(id.map(str::to_string), label)
    }

    #[tokio::test]
    async fn resolves_by_correlation_id() {
        let table = PendingTable::new();
        let a = table.register("a", "main", "get-dom");
        let b = table.register("b", "main", "get-dom");

        assert!(table.resolve("get-dom", reply(Some("b"), "main", 2)));
        assert!(table.resolve("get-dom", reply(Some("a"), "main", 1)));

        assert_eq!(a.await.unwrap(), Settlement::Reply(reply(Some("a"), "main", 1)));
        assert_eq!(b.await.unwrap(), Settlement::Reply(reply(Some("b"), "main", 2)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn uncorrelated_reply_goes_to_oldest_matching_waiter() {
        let table = PendingTable::new();
        let side = table.register("s", "side", "execute-js");
        let first = table.register("1", "main", "execute-js");
        let _second = table.register("2", "main", "execute-js");

        assert!(table.resolve("execute-js", reply(None, "main", 7)));
        assert!(matches!(first.await.unwrap(), Settlement::Reply(_)));
        assert_eq!(table.len(), 2);
        drop(side);
    }

    #[test]
    fn reply_settles_once() {
        let table = PendingTable::new();
        let _rx = table.register("a", "main", "get-dom");
        assert!(table.resolve("get-dom", reply(Some("a"), "main", 1)));
        assert!(!table.resolve("get-dom", reply(Some("a"), "main", 1)));
        assert!(!table.expire("a"));
    }

    #[test]
    fn expiry_beats_late_reply() {
        let table = PendingTable::new();
        let _rx = table.register("a", "main", "get-dom");
        assert!(table.expire("a"));
        assert!(!table.resolve("get-dom", reply(Some("a"), "main", 1)));
    }

    #[test]
    fn reply_for_another_event_is_ignored() {
        let table = PendingTable::new();
        let _rx = table.register("a", "main", "get-dom");
        assert!(!table.resolve("execute-js", reply(Some("a"), "main", 1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn racing_expiry_and_reply_settle_once() {
        let table = Arc::new(PendingTable::new());
        for i in 0..500 {
            let id = format!("r{i}");
            let mut rx = table.register(&id, "main", "get-dom");
            let resolver = {
                let table = table.clone();
                let id = id.clone();
                std::thread::spawn(move || table.resolve("get-dom", reply(Some(&id), "main", 1)))
            };
            let expired = table.expire(&id);
            let resolved = resolver.join().unwrap();
            assert_ne!(expired, resolved, "iteration {i} settled twice or never");
            if resolved {
                assert!(matches!(rx.try_recv(), Ok(Settlement::Reply(_))));
            } else {
                assert!(rx.try_recv().is_err());
            }
        }
        assert!(table.is_empty());
    }

    #[test]
    fn poisoned_lock_keeps_serving() {
        let table = Arc::new(PendingTable::new());
        let poisoner = table.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("handler thread died holding the table");
        })
        .join();
        assert!(table.inner.is_poisoned());

        let _rx = table.register("a", "main", "get-dom");
        assert_eq!(table.len(), 1);
        assert!(table.resolve("get-dom", reply(Some("a"), "main", 1)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn drain_cancels_everything() {
        let table = PendingTable::new();
        let a = table.register("a", "main", "get-dom");
        let b = table.register("b", "side", "capture-screenshot");
        assert_eq!(table.drain(), 2);
        assert_eq!(a.await.unwrap(), Settlement::Cancelled);
        assert_eq!(b.await.unwrap(), Settlement::Cancelled);
        assert!(table.is_empty());
    }
}
