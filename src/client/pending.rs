use crate::protocol::catalog::Incoming;
use crate::protocol::{RequestId, RequestIdGenerator};
use crate::{lock_ignore_poison, log_debug, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// What a waiting caller eventually receives.
///
/// `Ok(None)` is the typed absence: a reply arrived for the id but its shape
/// could not be decoded.
type Reply = Result<Option<Incoming>>;

struct Slots {
    waiting: HashMap<RequestId, oneshot::Sender<Reply>>,
    closed: Option<String>,
}

/// Tracks requests waiting for replies
///
/// Each entry is a one-shot rendezvous: exactly one reply (or failure) is
/// delivered to exactly the caller that created it. Entries are removed by
/// whoever gets there first: the dispatcher resolving it, the caller giving
/// up, or connection shutdown.
#[derive(Clone)]
pub(crate) struct CorrelationTable {
    // ---
    ids: Arc<RequestIdGenerator>,
    slots: Arc<Mutex<Slots>>,
}

impl CorrelationTable {
    // ---

    /// Create a new empty table
    pub fn new() -> Self {
        // ---
        Self {
            ids: Arc::new(RequestIdGenerator::new()),
            slots: Arc::new(Mutex::new(Slots {
                waiting: HashMap::new(),
                closed: None,
            })),
        }
    }

    /// Register a new pending request under a fresh id
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once [`fail_all`](Self::fail_all)
    /// has run; nothing would ever resolve the request.
    pub fn begin(&self) -> Result<PendingReply> {
        // ---
        let (tx, rx) = oneshot::channel();

        let id = {
            let mut slots = lock_ignore_poison(&self.slots);
            if let Some(reason) = &slots.closed {
                return Err(Error::ConnectionClosed(reason.clone()));
            }
            let id = self.ids.next();
            slots.waiting.insert(id, tx);
            id
        };

        Ok(PendingReply {
            id,
            rx: Some(rx),
            table: self.clone(),
        })
    }

    /// Deliver a reply to the caller waiting on `id`
    ///
    /// Lookup and removal happen under one lock, so a caller giving up at
    /// the same moment either gets the reply or leaves it
    /// [`Unclaimed`](Delivery::Unclaimed) for the dispatcher to route
    /// elsewhere.
    pub fn resolve(&self, id: RequestId, reply: Option<Incoming>) -> Delivery {
        // ---
        let tx = lock_ignore_poison(&self.slots).waiting.remove(&id);

        match tx {
            Some(tx) => {
                // Receiver may already be gone if the caller was cancelled
                // between our removal and this send.
                let _ = tx.send(Ok(reply));
                Delivery::Delivered
            }
            None => {
                log_debug!("no pending request for id {id}");
                Delivery::Unclaimed(reply)
            }
        }
    }

    /// Remove a pending request without delivering anything
    pub fn abandon(&self, id: RequestId) -> bool {
        // ---
        lock_ignore_poison(&self.slots).waiting.remove(&id).is_some()
    }

    /// Close the table and fail every waiter with `ConnectionClosed`
    ///
    /// Returns the number of requests that were still pending.
    pub fn fail_all(&self, reason: &str) -> usize {
        // ---
        let drained: Vec<_> = {
            let mut slots = lock_ignore_poison(&self.slots);
            slots.closed.get_or_insert_with(|| reason.to_string());
            slots.waiting.drain().collect()
        };

        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(Error::ConnectionClosed(reason.to_string())));
        }
        count
    }

    /// Whether `id` is still waiting for a reply
    #[cfg(test)]
    pub fn contains(&self, id: RequestId) -> bool {
        // ---
        lock_ignore_poison(&self.slots).waiting.contains_key(&id)
    }

    /// Get the number of pending requests
    pub fn len(&self) -> usize {
        // ---
        lock_ignore_poison(&self.slots).waiting.len()
    }
}

/// Outcome of [`CorrelationTable::resolve`].
#[derive(Debug, PartialEq)]
pub(crate) enum Delivery {
    /// The waiting caller received the reply.
    Delivered,
    /// Nobody was waiting on the id; the reply is handed back.
    Unclaimed(Option<Incoming>),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Caller-side handle of one pending request
///
/// Dropping the handle, whether after a reply, a timeout, or because the
/// waiting future was cancelled, removes the table entry if it is still
/// there.
pub(crate) struct PendingReply {
    id: RequestId,
    rx: Option<oneshot::Receiver<Reply>>,
    table: CorrelationTable,
}

impl PendingReply {
    // ---

    /// The id to put on the outgoing frame
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Suspend until the reply arrives
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if `timeout` elapses first
    /// - [`Error::ConnectionClosed`] if the connection ended first
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<Option<Incoming>> {
        // ---
        let Some(rx) = self.rx.take() else {
            return Err(Error::ConnectionClosed("reply already consumed".into()));
        };

        let delivered = match timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(delivered) => delivered,
                Err(_) => {
                    log_debug!("request {} timed out after {duration:?}", self.id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        match delivered {
            Ok(reply) => reply,
            Err(_) => Err(Error::ConnectionClosed("reply channel dropped".into())),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.abandon(self.id);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::protocol::catalog::ChatMessage;

    fn reply(n: i64) -> Incoming {
        Incoming::ChatMessage(ChatMessage {
            message_id: n,
            channel_id: 1,
            author_id: 1,
            contents: format!("reply {n}"),
        })
    }

    #[tokio::test]
    async fn test_begin_and_resolve() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();
        let id = pending.id();
        assert_eq!(id.get(), 1);
        assert_eq!(table.len(), 1);

        assert!(table.resolve(id, Some(reply(1))).is_delivered());

        // Should be removed after completion
        assert_eq!(table.len(), 0);

        let received = pending.wait(None).await.unwrap();
        assert_eq!(received, Some(reply(1)));
    }

    #[tokio::test]
    async fn test_resolve_with_absence() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();
        assert!(table.resolve(pending.id(), None).is_delivered());
        assert_eq!(pending.wait(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_twice() {
        // ---
        let table = CorrelationTable::new();
        let first = table.begin().unwrap();
        let second = table.begin().unwrap();

        assert!(table.resolve(first.id(), Some(reply(1))).is_delivered());
        assert_eq!(
            table.resolve(first.id(), Some(reply(99))),
            Delivery::Unclaimed(Some(reply(99)))
        );

        // The duplicate did not leak into the other request.
        assert!(table.contains(second.id()));
        assert!(table.resolve(second.id(), Some(reply(2))).is_delivered());

        assert_eq!(first.wait(None).await.unwrap(), Some(reply(1)));
        assert_eq!(second.wait(None).await.unwrap(), Some(reply(2)));
    }

    #[test]
    fn test_resolve_unknown_id() {
        // ---
        let table = CorrelationTable::new();
        assert!(!table
            .resolve(RequestId::new(77).unwrap(), Some(reply(1)))
            .is_delivered());
    }

    #[tokio::test]
    async fn test_timeout_then_late_reply() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();
        let id = pending.id();

        let err = pending
            .wait(Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(table.len(), 0);

        assert_eq!(
            table.resolve(id, Some(reply(1))),
            Delivery::Unclaimed(Some(reply(1)))
        );
    }

    #[test]
    fn test_abandoned_request_hands_reply_back() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();
        let id = pending.id();
        drop(pending);

        assert_eq!(table.resolve(id, None), Delivery::Unclaimed(None));
        assert_eq!(
            table.resolve(id, Some(reply(3))),
            Delivery::Unclaimed(Some(reply(3)))
        );
    }

    #[test]
    fn test_drop_removes_entry() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();
        let id = pending.id();
        drop(pending);

        assert!(!table.contains(id));
        assert!(!table.abandon(id));
    }

    #[test]
    fn test_abandon() {
        // ---
        let table = CorrelationTable::new();
        let pending = table.begin().unwrap();

        assert!(table.abandon(pending.id()));
        assert_eq!(table.len(), 0);

        // Second remove should return false
        assert!(!table.abandon(pending.id()));
    }

    #[tokio::test]
    async fn test_fail_all() {
        // ---
        let table = CorrelationTable::new();
        let waiters: Vec<_> = (0..3).map(|_| table.begin().unwrap()).collect();

        assert_eq!(table.fail_all("socket closed"), 3);
        assert_eq!(table.len(), 0);

        for pending in waiters {
            let err = pending.wait(None).await.unwrap_err();
            assert!(matches!(err, Error::ConnectionClosed(reason) if reason == "socket closed"));
        }

        assert!(matches!(table.begin(), Err(Error::ConnectionClosed(_))));
    }

    #[test]
    fn test_ids_are_distinct() {
        // ---
        let table = CorrelationTable::new();
        let a = table.begin().unwrap();
        let b = table.begin().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(table.len(), 2);
    }
}
