use crate::protocol::catalog::Incoming;
use crate::{lock_ignore_poison, log_warn, Error};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Outcome of one listener invocation.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Callback = Arc<dyn Fn(&Incoming) -> ListenerResult + Send + Sync>;

/// Handle returned by [`Client::on`](crate::Client::on), used to remove the
/// listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Push observers keyed by incoming type name
///
/// Callbacks for one type run in the order they were added. The list is
/// copied out before invoking anything, so a callback may itself add or
/// remove listeners.
pub(crate) struct ListenerRegistry {
    // ---
    next_id: AtomicU64,
    by_type: Mutex<HashMap<String, Vec<(ListenerId, Callback)>>>,
}

impl ListenerRegistry {
    // ---
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            by_type: Mutex::new(HashMap::new()),
        }
    }

    /// Append `callback` to the listeners of `type_name`
    pub fn subscribe<F>(&self, type_name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Incoming) -> ListenerResult + Send + Sync + 'static,
    {
        // ---
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock_ignore_poison(&self.by_type)
            .entry(type_name.into())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener, keeping the order of the rest
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        // ---
        let mut by_type = lock_ignore_poison(&self.by_type);

        for listeners in by_type.values_mut() {
            if let Some(pos) = listeners.iter().position(|(candidate, _)| *candidate == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of listeners registered for `type_name`
    pub fn count(&self, type_name: &str) -> usize {
        // ---
        lock_ignore_poison(&self.by_type)
            .get(type_name)
            .map_or(0, Vec::len)
    }

    /// Deliver `message` to every listener of `type_name`
    ///
    /// A listener that returns an error or panics does not stop the others.
    /// Each such failure is logged and reported in the returned list.
    pub fn fanout(&self, type_name: &str, message: &Incoming) -> Vec<Error> {
        // ---
        let callbacks: Vec<(ListenerId, Callback)> = lock_ignore_poison(&self.by_type)
            .get(type_name)
            .cloned()
            .unwrap_or_default();

        let mut failures = Vec::new();

        for (id, callback) in callbacks {
            let reason = match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            log_warn!("{id} for {type_name} failed: {reason}");
            failures.push(Error::ListenerFailure {
                type_name: type_name.to_string(),
                reason,
            });
        }

        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    // ---
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::protocol::catalog::ChatMessage;

    fn message() -> Incoming {
        Incoming::ChatMessage(ChatMessage {
            message_id: 7,
            channel_id: 2,
            author_id: 3,
            contents: "hi".into(),
        })
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> impl Fn(&Incoming) -> ListenerResult + Send + Sync + 'static {
        let log = log.clone();
        move |_| {
            log.lock().unwrap().push(tag);
            Ok(())
        }
    }

    #[test]
    fn test_fanout_in_registration_order() {
        // ---
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe("message", recorder(&log, "first"));
        registry.subscribe("message", recorder(&log, "second"));
        registry.subscribe("authUser", recorder(&log, "other"));

        let failures = registry.fanout("message", &message());
        assert!(failures.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_fanout_without_listeners() {
        // ---
        let registry = ListenerRegistry::new();
        assert!(registry.fanout("message", &message()).is_empty());
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        // ---
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe("message", |_| Err("bad payload".into()));
        registry.subscribe("message", |_| panic!("listener blew up"));
        registry.subscribe("message", recorder(&log, "survivor"));

        let failures = registry.fanout("message", &message());

        assert_eq!(failures.len(), 2);
        assert!(matches!(
            &failures[0],
            Error::ListenerFailure { reason, .. } if reason == "bad payload"
        ));
        assert!(matches!(
            &failures[1],
            Error::ListenerFailure { reason, .. } if reason.contains("listener blew up")
        ));
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn test_unsubscribe_keeps_order() {
        // ---
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe("message", recorder(&log, "a"));
        let b = registry.subscribe("message", recorder(&log, "b"));
        registry.subscribe("message", recorder(&log, "c"));

        assert!(registry.unsubscribe(b));
        assert!(!registry.unsubscribe(b));
        assert_eq!(registry.count("message"), 2);

        registry.fanout("message", &message());
        assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_listener_may_subscribe() {
        // ---
        let registry = Arc::new(ListenerRegistry::new());

        let inner = registry.clone();
        registry.subscribe("message", move |_| {
            inner.subscribe("message", |_| Ok(()));
            Ok(())
        });

        registry.fanout("message", &message());
        assert_eq!(registry.count("message"), 2);
    }
}
