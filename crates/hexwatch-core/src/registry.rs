//! Subscriber registry: push notification of new snapshots.
//!
//! The subscriber list is copy-on-write. `notify` walks the list as it was
//! when the notification began, so callbacks may register or deregister
//! (themselves or others) mid-notification without anyone registered
//! beforehand being skipped or called twice. A subscriber that returns an
//! error or panics is logged and counted; the rest still run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::SubscriberError;
use crate::snapshot::WorldSnapshot;

/// Handle returned by [`SubscriberRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Something that wants every new snapshot.
///
/// Called synchronously on the ingestion task: do cheap work or hand the
/// snapshot off to a channel.
pub trait Subscriber: Send + Sync + 'static {
    /// Handle one newly published snapshot.
    fn on_snapshot(&self, snapshot: &Arc<WorldSnapshot>) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: Fn(&Arc<WorldSnapshot>) -> Result<(), SubscriberError> + Send + Sync + 'static,
{
    fn on_snapshot(&self, snapshot: &Arc<WorldSnapshot>) -> Result<(), SubscriberError> {
        self(snapshot)
    }
}

#[derive(Clone)]
struct Entry {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
}

/// Outcome of one [`SubscriberRegistry::notify`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifyReport {
    /// Subscribers that handled the snapshot.
    pub delivered: u64,
    /// Subscribers that returned an error or panicked.
    pub failed: u64,
}

/// The set of registered subscribers.
pub struct SubscriberRegistry {
    entries: ArcSwap<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

impl SubscriberRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a subscriber. It sees snapshots published after this call
    /// returns, never earlier ones.
    pub fn register(&self, subscriber: impl Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry {
            id,
            subscriber: Arc::new(subscriber),
        };
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len().saturating_add(1));
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        id
    }

    /// Remove a subscriber. Returns `false` (and does nothing) if `id` is
    /// not registered.
    pub fn deregister(&self, id: SubscriptionId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|entry| entry.id == id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Hand `snapshot` to every subscriber registered when the call began.
    pub fn notify(&self, snapshot: &Arc<WorldSnapshot>) -> NotifyReport {
        let entries = self.entries.load_full();
        let mut report = NotifyReport::default();

        for entry in entries.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| entry.subscriber.on_snapshot(snapshot)));
            match outcome {
                Ok(Ok(())) => report.delivered = report.delivered.saturating_add(1),
                Ok(Err(e)) => {
                    warn!(
                        subscription = %entry.id,
                        world_time = snapshot.world_time,
                        error = %e,
                        "Subscriber failed to handle snapshot"
                    );
                    report.failed = report.failed.saturating_add(1);
                }
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| String::from("non-string panic payload"));
                    error!(
                        subscription = %entry.id,
                        world_time = snapshot.world_time,
                        panic = %message,
                        "Subscriber panicked"
                    );
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::aggregator;
    use crate::snapshot::RoomLayout;

    fn snapshot() -> Arc<WorldSnapshot> {
        Arc::new(aggregator::initial(Vec::new(), RoomLayout::new()))
    }

    fn counter(hits: &Arc<AtomicUsize>) -> impl Subscriber {
        let hits = Arc::clone(hits);
        move |_: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn noop(_: &Arc<WorldSnapshot>) -> Result<(), SubscriberError> {
        Ok(())
    }

    #[test]
    fn every_registered_subscriber_is_called_once() {
        let registry = SubscriberRegistry::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        registry.register(counter(&a));
        registry.register(counter(&b));

        let report = registry.notify(&snapshot());

        assert_eq!(report.delivered, 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deregister_unknown_id_is_a_no_op() {
        let registry = SubscriberRegistry::new();
        let id = registry.register(noop);
        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_and_panicking_subscribers_are_isolated() {
        let registry = SubscriberRegistry::new();
        let survivor = Arc::new(AtomicUsize::new(0));
        registry.register(|_: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
            Err(SubscriberError::new("socket closed"))
        });
        registry.register(|_: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
            panic!("subscriber bug")
        });
        registry.register(counter(&survivor));

        let report = registry.notify(&snapshot());

        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(survivor.load(Ordering::SeqCst), 1);

        registry.notify(&snapshot());
        assert_eq!(survivor.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registration_changes_during_notify_skip_no_one() {
        let registry = Arc::new(SubscriberRegistry::new());
        let first = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));
        let self_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        registry.register(counter(&first));
        {
            let registry_ref = Arc::downgrade(&registry);
            let late = Arc::clone(&late);
            let slot = Arc::clone(&self_id);
            let id = registry.register(move |_: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
                if let Some(registry) = registry_ref.upgrade() {
                    if let Some(id) = *slot.lock().unwrap() {
                        registry.deregister(id);
                    }
                    registry.register(counter(&late));
                }
                Ok(())
            });
            *self_id.lock().unwrap() = Some(id);
        }
        registry.register(counter(&last));

        let report = registry.notify(&snapshot());

        assert_eq!(report.delivered, 3);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 1);
        assert_eq!(late.load(Ordering::SeqCst), 0);

        registry.notify(&snapshot());
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(last.load(Ordering::SeqCst), 2);
        assert_eq!(late.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn concurrent_churn_during_notify_does_not_crash() {
        let registry = Arc::new(SubscriberRegistry::new());
        let stable = Arc::new(AtomicUsize::new(0));
        registry.register(counter(&stable));

        let churn = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let id = registry.register(noop);
                    registry.deregister(id);
                }
            })
        };
        for _ in 0..200 {
            registry.notify(&snapshot());
        }
        churn.join().unwrap();

        assert_eq!(stable.load(Ordering::SeqCst), 200);
        assert_eq!(registry.len(), 1);
    }
}
