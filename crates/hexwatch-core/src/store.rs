//! The published-snapshot slot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::snapshot::WorldSnapshot;

/// Atomically replaceable reference to the current [`WorldSnapshot`].
///
/// Readers take an owned [`Arc`] in one load and keep a consistent view
/// even if a newer version is stored right after. Only the supervisor
/// stores.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<WorldSnapshot>,
}

impl SnapshotStore {
    /// An empty slot; nothing has been bootstrapped yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if any session has bootstrapped.
    pub fn load(&self) -> Option<Arc<WorldSnapshot>> {
        self.current.load_full()
    }

    pub(crate) fn publish(&self, snapshot: Arc<WorldSnapshot>) {
        self.current.store(Some(snapshot));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregator;
    use crate::client::RawUpdate;
    use crate::snapshot::RoomLayout;

    #[test]
    fn empty_until_first_publish() {
        let store = SnapshotStore::new();
        assert!(store.load().is_none());

        store.publish(Arc::new(aggregator::initial(Vec::new(), RoomLayout::new())));
        assert_eq!(store.load().unwrap().world_time, -1);
    }

    #[test]
    fn held_reference_survives_newer_publish() {
        let store = SnapshotStore::new();
        let first = Arc::new(aggregator::initial(Vec::new(), RoomLayout::new()));
        store.publish(Arc::clone(&first));
        let held = store.load().unwrap();

        let update = RawUpdate {
            world_time: 1,
            ..RawUpdate::default()
        };
        store.publish(Arc::new(aggregator::apply(&first, update).unwrap()));

        assert_eq!(held.world_time, -1);
        assert_eq!(store.load().unwrap().world_time, 1);
    }
}
