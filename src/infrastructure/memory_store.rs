// In-memory snapshot store, used when no storage directory is configured
use crate::application::snapshot_store::LocalSnapshotStore;
use crate::domain::report::{ReportScope, Snapshot};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl LocalSnapshotStore for MemorySnapshotStore {
    fn load(&self, scope: &ReportScope) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.snapshots.read().get(&scope.storage_key()).cloned())
    }

    fn save(&self, scope: &ReportScope, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.snapshots
            .write()
            .insert(scope.storage_key(), snapshot.clone());
        Ok(())
    }
}
