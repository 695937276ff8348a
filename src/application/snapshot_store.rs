// Store traits for persisted report snapshots
use crate::domain::report::{ReportScope, Snapshot};
use async_trait::async_trait;

/// Session-authoritative store. Calls are synchronous and cheap enough to run
/// inline with every mutation.
pub trait LocalSnapshotStore: Send + Sync {
    fn load(&self, scope: &ReportScope) -> anyhow::Result<Option<Snapshot>>;

    fn save(&self, scope: &ReportScope, snapshot: &Snapshot) -> anyhow::Result<()>;

    /// Replace the scope's snapshot with a tombstone. A cleared scope still
    /// loads locally, which keeps `load` from falling back to the remote.
    fn clear(&self, scope: &ReportScope) -> anyhow::Result<()> {
        self.save(scope, &Snapshot::cleared())
    }
}

/// Eventually consistent replica shared across devices. Last write wins.
#[async_trait]
pub trait RemoteSnapshotStore: Send + Sync {
    async fn fetch(&self, scope: &ReportScope) -> anyhow::Result<Option<Snapshot>>;

    async fn push(&self, scope: &ReportScope, snapshot: &Snapshot) -> anyhow::Result<()>;

    async fn delete(&self, scope: &ReportScope) -> anyhow::Result<()>;
}
