// Snapshot persistence - local commit followed by best-effort remote replication
use crate::application::snapshot_store::{LocalSnapshotStore, RemoteSnapshotStore};
use crate::domain::report::{ReportScope, Snapshot};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncStatus {
    /// Nothing replicated yet in this session
    Idle,
    Pending,
    Synced { at: DateTime<Utc> },
    Failed { error: String, at: DateTime<Utc> },
    /// No remote store configured
    Disabled,
}

#[derive(Debug)]
enum ReplicationOp {
    Push(Snapshot),
    Delete,
}

#[derive(Debug)]
struct ReplicationJob {
    scope: ReportScope,
    seq: u64,
    op: ReplicationOp,
}

#[derive(Debug)]
struct ScopeSync {
    latest_seq: u64,
    status: SyncStatus,
}

type StatusBoard = Arc<Mutex<HashMap<ReportScope, ScopeSync>>>;

pub struct SnapshotPersistence {
    local: Arc<dyn LocalSnapshotStore>,
    remote: Option<Arc<dyn RemoteSnapshotStore>>,
    jobs: Option<mpsc::UnboundedSender<ReplicationJob>>,
    statuses: StatusBoard,
    next_seq: Mutex<u64>,
}

impl SnapshotPersistence {
    pub fn local_only(local: Arc<dyn LocalSnapshotStore>) -> Self {
        Self {
            local,
            remote: None,
            jobs: None,
            statuses: Arc::default(),
            next_seq: Mutex::new(0),
        }
    }

    /// Persistence with a remote replica. The returned [`Replicator`] must be
    /// spawned for replication to make progress.
    pub fn replicated(
        local: Arc<dyn LocalSnapshotStore>,
        remote: Arc<dyn RemoteSnapshotStore>,
    ) -> (Self, Replicator) {
        let (tx, rx) = mpsc::unbounded_channel();
        let statuses: StatusBoard = Arc::default();
        let replicator = Replicator {
            remote: remote.clone(),
            jobs: rx,
            statuses: statuses.clone(),
        };
        let persistence = Self {
            local,
            remote: Some(remote),
            jobs: Some(tx),
            statuses,
            next_seq: Mutex::new(0),
        };
        (persistence, replicator)
    }

    /// Load the scope's snapshot. The local store wins; the remote replica is
    /// only consulted when the scope was never stored locally, and seeds the
    /// local store when it has a snapshot. A cleared scope loads as its empty
    /// tombstone.
    pub async fn load(&self, scope: &ReportScope) -> Option<Snapshot> {
        match self.local.load(scope) {
            Ok(Some(snapshot)) => return Some(snapshot),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read local snapshot for {}: {:#}", scope, e),
        }

        let remote = self.remote.as_ref()?;
        match remote.fetch(scope).await {
            Ok(Some(snapshot)) => {
                tracing::info!("Seeding {} from remote snapshot saved at {}", scope, snapshot.saved_at);
                if let Err(e) = self.local.save(scope, &snapshot) {
                    tracing::warn!("Failed to seed local snapshot for {}: {:#}", scope, e);
                }
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to fetch remote snapshot for {}: {:#}", scope, e);
                None
            }
        }
    }

    /// Write locally, then queue replication. Failures are logged and never
    /// surfaced to the caller.
    pub fn commit(&self, scope: &ReportScope, snapshot: Snapshot) {
        if let Err(e) = self.local.save(scope, &snapshot) {
            tracing::warn!("Failed to save local snapshot for {}: {:#}", scope, e);
        }
        self.enqueue(scope, ReplicationOp::Push(snapshot));
    }

    pub fn clear(&self, scope: &ReportScope) {
        if let Err(e) = self.local.clear(scope) {
            tracing::warn!("Failed to clear local snapshot for {}: {:#}", scope, e);
        }
        self.enqueue(scope, ReplicationOp::Delete);
    }

    /// Stop tracking the scope's sync status. Queued jobs still replicate.
    pub fn forget(&self, scope: &ReportScope) {
        self.statuses.lock().remove(scope);
    }

    pub fn status(&self, scope: &ReportScope) -> SyncStatus {
        if self.remote.is_none() {
            return SyncStatus::Disabled;
        }
        self.statuses
            .lock()
            .get(scope)
            .map(|sync| sync.status.clone())
            .unwrap_or(SyncStatus::Idle)
    }

    fn enqueue(&self, scope: &ReportScope, op: ReplicationOp) {
        let Some(jobs) = &self.jobs else {
            return;
        };

        let seq = {
            let mut next = self.next_seq.lock();
            *next += 1;
            *next
        };
        self.statuses.lock().insert(
            scope.clone(),
            ScopeSync {
                latest_seq: seq,
                status: SyncStatus::Pending,
            },
        );

        let job = ReplicationJob {
            scope: scope.clone(),
            seq,
            op,
        };
        if jobs.send(job).is_err() {
            tracing::warn!("Replicator is not running; {} stays local only", scope);
            self.statuses.lock().insert(
                scope.clone(),
                ScopeSync {
                    latest_seq: seq,
                    status: SyncStatus::Failed {
                        error: "replicator stopped".into(),
                        at: Utc::now(),
                    },
                },
            );
        }
    }
}

/// Drains replication jobs in order. Jobs superseded by a newer job for the
/// same scope are skipped.
pub struct Replicator {
    remote: Arc<dyn RemoteSnapshotStore>,
    jobs: mpsc::UnboundedReceiver<ReplicationJob>,
    statuses: StatusBoard,
}

impl Replicator {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            if self.is_superseded(&job) {
                tracing::trace!("Skipping superseded replication of {} (seq {})", job.scope, job.seq);
                continue;
            }

            let result = match &job.op {
                ReplicationOp::Push(snapshot) => self.remote.push(&job.scope, snapshot).await,
                ReplicationOp::Delete => self.remote.delete(&job.scope).await,
            };

            let status = match result {
                Ok(()) => {
                    tracing::debug!("Replicated {} (seq {})", job.scope, job.seq);
                    SyncStatus::Synced { at: Utc::now() }
                }
                Err(e) => {
                    tracing::warn!("Remote replication of {} failed: {:#}", job.scope, e);
                    SyncStatus::Failed {
                        error: format!("{:#}", e),
                        at: Utc::now(),
                    }
                }
            };

            let mut statuses = self.statuses.lock();
            if let Some(sync) = statuses.get_mut(&job.scope) {
                if sync.latest_seq == job.seq {
                    sync.status = status;
                }
            }
        }
        tracing::debug!("Replicator stopped");
    }

    fn is_superseded(&self, job: &ReplicationJob) -> bool {
        self.statuses
            .lock()
            .get(&job.scope)
            .is_some_and(|sync| sync.latest_seq > job.seq)
    }
}
