// Report registry - one widget manager per open (client, fiscal year) scope
use crate::application::auto_height::{AutoHeightConfig, HeightCommit};
use crate::application::data_cache::{CacheStats, SharedCache};
use crate::application::persistence::SnapshotPersistence;
use crate::application::widget_cache::ScopedWidgetCache;
use crate::application::widget_manager::WidgetManager;
use crate::domain::report::ReportScope;
use crate::domain::widget::Widget;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio::task::JoinHandle;

pub type SharedManager = Arc<Mutex<WidgetManager>>;

struct ReportSession {
    manager: SharedManager,
    heights: JoinHandle<()>,
}

impl Drop for ReportSession {
    fn drop(&mut self) {
        self.heights.abort();
    }
}

/// Filled once the scope's snapshot has loaded. Concurrent opens of the same
/// scope wait on the slot, not on the registry.
type SessionSlot = Arc<OnceCell<ReportSession>>;

pub struct ReportRegistry {
    sessions: parking_lot::Mutex<HashMap<ReportScope, SessionSlot>>,
    widget_cache: SharedCache<Widget>,
    persistence: Arc<SnapshotPersistence>,
    auto_height: AutoHeightConfig,
}

impl ReportRegistry {
    pub fn new(
        widget_cache: SharedCache<Widget>,
        persistence: Arc<SnapshotPersistence>,
        auto_height: AutoHeightConfig,
    ) -> Self {
        Self {
            sessions: parking_lot::Mutex::new(HashMap::new()),
            widget_cache,
            persistence,
            auto_height,
        }
    }

    /// Return the manager for `scope`, creating and loading it on first use.
    pub async fn open(&self, scope: &ReportScope) -> SharedManager {
        let slot = self
            .sessions
            .lock()
            .entry(scope.clone())
            .or_default()
            .clone();

        let session = slot.get_or_init(|| self.load_session(scope)).await;
        session.manager.clone()
    }

    async fn load_session(&self, scope: &ReportScope) -> ReportSession {
        let cache = ScopedWidgetCache::new(scope, self.widget_cache.clone());
        let mut manager = WidgetManager::new(
            scope.clone(),
            Arc::new(cache),
            self.persistence.clone(),
            self.auto_height,
        );
        if !manager.load_from_storage().await {
            tracing::debug!("No stored widgets for {}, starting empty", scope);
        }

        let commits = manager.take_height_commits();
        let manager = Arc::new(Mutex::new(manager));
        let heights = spawn_height_applier(Arc::downgrade(&manager), commits);
        tracing::info!("Opened report {}", scope);
        ReportSession { manager, heights }
    }

    /// Tear down the scope's manager. Returns whether it was open.
    pub async fn close(&self, scope: &ReportScope) -> bool {
        let slot = {
            let mut sessions = self.sessions.lock();
            // A scope that is still loading is not open yet
            match sessions.get(scope) {
                Some(slot) if slot.initialized() => sessions.remove(scope),
                _ => None,
            }
        };
        let Some(session) = slot.as_ref().and_then(|slot| slot.get()) else {
            return false;
        };
        session.manager.lock().await.shutdown();
        self.persistence.forget(scope);
        tracing::info!("Closed report {}", scope);
        true
    }

    pub fn open_scopes(&self) -> Vec<ReportScope> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(scope, _)| scope.clone())
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.widget_cache.lock().stats()
    }
}

fn spawn_height_applier(
    manager: Weak<Mutex<WidgetManager>>,
    commits: Option<mpsc::UnboundedReceiver<HeightCommit>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut commits) = commits else {
            return;
        };
        while let Some(commit) = commits.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.lock().await.apply_height(commit);
        }
    })
}
