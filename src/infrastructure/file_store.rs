// File-backed snapshot store - one JSON document per report scope
use crate::application::snapshot_store::LocalSnapshotStore;
use crate::domain::report::{ReportScope, Snapshot};
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create snapshot directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, scope: &ReportScope) -> PathBuf {
        // Scope validation keeps path separators out of the client id
        self.root
            .join(format!("{}-{}.json", scope.client_id, scope.fiscal_year))
    }
}

impl LocalSnapshotStore for FileSnapshotStore {
    fn load(&self, scope: &ReportScope) -> Result<Option<Snapshot>> {
        let path = self.path_for(scope);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt snapshot at {}", path.display()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, scope: &ReportScope, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(scope);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot).context("Failed to serialize snapshot")?;

        // Write then rename so a crash never leaves a half-written snapshot
        fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::widget::{GridRect, Widget, WidgetLayout, WidgetType};

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("snapshots")).unwrap();
        let scope = ReportScope::new("acme", 2024).unwrap();
        assert!(store.load(&scope).unwrap().is_none());

        let widget = Widget::new("w1", WidgetType::Kpi, "Revenue");
        let layout = WidgetLayout::for_widget(&widget, GridRect::new(0, 0, 2, 2));
        let snapshot = Snapshot::new(vec![widget], vec![layout]);
        store.save(&scope, &snapshot).unwrap();

        assert_eq!(store.load(&scope).unwrap(), Some(snapshot));
        assert!(store.root().join("acme-2024.json").exists());

        store.clear(&scope).unwrap();
        let tombstone = store.load(&scope).unwrap().unwrap();
        assert!(tombstone.is_empty());
        // Clearing twice is fine
        store.clear(&scope).unwrap();
        assert!(store.load(&scope).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let scope = ReportScope::new("acme", 2024).unwrap();
        fs::write(dir.path().join("acme-2024.json"), b"{ not json").unwrap();

        assert!(store.load(&scope).is_err());
    }
}
