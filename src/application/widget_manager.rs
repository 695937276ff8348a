// Widget manager - owns the widgets, layouts and cross-filter of one report scope
use crate::application::auto_height::{
    AutoHeightConfig, AutoHeightController, AutoHeightHandle, HeightCommit,
};
use crate::application::persistence::{SnapshotPersistence, SyncStatus};
use crate::application::widget_cache::WidgetCache;
use crate::domain::cross_filter::CrossFilter;
use crate::domain::report::{ReportScope, Snapshot};
use crate::domain::widget::{
    GridPosition, GridRect, Widget, WidgetError, WidgetLayout, WidgetUpdate,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Size given to a loaded widget whose layout entry went missing.
const FALLBACK_WIDTH: i32 = 4;
const FALLBACK_HEIGHT: i32 = 4;

/// The only read/write surface for a report's widget grid.
///
/// Every widget has exactly one layout entry with `i == widget_id == id`.
/// Mutations commit a snapshot through [`SnapshotPersistence`] once applied;
/// persistence failures never roll back the in-memory state.
pub struct WidgetManager {
    scope: ReportScope,
    widgets: Vec<Widget>,
    layouts: Vec<WidgetLayout>,
    cache: Arc<dyn WidgetCache>,
    persistence: Arc<SnapshotPersistence>,
    cross_filter: watch::Sender<Option<CrossFilter>>,
    auto_height: AutoHeightConfig,
    auto_heights: HashMap<String, AutoHeightHandle>,
    height_tx: mpsc::UnboundedSender<HeightCommit>,
    height_rx: Option<mpsc::UnboundedReceiver<HeightCommit>>,
}

impl WidgetManager {
    pub fn new(
        scope: ReportScope,
        cache: Arc<dyn WidgetCache>,
        persistence: Arc<SnapshotPersistence>,
        auto_height: AutoHeightConfig,
    ) -> Self {
        let (cross_filter, _) = watch::channel(None);
        let (height_tx, height_rx) = mpsc::unbounded_channel();
        Self {
            scope,
            widgets: Vec::new(),
            layouts: Vec::new(),
            cache,
            persistence,
            cross_filter,
            auto_height,
            auto_heights: HashMap::new(),
            height_tx,
            height_rx: Some(height_rx),
        }
    }

    pub fn scope(&self) -> &ReportScope {
        &self.scope
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn layouts(&self) -> &[WidgetLayout] {
        &self.layouts
    }

    pub fn widget(&self, widget_id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == widget_id)
    }

    pub fn layout(&self, widget_id: &str) -> Option<&WidgetLayout> {
        self.layouts.iter().find(|l| l.i == widget_id)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.persistence.status(&self.scope)
    }

    pub fn add_widget(&mut self, widget: Widget, rect: GridRect) -> Result<(), WidgetError> {
        widget.validate()?;
        rect.validate()?;
        if self.widget(&widget.id).is_some() {
            return Err(WidgetError::Duplicate(widget.id));
        }

        tracing::debug!("Adding {:?} widget {} to {}", widget.kind, widget.id, self.scope);
        self.layouts.push(WidgetLayout::for_widget(&widget, rect));
        self.cache.set_widget(&widget);
        self.widgets.push(widget);
        self.persist();
        Ok(())
    }

    /// Remove a widget and its layout entry. Returns whether anything was
    /// removed; removing an unknown id is a no-op.
    pub fn remove_widget(&mut self, widget_id: &str) -> bool {
        let Some(index) = self.widgets.iter().position(|w| w.id == widget_id) else {
            return false;
        };

        self.widgets.remove(index);
        self.layouts.retain(|l| l.i != widget_id);
        self.cache.invalidate_widget(widget_id);
        self.auto_heights.remove(widget_id);

        let from_removed = self
            .cross_filter
            .borrow()
            .as_ref()
            .is_some_and(|f| f.source_widget_id == widget_id);
        if from_removed {
            self.cross_filter.send_replace(None);
        }

        tracing::debug!("Removed widget {} from {}", widget_id, self.scope);
        self.persist();
        true
    }

    pub fn update_widget(
        &mut self,
        widget_id: &str,
        update: WidgetUpdate,
    ) -> Result<&Widget, WidgetError> {
        let index = self
            .widgets
            .iter()
            .position(|w| w.id == widget_id)
            .ok_or_else(|| WidgetError::NotFound(widget_id.to_string()))?;
        let merged = update.merged_into(&self.widgets[index])?;

        if let Some(layout) = self.layouts.iter_mut().find(|l| l.i == widget_id) {
            layout.section_id = merged.section_id.clone();
            layout.data_source_id = merged.data_source_id.clone();
        }
        self.cache.set_widget(&merged);
        self.widgets[index] = merged;
        self.persist();
        Ok(&self.widgets[index])
    }

    /// Replace the layout from grid positions reported after a drag or
    /// resize. Positions for unknown widgets are dropped and widgets missing
    /// from `positions` keep their current entry.
    pub fn update_layout(&mut self, positions: Vec<GridPosition>) -> Result<(), WidgetError> {
        for position in &positions {
            position.rect.validate()?;
        }

        let mut by_id: HashMap<String, GridRect> = HashMap::new();
        for position in positions {
            if self.widget(&position.i).is_none() {
                tracing::debug!("Ignoring layout for unknown widget {}", position.i);
                continue;
            }
            by_id.insert(position.i, position.rect);
        }

        let layouts = self
            .widgets
            .iter()
            .map(|widget| {
                let rect = by_id
                    .get(&widget.id)
                    .copied()
                    .or_else(|| self.layout(&widget.id).map(WidgetLayout::rect))
                    .unwrap_or_else(|| self.fallback_rect());
                WidgetLayout::for_widget(widget, rect)
            })
            .collect::<Vec<_>>();

        // A resized widget restarts its auto-height driver from the new height
        for layout in &layouts {
            let resized = self.layout(&layout.i).is_some_and(|old| old.h != layout.h);
            if resized && self.auto_heights.remove(&layout.i).is_some() {
                tracing::trace!("Widget {} resized to {} rows, resetting auto-height", layout.i, layout.h);
            }
        }
        self.layouts = layouts;
        self.persist();
        Ok(())
    }

    pub fn clear_widgets(&mut self) {
        for widget in &self.widgets {
            self.cache.invalidate_widget(&widget.id);
        }
        self.widgets.clear();
        self.layouts.clear();
        self.auto_heights.clear();
        self.cross_filter.send_replace(None);
        self.persistence.clear(&self.scope);
        tracing::info!("Cleared all widgets of {}", self.scope);
    }

    /// Replace in-memory state with the persisted snapshot, if one exists.
    /// Snapshots that break the widget/layout pairing are repaired on load.
    pub async fn load_from_storage(&mut self) -> bool {
        let Some(snapshot) = self.persistence.load(&self.scope).await else {
            return false;
        };

        let mut seen = HashSet::new();
        let mut widgets = Vec::with_capacity(snapshot.widgets.len());
        for widget in snapshot.widgets {
            if let Err(e) = widget.validate() {
                tracing::warn!("Dropping stored widget of {}: {}", self.scope, e);
                continue;
            }
            if seen.insert(widget.id.clone()) {
                widgets.push(widget);
            }
        }

        self.auto_heights.clear();
        self.widgets = widgets;
        self.layouts = Vec::with_capacity(self.widgets.len());
        for widget in &self.widgets {
            let rect = snapshot
                .layouts
                .iter()
                .find(|l| l.i == widget.id && l.rect().validate().is_ok())
                .map(WidgetLayout::rect)
                .unwrap_or_else(|| fallback_rect(&self.layouts));
            self.layouts.push(WidgetLayout::for_widget(widget, rect));
            self.cache.set_widget(widget);
        }

        tracing::info!(
            "Loaded {} widgets for {} (saved at {})",
            self.widgets.len(),
            self.scope,
            snapshot.saved_at
        );
        true
    }

    pub fn active_cross_filter(&self) -> Option<CrossFilter> {
        self.cross_filter.borrow().clone()
    }

    /// Set or clear the single active cross-filter. The last writer wins.
    pub fn set_active_cross_filter(&self, filter: Option<CrossFilter>) {
        match &filter {
            Some(f) => tracing::debug!(
                "Cross-filter on {} from {}: {}",
                self.scope,
                f.source_widget_id,
                f.label
            ),
            None => tracing::debug!("Cross-filter on {} cleared", self.scope),
        }
        self.cross_filter.send_replace(filter);
    }

    pub fn subscribe_cross_filter(&self) -> watch::Receiver<Option<CrossFilter>> {
        self.cross_filter.subscribe()
    }

    /// Feed a rendered content height for a widget. The widget's auto-height
    /// driver starts on the first sample from its current layout height.
    pub fn record_measurement(&mut self, widget_id: &str, content_px: f64) -> Result<(), WidgetError> {
        let Some(layout) = self.layout(widget_id) else {
            return Err(WidgetError::NotFound(widget_id.to_string()));
        };
        let committed = u32::try_from(layout.h).unwrap_or(0);

        let config = self.auto_height;
        let commits = self.height_tx.clone();
        self.auto_heights
            .entry(widget_id.to_string())
            .or_insert_with(|| {
                AutoHeightHandle::spawn(
                    widget_id.to_string(),
                    AutoHeightController::new(config, committed),
                    commits,
                )
            })
            .measure(content_px);
        Ok(())
    }

    /// Apply a committed height from an auto-height driver. Commits for
    /// widgets removed in the meantime are dropped.
    pub fn apply_height(&mut self, commit: HeightCommit) -> bool {
        let rows = i32::try_from(commit.rows).unwrap_or(i32::MAX);
        let Some(layout) = self.layouts.iter_mut().find(|l| l.i == commit.widget_id) else {
            return false;
        };
        if layout.h == rows {
            return false;
        }
        layout.h = rows;
        self.persist();
        true
    }

    /// Hand out the receiving end of auto-height commits. Only the first
    /// caller gets it.
    pub fn take_height_commits(&mut self) -> Option<mpsc::UnboundedReceiver<HeightCommit>> {
        self.height_rx.take()
    }

    /// Stop all auto-height drivers and drop any cross-filter subscribers'
    /// pending value.
    pub fn shutdown(&mut self) {
        self.auto_heights.clear();
        self.cross_filter.send_replace(None);
    }

    fn fallback_rect(&self) -> GridRect {
        fallback_rect(&self.layouts)
    }

    fn persist(&self) {
        let snapshot = Snapshot::new(self.widgets.clone(), self.layouts.clone());
        self.persistence.commit(&self.scope, snapshot);
    }
}

/// Place below everything else at a default size.
fn fallback_rect(layouts: &[WidgetLayout]) -> GridRect {
    let bottom = layouts.iter().map(|l| l.y + l.h).max().unwrap_or(0);
    GridRect::new(0, bottom, FALLBACK_WIDTH, FALLBACK_HEIGHT)
}
