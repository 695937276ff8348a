// Widget cache - write-through cache kept in sync with widget CRUD
use crate::application::data_cache::SharedCache;
use crate::domain::report::ReportScope;
use crate::domain::widget::Widget;

pub trait WidgetCache: Send + Sync {
    fn set_widget(&self, widget: &Widget);

    fn invalidate_widget(&self, widget_id: &str);

    fn widget(&self, widget_id: &str) -> Option<Widget>;
}

/// [`WidgetCache`] over the process-wide data cache, namespaced by report
/// scope so two reports can hold widgets with the same id.
#[derive(Clone)]
pub struct ScopedWidgetCache {
    prefix: String,
    cache: SharedCache<Widget>,
}

impl ScopedWidgetCache {
    pub fn new(scope: &ReportScope, cache: SharedCache<Widget>) -> Self {
        Self {
            prefix: scope.storage_key(),
            cache,
        }
    }

    fn key(&self, widget_id: &str) -> String {
        format!("{}:{}", self.prefix, widget_id)
    }
}

impl WidgetCache for ScopedWidgetCache {
    fn set_widget(&self, widget: &Widget) {
        self.cache.lock().set(self.key(&widget.id), widget.clone(), None);
    }

    fn invalidate_widget(&self, widget_id: &str) {
        self.cache.lock().remove(&self.key(widget_id));
    }

    fn widget(&self, widget_id: &str) -> Option<Widget> {
        self.cache.lock().get(&self.key(widget_id))
    }
}
