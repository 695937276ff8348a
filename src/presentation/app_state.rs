// Application state for HTTP handlers
use crate::application::report_registry::ReportRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ReportRegistry>,
}
