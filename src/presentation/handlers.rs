// HTTP request handlers
use crate::application::persistence::SyncStatus;
use crate::application::widget_manager::WidgetManager;
use crate::domain::cross_filter::CrossFilter;
use crate::domain::report::ReportScope;
use crate::domain::widget::{
    GridPosition, GridRect, Widget, WidgetError, WidgetLayout, WidgetUpdate,
};
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

type ScopePath = Path<(String, i32)>;
type WidgetPath = Path<(String, i32, String)>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub scope: ReportScope,
    pub widgets: Vec<Widget>,
    pub layouts: Vec<WidgetLayout>,
    pub cross_filter: Option<CrossFilter>,
    /// Widgets that narrow their data by the active cross-filter
    pub filtered_widget_ids: Vec<String>,
    pub sync: SyncStatus,
}

#[derive(Deserialize)]
pub struct AddWidgetRequest {
    pub widget: Widget,
    pub layout: GridRect,
}

#[derive(Serialize)]
pub struct WidgetView {
    pub widget: Widget,
    pub layout: Option<WidgetLayout>,
}

impl WidgetView {
    fn of(manager: &WidgetManager, widget_id: &str) -> Result<Self, ApiError> {
        let widget = manager
            .widget(widget_id)
            .cloned()
            .ok_or_else(|| WidgetError::NotFound(widget_id.to_string()))?;
        Ok(Self {
            widget,
            layout: manager.layout(widget_id).cloned(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRequest {
    pub content_height_px: f64,
}

fn scope_of(client_id: String, fiscal_year: i32) -> Result<ReportScope, ApiError> {
    Ok(ReportScope::new(client_id, fiscal_year)?)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Scopes with an open report session
pub async fn list_open_reports(State(state): State<Arc<AppState>>) -> Json<Vec<ReportScope>> {
    Json(state.registry.open_scopes())
}

/// Current widgets, layouts and cross-filter of a report
pub async fn get_report(
    Path((client_id, fiscal_year)): ScopePath,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let manager = state.registry.open(&scope).await;
    let view = {
        let manager = manager.lock().await;
        let cross_filter = manager.active_cross_filter();
        let filtered_widget_ids = match &cross_filter {
            Some(filter) => manager
                .widgets()
                .iter()
                .filter(|w| filter.applies_to(w))
                .map(|w| w.id.clone())
                .collect(),
            None => Vec::new(),
        };
        ReportView {
            scope: scope.clone(),
            widgets: manager.widgets().to_vec(),
            layouts: manager.layouts().to_vec(),
            cross_filter,
            filtered_widget_ids,
            sync: manager.sync_status(),
        }
    };
    Ok(json_response(StatusCode::OK, &view, accepts_brotli(&headers)).await)
}

/// Remove every widget of a report, including persisted state
pub async fn clear_report(
    Path((client_id, fiscal_year)): ScopePath,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let manager = state.registry.open(&scope).await;
    manager.lock().await.clear_widgets();
    Ok(StatusCode::NO_CONTENT)
}

/// Tear down the report's in-memory session
pub async fn close_report(
    Path((client_id, fiscal_year)): ScopePath,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    if state.registry.close(&scope).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn add_widget(
    Path((client_id, fiscal_year)): ScopePath,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddWidgetRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let Json(request) = payload?;
    let widget_id = request.widget.id.clone();

    let manager = state.registry.open(&scope).await;
    let view = {
        let mut manager = manager.lock().await;
        manager.add_widget(request.widget, request.layout)?;
        WidgetView::of(&manager, &widget_id)?
    };
    Ok(json_response(StatusCode::CREATED, &view, accepts_brotli(&headers)).await)
}

pub async fn update_widget(
    Path((client_id, fiscal_year, widget_id)): WidgetPath,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WidgetUpdate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let Json(update) = payload?;

    let manager = state.registry.open(&scope).await;
    let view = {
        let mut manager = manager.lock().await;
        manager.update_widget(&widget_id, update)?;
        WidgetView::of(&manager, &widget_id)?
    };
    Ok(json_response(StatusCode::OK, &view, accepts_brotli(&headers)).await)
}

/// Removing an unknown widget succeeds; removal is idempotent
pub async fn remove_widget(
    Path((client_id, fiscal_year, widget_id)): WidgetPath,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let manager = state.registry.open(&scope).await;
    manager.lock().await.remove_widget(&widget_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Replace grid positions after a drag or resize
pub async fn update_layout(
    Path((client_id, fiscal_year)): ScopePath,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Vec<GridPosition>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let Json(positions) = payload?;

    let manager = state.registry.open(&scope).await;
    let layouts = {
        let mut manager = manager.lock().await;
        manager.update_layout(positions)?;
        manager.layouts().to_vec()
    };
    Ok(json_response(StatusCode::OK, &layouts, accepts_brotli(&headers)).await)
}

/// Content height sample from a rendered widget
pub async fn record_measurement(
    Path((client_id, fiscal_year, widget_id)): WidgetPath,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MeasurementRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let Json(measurement) = payload?;

    let manager = state.registry.open(&scope).await;
    manager
        .lock()
        .await
        .record_measurement(&widget_id, measurement.content_height_px)?;
    Ok(StatusCode::ACCEPTED)
}

/// Set the active cross-filter; a `null` body clears it
pub async fn set_cross_filter(
    Path((client_id, fiscal_year)): ScopePath,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Option<CrossFilter>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let Json(filter) = payload?;

    let manager = state.registry.open(&scope).await;
    let manager = manager.lock().await;
    manager.set_active_cross_filter(filter);
    Ok(Json(manager.active_cross_filter()))
}

/// Stream of cross-filter changes, starting with the current value
pub async fn cross_filter_events(
    Path((client_id, fiscal_year)): ScopePath,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let manager = state.registry.open(&scope).await;
    let rx = manager.lock().await.subscribe_cross_filter();
    tracing::info!("New cross-filter subscriber for {}", scope);

    let stream = async_stream::stream! {
        let mut updates = WatchStream::new(rx);
        while let Some(filter) = updates.next().await {
            match Event::default().event("crossFilter").json_data(&filter) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!("Failed to encode cross-filter event: {}", e),
            }
        }
        tracing::debug!("Cross-filter stream for {} ended", scope);
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn sync_status(
    Path((client_id, fiscal_year)): ScopePath,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncStatus>, ApiError> {
    let scope = scope_of(client_id, fiscal_year)?;
    let manager = state.registry.open(&scope).await;
    let status = manager.lock().await.sync_status();
    Ok(Json(status))
}

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.cache_stats())
}
