// Route table for the report grid service
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    add_widget, cache_stats, clear_report, close_report, cross_filter_events, get_report,
    health_check, list_open_reports, record_measurement, remove_widget, set_cross_filter, sync_status,
    update_layout, update_widget,
};
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/cache/stats", get(cache_stats))
        .route("/reports", get(list_open_reports))
        .route("/reports/:client/:fy", get(get_report).delete(clear_report))
        .route("/reports/:client/:fy/close", post(close_report))
        .route("/reports/:client/:fy/layout", put(update_layout))
        .route("/reports/:client/:fy/widgets", post(add_widget))
        .route(
            "/reports/:client/:fy/widgets/:widget",
            patch(update_widget).delete(remove_widget),
        )
        .route(
            "/reports/:client/:fy/widgets/:widget/measurements",
            post(record_measurement),
        )
        .route("/reports/:client/:fy/cross-filter", put(set_cross_filter))
        .route("/reports/:client/:fy/cross-filter/events", get(cross_filter_events))
        .route("/reports/:client/:fy/sync", get(sync_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::auto_height::AutoHeightConfig;
    use crate::application::data_cache::DataCache;
    use crate::application::persistence::SnapshotPersistence;
    use crate::application::report_registry::ReportRegistry;
    use crate::infrastructure::memory_store::MemorySnapshotStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let persistence = SnapshotPersistence::local_only(Arc::new(MemorySnapshotStore::default()));
        let registry = ReportRegistry::new(
            Arc::new(parking_lot::Mutex::new(DataCache::default())),
            Arc::new(persistence),
            AutoHeightConfig::default(),
        );
        build_router(Arc::new(AppState {
            registry: Arc::new(registry),
        }))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app().oneshot(request("GET", "/healthz", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_widget_lifecycle_over_http() {
        let app = app();

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/reports/acme/2024/widgets",
                Some(json!({
                    "widget": { "id": "w1", "type": "kpi", "title": "Revenue" },
                    "layout": { "x": 0, "y": 0, "w": 2, "h": 2 }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["layout"]["widgetId"], "w1");

        let (status, body) = send(
            &app,
            request(
                "PATCH",
                "/reports/acme/2024/widgets/w1",
                Some(json!({ "sectionId": "summary" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["widget"]["sectionId"], "summary");
        assert_eq!(body["layout"]["sectionId"], "summary");

        let (status, _) = send(&app, request("DELETE", "/reports/acme/2024/widgets/w1", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request("DELETE", "/reports/acme/2024/widgets/w1", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, request("GET", "/reports/acme/2024", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["widgets"], json!([]));
        assert_eq!(body["layouts"], json!([]));
        assert_eq!(body["sync"]["state"], "disabled");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app();
        let add = json!({
            "widget": { "id": "w1", "type": "table", "title": "Ledger" },
            "layout": { "x": 0, "y": 0, "w": 4, "h": 4 }
        });

        let (status, _) = send(&app, request("POST", "/reports/acme/2024/widgets", Some(add.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, request("POST", "/reports/acme/2024/widgets", Some(add))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("w1"));

        let (status, _) = send(
            &app,
            request("PATCH", "/reports/acme/2024/widgets/nope", Some(json!({ "title": "X" }))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            request("PATCH", "/reports/acme/2024/widgets/w1", Some(json!({ "colour": "red" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, request("GET", "/reports/a:b/2024", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_layout_and_cross_filter() {
        let app = app();
        send(
            &app,
            request(
                "POST",
                "/reports/acme/2024/widgets",
                Some(json!({
                    "widget": { "id": "w1", "type": "barChart", "title": "By account" },
                    "layout": { "x": 0, "y": 0, "w": 4, "h": 4 }
                })),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            request(
                "PUT",
                "/reports/acme/2024/layout",
                Some(json!([{ "i": "w1", "x": 2, "y": 1, "w": 6, "h": 5 }])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["x"], 2);
        assert_eq!(body[0]["h"], 5);

        let filter = json!({
            "sourceWidgetId": "w1",
            "filterType": "account",
            "value": "4000",
            "label": "Revenue"
        });
        let (status, body) = send(&app, request("PUT", "/reports/acme/2024/cross-filter", Some(filter.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, filter);

        send(
            &app,
            request(
                "POST",
                "/reports/acme/2024/widgets",
                Some(json!({
                    "widget": { "id": "w2", "type": "lineChart", "title": "Trend" },
                    "layout": { "x": 0, "y": 4, "w": 4, "h": 4 }
                })),
            ),
        )
        .await;
        let (_, body) = send(&app, request("GET", "/reports/acme/2024", None)).await;
        assert_eq!(body["crossFilter"]["label"], "Revenue");
        assert_eq!(body["filteredWidgetIds"], json!(["w2"]));

        let (_, body) = send(&app, request("PUT", "/reports/acme/2024/cross-filter", Some(Value::Null))).await;
        assert_eq!(body, Value::Null);

        let (status, _) = send(
            &app,
            request(
                "POST",
                "/reports/acme/2024/widgets/w1/measurements",
                Some(json!({ "contentHeightPx": 320.0 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&app, request("GET", "/cache/stats", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["size"], 2);
        assert_eq!(body["maxSize"], 100);

        let (_, body) = send(&app, request("GET", "/reports", None)).await;
        assert_eq!(body, json!([{ "clientId": "acme", "fiscalYear": 2024 }]));

        let (status, _) = send(&app, request("POST", "/reports/acme/2024/close", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request("POST", "/reports/acme/2024/close", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
