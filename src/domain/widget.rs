// Widget domain model - report visualizations and their grid layout entries
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetType {
    Kpi,
    Table,
    BarChart,
    LineChart,
    PieChart,
    AreaChart,
    ScatterChart,
    DonutChart,
    Gauge,
    Heatmap,
    Waterfall,
    Funnel,
    Treemap,
    Sparkline,
    Text,
    TrialBalance,
    AccountSummary,
    VarianceAnalysis,
    RatioAnalysis,
    JournalEntries,
    PayrollSummary,
    RiskMatrix,
    Materiality,
    SamplingSummary,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WidgetType,
    pub title: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    /// Seconds between refreshes when `auto_refresh` is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u32>,
}

impl Widget {
    pub fn new(id: impl Into<String>, kind: WidgetType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            config: Map::new(),
            section_id: None,
            data_source_id: None,
            auto_refresh: None,
            refresh_interval: None,
        }
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        if self.id.trim().is_empty() {
            return Err(WidgetError::Validation("widget id must not be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(WidgetError::Validation(format!(
                "widget {} must have a title",
                self.id
            )));
        }
        if self.auto_refresh == Some(true) && self.refresh_interval == Some(0) {
            return Err(WidgetError::Validation(format!(
                "widget {} has auto refresh on with a zero refresh interval",
                self.id
            )));
        }
        Ok(())
    }

    /// Merge a partial update into this widget. The id never changes.
    pub fn apply(&mut self, update: WidgetUpdate) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(config) = update.config {
            self.config = config;
        }
        if let Some(section_id) = update.section_id {
            self.section_id = section_id;
        }
        if let Some(data_source_id) = update.data_source_id {
            self.data_source_id = data_source_id;
        }
        if let Some(auto_refresh) = update.auto_refresh {
            self.auto_refresh = Some(auto_refresh);
        }
        if let Some(refresh_interval) = update.refresh_interval {
            self.refresh_interval = Some(refresh_interval);
        }
    }
}

/// Partial widget update. Nullable fields use a double `Option` so that
/// `"sectionId": null` clears the section while an absent key leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WidgetUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<WidgetType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub section_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub data_source_id: Option<Option<String>>,
    #[serde(default)]
    pub auto_refresh: Option<bool>,
    #[serde(default)]
    pub refresh_interval: Option<u32>,
}

impl WidgetUpdate {
    pub fn section(section_id: impl Into<String>) -> Self {
        Self {
            section_id: Some(Some(section_id.into())),
            ..Self::default()
        }
    }

    fn validate(&self, widget_id: &str) -> Result<(), WidgetError> {
        if let Some(id) = &self.id {
            if id != widget_id {
                return Err(WidgetError::Validation(format!(
                    "widget id cannot change from {} to {}",
                    widget_id, id
                )));
            }
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(WidgetError::Validation(format!(
                    "widget {} must have a title",
                    widget_id
                )));
            }
        }
        Ok(())
    }

    /// Produce the merged widget without touching the original, so a
    /// rejected update leaves no partial mutation behind.
    pub fn merged_into(self, widget: &Widget) -> Result<Widget, WidgetError> {
        self.validate(&widget.id)?;
        let mut merged = widget.clone();
        merged.apply(self);
        merged.validate()?;
        Ok(merged)
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// A grid position as reported by the grid library after a drag or resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl GridRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        if self.x < 0 || self.y < 0 {
            return Err(WidgetError::Validation(format!(
                "grid position ({}, {}) must not be negative",
                self.x, self.y
            )));
        }
        if self.w < 1 || self.h < 1 {
            return Err(WidgetError::Validation(format!(
                "grid size {}x{} must be at least one cell",
                self.w, self.h
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub i: String,
    #[serde(flatten)]
    pub rect: GridRect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetLayout {
    pub i: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub widget_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

impl WidgetLayout {
    /// Build the layout entry paired with `widget`; ids and shared fields
    /// always come from the widget.
    pub fn for_widget(widget: &Widget, rect: GridRect) -> Self {
        Self {
            i: widget.id.clone(),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            widget_id: widget.id.clone(),
            data_source_id: widget.data_source_id.clone(),
            section_id: widget.section_id.clone(),
        }
    }

    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.w, self.h)
    }

    pub fn belongs_to(&self, widget: &Widget) -> bool {
        self.i == widget.id && self.widget_id == widget.id
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WidgetError {
    #[error("invalid widget: {0}")]
    Validation(String),
    #[error("widget {0} already exists")]
    Duplicate(String),
    #[error("widget {0} not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widget_wire_format() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w1",
            "type": "kpi",
            "title": "Revenue",
            "sectionId": "summary",
            "refreshInterval": 30
        }))
        .unwrap();

        assert_eq!(widget.kind, WidgetType::Kpi);
        assert_eq!(widget.section_id.as_deref(), Some("summary"));
        assert_eq!(widget.refresh_interval, Some(30));
        assert!(widget.config.is_empty());

        let value = serde_json::to_value(&widget).unwrap();
        assert_eq!(value["type"], "kpi");
        assert!(value.get("dataSourceId").is_none());
    }

    #[test]
    fn test_unknown_widget_type_is_rejected() {
        let result: Result<Widget, _> = serde_json::from_value(json!({
            "id": "w1",
            "type": "hologram",
            "title": "Revenue"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Widget::new("w1", WidgetType::Kpi, "Revenue").validate().is_ok());
        assert!(matches!(
            Widget::new(" ", WidgetType::Kpi, "Revenue").validate(),
            Err(WidgetError::Validation(_))
        ));
        assert!(Widget::new("w1", WidgetType::Kpi, "").validate().is_err());

        let mut refreshing = Widget::new("w1", WidgetType::LineChart, "Cash");
        refreshing.auto_refresh = Some(true);
        refreshing.refresh_interval = Some(0);
        assert!(refreshing.validate().is_err());
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let mut widget = Widget::new("w1", WidgetType::Table, "Ledger");
        widget.section_id = Some("summary".into());

        let untouched: WidgetUpdate = serde_json::from_value(json!({ "title": "GL" })).unwrap();
        let merged = untouched.merged_into(&widget).unwrap();
        assert_eq!(merged.title, "GL");
        assert_eq!(merged.section_id.as_deref(), Some("summary"));

        let cleared: WidgetUpdate = serde_json::from_value(json!({ "sectionId": null })).unwrap();
        let merged = cleared.merged_into(&widget).unwrap();
        assert_eq!(merged.section_id, None);
    }

    #[test]
    fn test_update_cannot_change_id() {
        let widget = Widget::new("w1", WidgetType::Table, "Ledger");
        let update = WidgetUpdate {
            id: Some("w2".into()),
            ..WidgetUpdate::default()
        };
        assert!(matches!(update.merged_into(&widget), Err(WidgetError::Validation(_))));
    }

    #[test]
    fn test_grid_rect_validate() {
        assert!(GridRect::new(0, 0, 2, 2).validate().is_ok());
        assert!(GridRect::new(-1, 0, 2, 2).validate().is_err());
        assert!(GridRect::new(0, 0, 0, 2).validate().is_err());
    }

    #[test]
    fn test_layout_for_widget_shares_ids() {
        let mut widget = Widget::new("w1", WidgetType::Kpi, "Revenue");
        widget.data_source_id = Some("tb-2024".into());
        let layout = WidgetLayout::for_widget(&widget, GridRect::new(0, 0, 2, 2));

        assert!(layout.belongs_to(&widget));
        assert_eq!(layout.data_source_id.as_deref(), Some("tb-2024"));
    }
}
