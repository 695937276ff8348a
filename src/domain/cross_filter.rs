// Cross-filter domain model
use super::widget::Widget;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A filter selection broadcast from one widget to every other widget of the
/// same report view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossFilter {
    pub source_widget_id: String,
    pub filter_type: String,
    pub value: Value,
    pub label: String,
}

impl CrossFilter {
    pub fn new(
        source_widget_id: impl Into<String>,
        filter_type: impl Into<String>,
        value: Value,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source_widget_id: source_widget_id.into(),
            filter_type: filter_type.into(),
            value,
            label: label.into(),
        }
    }

    /// The source widget keeps showing its full data set.
    pub fn applies_to(&self, widget: &Widget) -> bool {
        widget.id != self.source_widget_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::widget::WidgetType;
    use serde_json::json;

    #[test]
    fn test_applies_to_everyone_but_source() {
        let filter = CrossFilter::new("accounts", "account", json!("4000"), "Revenue");
        assert!(!filter.applies_to(&Widget::new("accounts", WidgetType::Table, "Accounts")));
        assert!(filter.applies_to(&Widget::new("trend", WidgetType::LineChart, "Trend")));
    }
}
