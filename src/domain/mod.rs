// Domain layer - Report widgets, layouts, filters and scopes
pub mod cross_filter;
pub mod report;
pub mod widget;
