// Report scope and persisted snapshot models
use super::widget::{Widget, WidgetLayout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A report view is scoped to one client and one fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportScope {
    pub client_id: String,
    pub fiscal_year: i32,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScopeError {
    #[error("client id must not be empty")]
    EmptyClient,
    #[error("client id {0:?} contains reserved characters")]
    InvalidClient(String),
    #[error("fiscal year {0} is out of range")]
    InvalidFiscalYear(i32),
}

impl ReportScope {
    pub fn new(client_id: impl Into<String>, fiscal_year: i32) -> Result<Self, ScopeError> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ScopeError::EmptyClient);
        }
        if client_id
            .chars()
            .any(|c| c == '/' || c == ':' || c == '\\' || c.is_whitespace())
        {
            return Err(ScopeError::InvalidClient(client_id));
        }
        if !(1900..=9999).contains(&fiscal_year) {
            return Err(ScopeError::InvalidFiscalYear(fiscal_year));
        }
        Ok(Self {
            client_id,
            fiscal_year,
        })
    }

    /// Key under which the scope's snapshot is stored, locally and remotely.
    pub fn storage_key(&self) -> String {
        format!("report-grid:{}:{}", self.client_id, self.fiscal_year)
    }
}

impl fmt::Display for ReportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.fiscal_year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub widgets: Vec<Widget>,
    pub layouts: Vec<WidgetLayout>,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(widgets: Vec<Widget>, layouts: Vec<WidgetLayout>) -> Self {
        Self {
            widgets,
            layouts,
            saved_at: Utc::now(),
        }
    }

    /// Empty snapshot left behind when a scope is cleared, so an older
    /// replica cannot bring the widgets back.
    pub fn cleared() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty() && self.layouts.is_empty()
    }
}
