//! Response bodies shared by the handlers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Collection response: `{"Items": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList<T> {
    #[serde(rename = "Items")]
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Body of `GET /v1/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceStatus {
    pub name: String,
    /// `OK` followed by a note, or `ERROR` followed by the failing dependency.
    pub status: String,
    /// Seconds since the server started.
    pub uptime: u64,
    pub version: String,
    pub properties: BTreeMap<String, String>,
}

impl ServiceStatus {
    pub fn is_ok(&self) -> bool {
        self.status.starts_with("OK")
    }
}

/// Query of `POST /v1/simulations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateQuery {
    pub template: Option<String>,
}
