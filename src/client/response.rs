//! CRM API response envelope types
//!
//! One page of the deals collection: a `results` array plus pagination
//! metadata carrying the forward cursor. Some deployments answer with
//! alternative pagination shapes (`has_more`/`next_cursor`, or
//! `next_page_token`); [`DealsPage::forward_cursor`] resolves all of them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of raw deal records with pagination metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealsPage {
    /// Raw records in stream order.
    #[serde(default)]
    pub results: Vec<RawDeal>,
    /// Cursor-based pagination block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    /// Alternative pagination: flag indicating more pages exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    /// Alternative pagination: cursor paired with `has_more`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Alternative pagination: opaque page token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl DealsPage {
    /// Resolve the cursor for the next page, if any.
    ///
    /// Checks `paging.next.after` first, then the `has_more`/`next_cursor`
    /// pair, then `next_page_token`. `None` means the collection is
    /// exhausted.
    pub fn forward_cursor(&self) -> Option<&str> {
        if let Some(after) = self
            .paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
        {
            return Some(after);
        }
        if self.has_more == Some(true) {
            if let Some(cursor) = self.next_cursor.as_deref() {
                return Some(cursor);
            }
        }
        self.next_page_token.as_deref()
    }
}

/// Pagination block of a deals page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging {
    /// Forward link; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<PagingNext>,
}

/// Forward pagination link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingNext {
    /// Cursor identifying the next page.
    pub after: String,
}

/// One raw deal record as returned by the API.
///
/// The well-known fields are lifted out; everything else the API sends at
/// the top level lands in `extra` so property allow-lists can select it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDeal {
    /// Record identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Nested properties container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Archived flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawDeal {
    /// Look up a value inside the nested properties container.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    /// Look up a top-level field of the raw record by name.
    pub fn top_level(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.clone().map(Value::String),
            "archived" => self.archived.map(Value::Bool),
            "properties" => self.properties.clone().map(Value::Object),
            _ => self.extra.get(name).cloned(),
        }
    }
}
