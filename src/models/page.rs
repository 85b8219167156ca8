//! Paginated list payloads and server-side status tallies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::query::{ListQuery, ListResource};

/// Pagination metadata returned next to every list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    #[serde(alias = "perPage")]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(alias = "totalPages")]
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl PageMeta {
    /// More pages exist after this one.
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Server-computed counts keyed by status, plus the overall total.
///
/// These are never derived from the rows on screen; a summary and a list page
/// may describe different filter scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct StatusSummary {
    pub total: u64,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl From<BTreeMap<String, Value>> for StatusSummary {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let mut summary = StatusSummary::default();
        for (key, value) in raw {
            let Some(count) = value.as_u64() else {
                continue;
            };
            if key == "total" {
                summary.total = count;
            } else {
                summary.counts.insert(key, count);
            }
        }
        summary
    }
}

impl StatusSummary {
    pub fn count(&self, status: &str) -> u64 {
        self.counts.get(status).copied().unwrap_or(0)
    }

    pub fn sum_of_counts(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Whether the per-status counts add up to `total`. Only meaningful when
    /// both came from the same filter scope.
    pub fn matches_total(&self) -> bool {
        self.sum_of_counts() == self.total
    }
}

/// One fetched page (or several accumulated pages) of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StatusSummary>,
}

impl<T> ListPage<T> {
    pub fn has_more(&self) -> bool {
        self.meta.has_more()
    }

    pub fn total_pages(&self) -> u32 {
        self.meta.total_pages
    }

    /// Append the following page, keeping server order.
    pub fn append(&mut self, next: ListPage<T>) {
        self.items.extend(next.items);
        self.meta = next.meta;
        if next.summary.is_some() {
            self.summary = next.summary;
        }
    }
}

impl<T: serde::de::DeserializeOwned> ListPage<T> {
    /// Decode a list response body for resource `R`.
    ///
    /// Rows are read from `R::ITEMS_KEY` (falling back to `items`, then to a
    /// bare array). An object with neither key is a decode error. When the server omits `meta`, the page is treated as the
    /// only one and described from the request.
    pub fn from_response<R>(body: Value, query: &ListQuery<R>) -> Result<Self, ClientError>
    where
        R: ListResource<Item = T>,
    {
        let (items_value, meta_value, summary_value) = match body {
            Value::Array(rows) => (Value::Array(rows), None, None),
            Value::Object(mut map) => {
                let Some(items) = map.remove(R::ITEMS_KEY).or_else(|| map.remove("items")) else {
                    return Err(ClientError::Decode(serde::de::Error::custom(format!(
                        "{} response has no '{}' rows",
                        R::NAME,
                        R::ITEMS_KEY
                    ))));
                };
                (items, map.remove("meta"), map.remove("summary"))
            }
            other => {
                return Err(ClientError::Decode(serde::de::Error::custom(format!(
                    "expected a list response object, got {other}"
                ))));
            }
        };

        let items: Vec<T> = serde_json::from_value(items_value)?;
        let meta = match meta_value {
            Some(meta) => serde_json::from_value(meta)?,
            None => PageMeta {
                page: query.page(),
                per_page: query.per_page(),
                total: items.len() as u64,
                total_pages: query.page(),
                sort: None,
                order: None,
            },
        };
        let summary = summary_value
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Self {
            items,
            meta,
            summary,
        })
    }
}
