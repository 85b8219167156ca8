use serde::Serialize;

use crate::models::{ListPage, PageMeta};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListStatus {
    #[default]
    Idle,
    Loading,
    LoadingMore,
    Success,
    Error,
}

/// What a list screen renders: the fetch status, the accumulated rows and
/// the last failure message.
///
/// `data` survives failed fetches so the previous rows stay on screen next
/// to the error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsyncListState<T> {
    pub status: ListStatus,
    pub data: Option<ListPage<T>>,
    pub error: Option<String>,
}

impl<T> Default for AsyncListState<T> {
    fn default() -> Self {
        Self {
            status: ListStatus::Idle,
            data: None,
            error: None,
        }
    }
}

impl<T> AsyncListState<T> {
    pub fn items(&self) -> &[T] {
        self.data.as_ref().map(|d| d.items.as_slice()).unwrap_or(&[])
    }

    pub fn meta(&self) -> Option<&PageMeta> {
        self.data.as_ref().map(|d| &d.meta)
    }

    pub fn has_more(&self) -> bool {
        self.data.as_ref().is_some_and(ListPage::has_more)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, ListStatus::Loading | ListStatus::LoadingMore)
    }
}
