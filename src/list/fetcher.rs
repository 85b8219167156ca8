use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::error::ClientResult;
use crate::http::HttpClient;
use crate::models::ListPage;
use crate::query::{ListQuery, ListResource};
use crate::services::doctor_scope;

/// Source of list pages. The HTTP-backed [`ListService`] is the production
/// implementation; tests plug in stubs.
#[async_trait]
pub trait PageFetcher<R: ListResource>: Send + Sync {
    async fn fetch_page(&self, query: &ListQuery<R>) -> ClientResult<ListPage<R::Item>>;
}

/// Fetches pages of `R` from its endpoint, scoped to one doctor when set.
pub struct ListService<R> {
    http: HttpClient,
    doctor_id: Option<String>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: ListResource> ListService<R> {
    pub fn new(http: HttpClient, doctor_id: Option<String>) -> Self {
        Self {
            http,
            doctor_id,
            _resource: PhantomData,
        }
    }

    /// Full parameter list sent for `query`: the doctor scope first, then
    /// the query's canonical pairs.
    pub fn request_pairs(&self, query: &ListQuery<R>) -> Vec<(String, String)> {
        let mut pairs = doctor_scope(self.doctor_id.as_deref());
        pairs.extend(query.to_query_pairs());
        pairs
    }
}

#[async_trait]
impl<R: ListResource> PageFetcher<R> for ListService<R> {
    #[instrument(skip_all, fields(resource = R::NAME, page = query.page()))]
    async fn fetch_page(&self, query: &ListQuery<R>) -> ClientResult<ListPage<R::Item>> {
        let body: Value = self.http.get(R::PATH, &self.request_pairs(query)).await?;
        ListPage::from_response(body, query)
    }
}
