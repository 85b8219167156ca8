use std::sync::Arc;

use tokio::sync::watch;

use super::controller::{ListController, LoadOutcome};
use super::effect::QueryEffect;
use super::fetcher::PageFetcher;
use super::state::AsyncListState;
use crate::query::{ListQuery, ListResource};
use crate::search::{SearchBinding, SearchDebouncer};

/// One mounted list view: the query it owns, the controller that fetches
/// for it, and the effect that keeps the two in step.
///
/// Mounting starts the first load. Every query edit made through
/// [`update_query`](Self::update_query) that actually changes the query
/// triggers exactly one more.
pub struct ListScreen<R: ListResource, F> {
    controller: Arc<ListController<R, F>>,
    queries: watch::Sender<ListQuery<R>>,
    effect: QueryEffect,
}

impl<R, F> ListScreen<R, F>
where
    R: ListResource,
    F: PageFetcher<R> + 'static,
{
    pub fn mount(fetcher: F, initial: ListQuery<R>) -> Self {
        let controller = Arc::new(ListController::with_query(fetcher, initial.clone()));
        let (queries, receiver) = watch::channel(initial);
        let effect = QueryEffect::spawn(Arc::clone(&controller), receiver);
        Self {
            controller,
            queries,
            effect,
        }
    }

    pub fn controller(&self) -> &Arc<ListController<R, F>> {
        &self.controller
    }

    pub fn state(&self) -> watch::Receiver<AsyncListState<R::Item>> {
        self.controller.subscribe()
    }

    pub fn query(&self) -> ListQuery<R> {
        self.queries.borrow().clone()
    }

    /// Edit the query in place. Returns whether it changed.
    pub fn update_query(&self, edit: impl FnOnce(&mut ListQuery<R>)) -> bool {
        self.queries.send_if_modified(|query| {
            let before = query.clone();
            edit(query);
            *query != before
        })
    }

    /// Feed committed search text from `debouncer` into this screen's query.
    pub fn bind_search(&self, debouncer: &SearchDebouncer) -> SearchBinding {
        SearchBinding::spawn(debouncer.committed(), self.queries.clone())
    }

    pub async fn load_more(&self) -> LoadOutcome {
        self.controller.load_more().await
    }

    pub async fn retry(&self) -> LoadOutcome {
        self.controller.retry().await
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.controller.reload().await
    }

    /// Stop reacting to query changes and wait for the effect task to end.
    pub async fn unmount(self) {
        self.effect.shutdown().await;
    }
}
