//! Fetch lifecycle for one list screen.

use std::sync::{Mutex, MutexGuard};

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::fetcher::PageFetcher;
use super::state::{AsyncListState, ListStatus};
use crate::error::ClientResult;
use crate::models::ListPage;
use crate::query::{ListQuery, ListResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    LoadMore,
}

/// What happened to a `load`/`load_more` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was applied to the state.
    Applied,
    /// The fetch failed; the state now carries the error.
    Failed,
    /// A newer `load` started while this one was in flight; its response was
    /// dropped.
    Superseded,
    /// Nothing to do (already busy, nothing loaded yet, no next page, or
    /// the last `load` failed so the rows on screen belong to an older
    /// query).
    Skipped,
}

struct Tracking<R: ListResource> {
    query: ListQuery<R>,
    generation: u64,
    last_failed: Option<Operation>,
}

/// Owns the query and the published [`AsyncListState`] for one screen.
///
/// Every `load` bumps a generation counter; a response is applied only if no
/// newer `load` started after its request went out, so the last intent wins
/// no matter in which order responses arrive.
pub struct ListController<R: ListResource, F> {
    fetcher: F,
    state: watch::Sender<AsyncListState<R::Item>>,
    tracking: Mutex<Tracking<R>>,
}

impl<R, F> ListController<R, F>
where
    R: ListResource,
    F: PageFetcher<R>,
{
    pub fn new(fetcher: F) -> Self {
        Self::with_query(fetcher, ListQuery::default())
    }

    pub fn with_query(fetcher: F, query: ListQuery<R>) -> Self {
        let (state, _) = watch::channel(AsyncListState::default());
        Self {
            fetcher,
            state,
            tracking: Mutex::new(Tracking {
                query,
                generation: 0,
                last_failed: None,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AsyncListState<R::Item>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AsyncListState<R::Item> {
        self.state.borrow().clone()
    }

    /// Query of the most recent `load`, with the page advanced by any
    /// successful `load_more`.
    pub fn query(&self) -> ListQuery<R> {
        self.tracking().query.clone()
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch page 1 of `query`, replacing whatever is shown.
    pub async fn load(&self, query: ListQuery<R>) -> LoadOutcome {
        let (generation, query) = {
            let mut tracking = self.tracking();
            tracking.generation += 1;
            tracking.query = query.with_page(1);
            tracking.last_failed = None;
            self.state.send_modify(|state| {
                state.status = ListStatus::Loading;
                state.error = None;
            });
            (tracking.generation, tracking.query.clone())
        };

        debug!(resource = R::NAME, generation, "Loading list");
        let result = self.fetcher.fetch_page(&query).await;
        self.apply(Operation::Load, generation, result)
    }

    /// Re-run the current query from page 1.
    pub async fn reload(&self) -> LoadOutcome {
        let query = self.query();
        self.load(query).await
    }

    /// Fetch the next page and append it. Ignored while a fetch is running,
    /// before anything is loaded, on the last page, and after a failed
    /// `load` until `retry` or a new `load` succeeds.
    pub async fn load_more(&self) -> LoadOutcome {
        let (generation, next) = {
            let tracking = self.tracking();
            if tracking.last_failed == Some(Operation::Load) {
                debug!(resource = R::NAME, "load_more skipped after failed load");
                return LoadOutcome::Skipped;
            }
            let mut next_page = None;
            self.state.send_if_modified(|state| {
                if state.is_busy() {
                    return false;
                }
                match state.data.as_ref() {
                    Some(page) if page.has_more() => {
                        next_page = Some(page.meta.page + 1);
                        state.status = ListStatus::LoadingMore;
                        state.error = None;
                        true
                    }
                    _ => false,
                }
            });
            let Some(page) = next_page else {
                debug!(resource = R::NAME, "load_more skipped");
                return LoadOutcome::Skipped;
            };
            (tracking.generation, tracking.query.clone().with_page(page))
        };

        debug!(resource = R::NAME, page = next.page(), generation, "Loading next page");
        let result = self.fetcher.fetch_page(&next).await;
        self.apply(Operation::LoadMore, generation, result)
    }

    /// Re-run whichever operation failed last.
    pub async fn retry(&self) -> LoadOutcome {
        let last_failed = self.tracking().last_failed;
        match last_failed {
            Some(Operation::Load) => self.reload().await,
            Some(Operation::LoadMore) => self.load_more().await,
            None => LoadOutcome::Skipped,
        }
    }

    fn apply(
        &self,
        operation: Operation,
        generation: u64,
        result: ClientResult<ListPage<R::Item>>,
    ) -> LoadOutcome {
        let mut tracking = self.tracking();
        if tracking.generation != generation {
            counter!("clinic_list_stale_responses_total", "resource" => R::NAME).increment(1);
            debug!(
                resource = R::NAME,
                generation,
                current = tracking.generation,
                ?operation,
                "Discarding stale list response"
            );
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(page) => {
                tracking.last_failed = None;
                if operation == Operation::LoadMore {
                    tracking.query.set_page(page.meta.page);
                }
                self.state.send_modify(|state| {
                    if operation == Operation::LoadMore
                        && let Some(existing) = state.data.as_mut()
                    {
                        existing.append(page);
                    } else {
                        state.data = Some(page);
                    }
                    state.status = ListStatus::Success;
                    state.error = None;
                });
                LoadOutcome::Applied
            }
            Err(err) => {
                warn!(resource = R::NAME, ?operation, error = %err, "List fetch failed");
                tracking.last_failed = Some(operation);
                self.state.send_modify(|state| {
                    state.status = ListStatus::Error;
                    state.error = Some(err.user_message());
                });
                LoadOutcome::Failed
            }
        }
    }

    fn tracking(&self) -> MutexGuard<'_, Tracking<R>> {
        self.tracking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::models::{PageMeta, Patient, PatientStatus, Patients};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    fn patient(id: &str) -> Patient {
        serde_json::from_value(serde_json::json!({"id": id})).unwrap()
    }

    fn page(ids: &[&str], page: u32, total_pages: u32) -> ListPage<Patient> {
        ListPage {
            items: ids.iter().map(|id| patient(id)).collect(),
            meta: PageMeta {
                page,
                per_page: 2,
                total: (total_pages * 2) as u64,
                total_pages,
                sort: None,
                order: None,
            },
            summary: None,
        }
    }

    /// Hands out scripted results in order.
    struct Scripted(Mutex<VecDeque<ClientResult<ListPage<Patient>>>>);

    impl Scripted {
        fn new(results: Vec<ClientResult<ListPage<Patient>>>) -> Self {
            Self(Mutex::new(results.into()))
        }
    }

    #[async_trait]
    impl PageFetcher<Patients> for Scripted {
        async fn fetch_page(&self, _query: &ListQuery<Patients>) -> ClientResult<ListPage<Patient>> {
            self.0.lock().unwrap().pop_front().expect("unexpected fetch")
        }
    }

    fn server_error() -> ClientError {
        ClientError::from_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "")
    }

    #[tokio::test]
    async fn load_more_appends_until_last_page() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![
            Ok(page(&["a", "b"], 1, 2)),
            Ok(page(&["c"], 2, 2)),
        ]));

        assert_eq!(controller.load(ListQuery::new()).await, LoadOutcome::Applied);
        assert_eq!(controller.load_more().await, LoadOutcome::Applied);

        let state = controller.snapshot();
        let ids: Vec<&str> = state.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(!state.has_more());
        assert_eq!(controller.query().page(), 2);
        assert_eq!(controller.load_more().await, LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn load_more_before_first_load_is_ignored() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![]));
        assert_eq!(controller.load_more().await, LoadOutcome::Skipped);
        assert_eq!(controller.snapshot().status, ListStatus::Idle);
    }

    #[tokio::test]
    async fn failure_keeps_previous_rows_and_retry_recovers() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![
            Ok(page(&["a", "b"], 1, 3)),
            Err(server_error()),
            Ok(page(&["c", "d"], 2, 3)),
        ]));

        controller.load(ListQuery::new()).await;
        assert_eq!(controller.load_more().await, LoadOutcome::Failed);

        let state = controller.snapshot();
        assert_eq!(state.status, ListStatus::Error);
        assert!(state.error.as_deref().unwrap().contains("500"));
        assert_eq!(state.items().len(), 2);

        assert_eq!(controller.retry().await, LoadOutcome::Applied);
        let state = controller.snapshot();
        assert_eq!(state.status, ListStatus::Success);
        assert_eq!(state.error, None);
        assert_eq!(state.items().len(), 4);
    }

    #[tokio::test]
    async fn load_more_after_failed_filter_change_is_skipped() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![
            Ok(page(&["active-1"], 1, 3)),
            Err(server_error()),
            Ok(page(&["inactive-1"], 1, 2)),
        ]));

        controller
            .load(ListQuery::new().with_status(Some(PatientStatus::Active)))
            .await;
        let failed = controller
            .load(ListQuery::new().with_status(Some(PatientStatus::Inactive)))
            .await;
        assert_eq!(failed, LoadOutcome::Failed);
        assert!(controller.snapshot().has_more());

        assert_eq!(controller.load_more().await, LoadOutcome::Skipped);
        let state = controller.snapshot();
        assert_eq!(state.status, ListStatus::Error);
        let ids: Vec<&str> = state.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["active-1"]);

        assert_eq!(controller.retry().await, LoadOutcome::Applied);
        let ids: Vec<String> = controller
            .snapshot()
            .items()
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(ids, vec!["inactive-1".to_string()]);
        assert_eq!(controller.query().status(), Some(PatientStatus::Inactive));
    }

    #[tokio::test]
    async fn retry_without_failure_does_nothing() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![Ok(page(&["a"], 1, 1))]));
        controller.load(ListQuery::new()).await;
        assert_eq!(controller.retry().await, LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn load_always_requests_first_page() {
        let controller = ListController::<Patients, _>::new(Scripted::new(vec![Ok(page(&["a"], 1, 1))]));
        controller.load(ListQuery::new().with_page(5)).await;
        assert_eq!(controller.query().page(), 1);
    }
}
