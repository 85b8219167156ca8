use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::controller::ListController;
use super::fetcher::PageFetcher;
use crate::query::{ListQuery, ListResource};

/// Background task that calls [`ListController::load`] whenever the watched
/// query changes to a new value.
///
/// A query change that arrives while a load is in flight drops that load
/// before starting the next one. The task stops on [`cancel`](Self::cancel),
/// on drop, or when the query sender goes away.
pub struct QueryEffect {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl QueryEffect {
    pub fn spawn<R, F>(
        controller: Arc<ListController<R, F>>,
        mut queries: watch::Receiver<ListQuery<R>>,
    ) -> Self
    where
        R: ListResource,
        F: PageFetcher<R> + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut last: Option<ListQuery<R>> = None;
            loop {
                let query = queries.borrow_and_update().clone();
                if last.as_ref() != Some(&query) {
                    last = Some(query.clone());
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = controller.load(query) => {}
                        changed = queries.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            continue;
                        }
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = queries.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(resource = R::NAME, "Query effect stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for QueryEffect {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
