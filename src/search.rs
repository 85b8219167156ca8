//! # Debounced Search
//!
//! Keystrokes go into [`SearchDebouncer::input`]; the value is committed only
//! once it has stayed unchanged for the whole window. [`SearchBinding`]
//! turns each commit into a query change, which resets pagination.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::query::{ListQuery, ListResource};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

pub struct SearchDebouncer {
    input: watch::Sender<String>,
    committed: watch::Receiver<String>,
    window: Duration,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl SearchDebouncer {
    pub fn spawn(window: Duration) -> Self {
        Self::with_initial(window, String::new())
    }

    /// Start with `initial` already committed (e.g. text restored from a URL).
    pub fn with_initial(window: Duration, initial: impl Into<String>) -> Self {
        let initial = initial.into();
        let (input, mut pending) = watch::channel(initial.clone());
        let (commit_tx, committed) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            'outer: loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = pending.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                // Restart the window on every keystroke until input settles.
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break 'outer,
                        _ = tokio::time::sleep(window) => break,
                        changed = pending.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }

                let value = pending.borrow_and_update().clone();
                let committed = commit_tx.send_if_modified(|current| {
                    if *current == value {
                        return false;
                    }
                    current.clone_from(&value);
                    true
                });
                if committed {
                    debug!(chars = value.chars().count(), "Search text committed");
                }
            }
        });

        Self {
            input,
            committed,
            window,
            cancel,
            _task: task,
        }
    }

    /// Record a keystroke; restarts the debounce window.
    pub fn input(&self, text: impl Into<String>) {
        self.input.send_replace(text.into());
    }

    /// The latest input has not been committed yet.
    pub fn is_pending(&self) -> bool {
        *self.input.borrow() != *self.committed.borrow()
    }

    pub fn committed(&self) -> watch::Receiver<String> {
        self.committed.clone()
    }

    pub fn committed_value(&self) -> String {
        self.committed.borrow().clone()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Copies committed search text into a list query.
pub struct SearchBinding {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl SearchBinding {
    pub fn spawn<R: ListResource>(
        mut committed: watch::Receiver<String>,
        queries: watch::Sender<ListQuery<R>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = committed.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let text = committed.borrow_and_update().clone();
                        queries.send_if_modified(|query| apply_search_text(query, &text));
                    }
                }
            }
        });

        Self {
            cancel,
            _task: task,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SearchBinding {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Set the query's text if it differs; returns whether it changed.
pub fn apply_search_text<R: ListResource>(query: &mut ListQuery<R>, text: &str) -> bool {
    let wanted = Some(text).filter(|t| !t.trim().is_empty());
    if query.text() == wanted {
        return false;
    }
    query.set_text(text);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patients;

    #[tokio::test(start_paused = true)]
    async fn commits_once_after_typing_stops() {
        let debouncer = SearchDebouncer::spawn(DEFAULT_DEBOUNCE);
        let mut committed = debouncer.committed();

        debouncer.input("S");
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.input("Sa");
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.input("Sarah");
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(debouncer.committed_value(), "");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(committed.has_changed().unwrap());
        assert_eq!(*committed.borrow_and_update(), "Sarah");
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn same_value_is_not_committed_twice() {
        let debouncer = SearchDebouncer::spawn(DEFAULT_DEBOUNCE);
        let mut committed = debouncer.committed();

        debouncer.input("Lee");
        tokio::time::sleep(Duration::from_millis(400)).await;
        committed.borrow_and_update();

        debouncer.input("Le");
        debouncer.input("Lee");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!committed.has_changed().unwrap());
    }

    #[test]
    fn search_text_change_resets_page() {
        let mut query = ListQuery::<Patients>::new().with_page(3);
        assert!(apply_search_text(&mut query, "Sarah"));
        assert_eq!(query.page(), 1);
        assert_eq!(query.text(), Some("Sarah"));

        let mut query = query.with_page(2);
        assert!(!apply_search_text(&mut query, "Sarah"));
        assert_eq!(query.page(), 2);

        assert!(apply_search_text(&mut query, "  "));
        assert_eq!(query.text(), None);
    }
}
