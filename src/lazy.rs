//! Load-once values with a bounded load time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{ClientError, ClientResult};

/// Default bound on a single load.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// A value fetched on first use and cached until invalidated.
///
/// Concurrent callers share one in-flight load. A load that exceeds the
/// timeout fails with [`ClientError::Timeout`] and leaves nothing cached, so
/// the next call starts over.
pub struct LazyLoad<T> {
    slot: Mutex<Option<Arc<T>>>,
    timeout: Duration,
}

impl<T> LazyLoad<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_or_load<F, Fut>(&self, loader: F) -> ClientResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }

        let value = match tokio::time::timeout(self.timeout, loader()).await {
            Ok(result) => Arc::new(result?),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Lazy load timed out");
                return Err(ClientError::Timeout(self.timeout));
            }
        };
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    pub async fn cached(&self) -> Option<Arc<T>> {
        self.slot.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}

impl<T> Default for LazyLoad<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loads_once_until_invalidated() {
        let lazy = LazyLoad::<String>::default();
        let calls = &AtomicUsize::new(0);
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("dr. lee".to_string())
        };

        assert_eq!(*lazy.get_or_load(load).await.unwrap(), "dr. lee");
        assert_eq!(*lazy.get_or_load(load).await.unwrap(), "dr. lee");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        lazy.invalidate().await;
        lazy.get_or_load(load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_times_out_and_caches_nothing() {
        let lazy = LazyLoad::<u32>::new(Duration::from_secs(15));

        let err = lazy
            .get_or_load(|| async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok(1)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(lazy.cached().await.is_none());

        let value = lazy.get_or_load(|| async { Ok(2) }).await.unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let lazy = LazyLoad::<u32>::default();
        let err = lazy
            .get_or_load(|| async { Err(ClientError::NotAuthenticated) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(lazy.cached().await.is_none());
    }
}
