use crate::error::{OverlayError, OverlayResult};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

struct PendingTrigger {
    id: u64,
    handle: AbortHandle,
}

/// Bookkeeping shared by every request of the pipeline: which logical requests
/// are in flight, and which debounced actions are waiting to fire.
///
/// Build one per process and share it with `Arc`.
#[derive(Default)]
pub struct RequestCoordinator {
    active: Mutex<HashSet<String>>,
    pending: Mutex<HashMap<String, PendingTrigger>>,
    next_trigger_id: AtomicU64,
}

/// Marks a request key as in flight until dropped.
pub struct RequestGuard<'a> {
    coordinator: &'a RequestCoordinator,
    key: String,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let mut active = self
            .coordinator
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        active.remove(&self.key);
    }
}

impl RequestCoordinator {
    pub fn new() -> Self {
        RequestCoordinator::default()
    }

    /// Register `key` as in flight, or `None` if it already is.
    pub fn try_begin(&self, key: &str) -> Option<RequestGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.insert(key.to_string()) {
            true => Some(RequestGuard {
                coordinator: self,
                key: key.to_string(),
            }),
            false => {
                debug!("Request {key} already in progress, skipping");
                None
            }
        }
    }

    /// Like [`RequestCoordinator::try_begin`], failing with [`OverlayError::InFlight`].
    pub fn begin(&self, key: &str) -> OverlayResult<RequestGuard<'_>> {
        self.try_begin(key)
            .ok_or_else(|| OverlayError::InFlight(key.to_string()))
    }

    pub fn is_active(&self, key: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.contains(key)
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn active_with_prefix(&self, prefix: &str) -> usize {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.iter().filter(|k| k.starts_with(prefix)).count()
    }

    pub fn pending_debounce_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run `action` once `delay` has passed without another trigger for `key`.
    ///
    /// A newer trigger cancels the pending one: its caller gets
    /// [`OverlayError::Superseded`] and only the last caller sees the result.
    /// Only work that has not started yet is cancelled.
    pub async fn debounce<F, Fut, T>(
        self: &Arc<Self>,
        key: &str,
        delay: Duration,
        action: F,
    ) -> OverlayResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OverlayResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.next_trigger_id.fetch_add(1, Ordering::Relaxed);

        // Registration happens under the lock the task needs before running,
        // so the task always finds its own entry unless it was superseded.
        let task = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = pending.remove(key) {
                debug!("Superseding pending trigger for {key}");
                previous.handle.abort();
            }

            let coordinator = self.clone();
            let task_key = key.to_string();
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let is_current = {
                    let mut pending = coordinator
                        .pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    match pending.get(&task_key) {
                        Some(trigger) if trigger.id == id => {
                            pending.remove(&task_key);
                            true
                        }
                        _ => false,
                    }
                };
                match is_current {
                    true => action().await,
                    false => Err(OverlayError::Superseded(task_key)),
                }
            });
            pending.insert(
                key.to_string(),
                PendingTrigger {
                    id,
                    handle: task.abort_handle(),
                },
            );
            task
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(OverlayError::Superseded(key.to_string())),
            Err(e) => Err(OverlayError::Scheduler(format!(
                "Debounced action for {key} failed: {e}"
            ))),
        }
    }
}
