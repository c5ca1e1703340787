use std::{cell::RefCell, rc::Rc, time::Duration};
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A single-shot timer that can be re-armed or cancelled.
///
/// Runs as a local task, so it must be created inside a `LocalSet`. Setting it
/// again replaces the pending callback.
#[derive(Clone, Debug, Default)]
pub struct Timeout {
    handle: Rc<RefCell<Option<AbortHandle>>>,
}

impl Timeout {
    pub fn set<F>(&self, duration: Duration, callback: F)
    where
        F: FnOnce() + 'static,
    {
        let deadline = Instant::now() + duration;

        if let Ok(mut handle) = self.handle.try_borrow_mut() {
            if let Some(existing) = handle.take() {
                existing.abort();
            }

            let task = tokio::task::spawn_local({
                let handle = self.handle.clone();
                async move {
                    tokio::time::sleep_until(deadline).await;

                    // Clear first so the callback may re-arm or cancel us.
                    handle.borrow_mut().take();
                    callback();
                }
            });

            *handle = Some(task.abort_handle());
        }
    }

    /// Returns whether a pending callback was cancelled.
    pub fn cancel(&self) -> bool {
        match self.handle.borrow_mut().take() {
            Some(handle) => {
                handle.abort();
                true
            },

            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.handle.borrow().is_some()
    }
}
