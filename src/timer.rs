use tokio::task::JoinHandle;

/// Owned handle to a spawned periodic task (ramp, report, keepalive).
///
/// `cancel` is idempotent and also runs on drop, so a timer can never outlive
/// the entity that owns it.
#[derive(Debug)]
pub struct PeriodicTask<T = ()> {
    handle: Option<JoinHandle<T>>,
}

impl<T> PeriodicTask<T> {
    pub fn new(handle: JoinHandle<T>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn idle() -> Self {
        Self { handle: None }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Aborts the task. Returns `true` only for the call that actually
    /// released the handle.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts the task and waits until it has actually stopped, so nothing
    /// it was doing can still land after this returns.
    pub async fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                let _ = handle.await;
                true
            }
            None => false,
        }
    }

    /// Hands over the join handle so the caller can await the task's result.
    pub fn into_inner(mut self) -> Option<JoinHandle<T>> {
        self.handle.take()
    }
}

impl<T> Drop for PeriodicTask<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
