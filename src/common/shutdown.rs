use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

/// One-shot termination signal shared between tasks.
///
/// Once `shutdown` is called the signal stays set; every current and future
/// `wait` resolves immediately.
#[derive(Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    terminated: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        if !self.inner.terminated.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Resolves once `shutdown` has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            loop {
                let notified = inner.notify.notified();
                tokio::pin!(notified);
                // register before checking the flag so a concurrent shutdown is not lost
                notified.as_mut().enable();
                if inner.terminated.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Shutdown;

    #[tokio::test]
    async fn test_wait_after_shutdown_resolves() {
        let shutdown = Shutdown::new();
        shutdown.shutdown();
        assert!(shutdown.is_terminated());
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_wakes_on_shutdown() {
        let shutdown = std::sync::Arc::new(Shutdown::new());
        let waiter = tokio::spawn(shutdown.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.shutdown();
        tokio::time::timeout(Duration::from_millis(100), waiter).await.unwrap().unwrap();
    }
}
