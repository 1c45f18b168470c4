//! Startup barrier: a count of tasks registered but not yet launched.
//!
//! Components register how many tasks they are about to spawn, mark each
//! one launched right after spawning it, and the caller waits for the
//! count to reach zero. It tracks launch only, not readiness.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct StartupBarrier {
    pending: Arc<watch::Sender<usize>>,
}

impl StartupBarrier {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            pending: Arc::new(pending),
        }
    }

    /// Register `tasks` more tasks that must launch before the barrier opens
    pub fn add(&self, tasks: usize) {
        self.pending.send_modify(|pending| *pending += tasks);
    }

    /// Mark one registered task as launched
    pub fn done(&self) {
        self.pending
            .send_modify(|pending| *pending = pending.saturating_sub(1));
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every registered task has launched
    pub async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }
}

impl Default for StartupBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_when_empty() {
        StartupBarrier::new().wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_all_launched() {
        let barrier = StartupBarrier::new();
        barrier.add(2);

        let waiter = tokio::spawn({
            let barrier = barrier.clone();
            async move { barrier.wait().await }
        });

        barrier.done();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        assert_eq!(barrier.pending(), 1);

        barrier.done();
        waiter.await.unwrap();
        assert_eq!(barrier.pending(), 0);
    }
}
