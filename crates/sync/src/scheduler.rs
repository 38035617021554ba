//! Bounded write dispatch.

use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tracing::error;

/// Runs background tasks with at most `limit` in flight.
///
/// This is admission control, not a queue: [`submit`](Self::submit) waits
/// until a slot is free before spawning. Tasks report their own failures; a
/// task that panics is logged when reaped and frees its slot like any other.
#[derive(Debug)]
pub struct WriteScheduler {
    tasks: JoinSet<()>,
    limit: usize,
}

impl WriteScheduler {
    /// Create a scheduler. A `limit` of 0 is treated as 1.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            limit: limit.max(1),
        }
    }

    /// Maximum number of tasks in flight.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Spawn `task` once fewer than `limit` tasks are running.
    pub async fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reap_finished();
        while self.tasks.len() >= self.limit {
            if let Some(result) = self.tasks.join_next().await {
                log_join(result);
            }
        }
        self.tasks.spawn(task);
    }

    /// Number of tasks that have not been reaped yet.
    pub fn in_flight(&mut self) -> usize {
        self.reap_finished();
        self.tasks.len()
    }

    /// Wait for every submitted task to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join(result);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join(result);
        }
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Write task panicked");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;

    #[tokio::test]
    async fn test_never_more_than_limit_in_flight() {
        let mut scheduler = WriteScheduler::new(4);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            scheduler
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        scheduler.drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_submit_waits_when_full() {
        let mut scheduler = WriteScheduler::new(4);
        let gate = Arc::new(Semaphore::new(0));

        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            scheduler
                .submit(async move {
                    let _permit = gate.acquire().await;
                })
                .await;
        }
        assert_eq!(scheduler.in_flight(), 4);

        let fifth = tokio::time::timeout(Duration::from_millis(50), scheduler.submit(async {})).await;
        assert!(fifth.is_err(), "fifth submit should wait for a free slot");

        gate.add_permits(4);
        scheduler.drain().await;
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_frees_its_slot() {
        let mut scheduler = WriteScheduler::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        scheduler
            .submit(async {
                panic!("write blew up");
            })
            .await;

        let counter = Arc::clone(&done);
        scheduler
            .submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        scheduler.drain().await;

        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
