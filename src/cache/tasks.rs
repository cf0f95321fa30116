use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

struct Task {
    label: &'static str,
    fut: BoxFuture<'static, ()>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}

/// Bounded executor for fire-and-forget cache work.
///
/// Dependency registration, bulk write-backs, and recomputation all run
/// here: queued through a fixed-capacity channel and drained by a single
/// worker. When the queue is full the task is dropped with a warning;
/// all of this work is best-effort and a cold entry recomputes on the
/// next organic miss.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    tx: mpsc::Sender<Task>,
    pending: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    dropped: Arc<AtomicU64>,
}

impl BackgroundTasks {
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Task>(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(Notify::new());

        let worker_pending = Arc::clone(&pending);
        let worker_drained = Arc::clone(&drained);
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                debug!(task = task.label, "running background task");
                task.fut.await;
                worker_pending.fetch_sub(1, Ordering::AcqRel);
                worker_drained.notify_waiters();
            }
        });

        Self {
            tx,
            pending,
            drained,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue best-effort work; dropped with a warning when the queue is full
    pub fn spawn(&self, label: &'static str, fut: impl Future<Output = ()> + Send + 'static) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let task = Task {
            label,
            fut: Box::pin(fut),
        };
        if self.tx.try_send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(task = label, "background queue full, dropping task");
        }
    }

    /// Wait until every queued task has run. Used on shutdown, and by tests
    /// that need fire-and-forget work to have settled.
    pub async fn quiesce(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of tasks dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_work_runs_and_quiesces() {
        let tasks = BackgroundTasks::new(8);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            tasks.spawn("test", async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.quiesce().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(tasks.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_instead_of_blocking() {
        let tasks = BackgroundTasks::new(1);
        let gate = Arc::new(Notify::new());

        // Occupy the worker so further spawns pile up in the queue
        let held = Arc::clone(&gate);
        tasks.spawn("blocker", async move {
            held.notified().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tasks.spawn("filler", async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        gate.notify_one();
        tasks.quiesce().await;

        // One task fit in the queue; the rest were dropped
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.dropped(), 2);
    }
}
