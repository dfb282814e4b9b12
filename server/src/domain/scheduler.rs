//! Task Scheduler (C4): a bounded worker pool running one task per job.
//!
//! Concurrency is capped by a semaphore sized `WORKER_POOL_SIZE`; jobs
//! queue for a permit rather than the scheduler ever running more than
//! that many at once. `shutdown` cancels every outstanding task and, if
//! any haven't wound down within the grace period, force-fails their job.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Notify, Semaphore};

use crate::core::constants::{SCHEDULER_SHUTDOWN_GRACE_SECS, WORKER_POOL_SIZE};
use crate::domain::job::JobStore;

/// Cooperative cancellation signal handed to a running task. Checking it
/// is the task's own responsibility — the scheduler never kills a task
/// outright.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called (immediately if it already
    /// has been).
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

struct TaskHandle {
    cancel: CancelToken,
    done: Arc<AtomicBool>,
    done_notify: Arc<Notify>,
}

pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    tasks: Arc<DashMap<String, TaskHandle>>,
    job_store: Arc<JobStore>,
}

impl TaskScheduler {
    pub fn new(job_store: Arc<JobStore>) -> Self {
        Self::with_capacity(job_store, WORKER_POOL_SIZE)
    }

    pub fn with_capacity(job_store: Arc<JobStore>, capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            tasks: Arc::new(DashMap::new()),
            job_store,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Queue `entry` to run for `job_id`, waiting for a free worker slot.
    /// `entry` receives a `CancelToken` it should poll cooperatively.
    pub fn spawn<F, Fut>(&self, job_id: impl Into<String>, entry: F)
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = job_id.into();
        let cancel = CancelToken::new();
        let done = Arc::new(AtomicBool::new(false));
        let done_notify = Arc::new(Notify::new());

        self.tasks.insert(
            job_id.clone(),
            TaskHandle {
                cancel: cancel.clone(),
                done: done.clone(),
                done_notify: done_notify.clone(),
            },
        );

        let semaphore = self.semaphore.clone();
        let tasks = self.tasks.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("scheduler semaphore is never closed");
            entry(cancel).await;
            done.store(true, Ordering::SeqCst);
            done_notify.notify_waiters();
            tasks.remove(&job_id);
        });
    }

    /// Signal cancellation to a running task. A no-op if the task has
    /// already finished or never existed.
    pub fn cancel(&self, job_id: &str) {
        if let Some(entry) = self.tasks.get(job_id) {
            entry.cancel.cancel();
        }
    }

    /// Wait for a spawned task to finish. Returns immediately if the job
    /// was never spawned (already completed and evicted, or unknown).
    pub async fn await_done(&self, job_id: &str) {
        loop {
            let Some(entry) = self.tasks.get(job_id) else {
                return;
            };
            if entry.done.load(Ordering::SeqCst) {
                return;
            }
            let notify = entry.done_notify.clone();
            drop(entry);
            notify.notified().await;
        }
    }

    /// Cancel every outstanding task, wait up to the shutdown grace
    /// period, then force-fail any job still not terminal.
    pub async fn shutdown(&self) {
        self.shutdown_with_grace(Duration::from_secs(SCHEDULER_SHUTDOWN_GRACE_SECS))
            .await
    }

    async fn shutdown_with_grace(&self, grace: Duration) {
        let job_ids: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for id in &job_ids {
            self.cancel(id);
        }

        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if self.tasks.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let stragglers: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for id in stragglers {
            if let Err(e) = self.job_store.fail(&id, "shutdown").await {
                tracing::warn!(job_id = %id, error = %e, "failed to force-fail job during scheduler shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobType;
    use std::sync::atomic::AtomicUsize;
    use sqlx::SqlitePool;

    async fn test_scheduler() -> (TaskScheduler, Arc<JobStore>) {
        use sqlx::sqlite::SqlitePoolOptions;
        let pool: SqlitePool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        let job_store = Arc::new(JobStore::new(pool));
        (TaskScheduler::new(job_store.clone()), job_store)
    }

    #[tokio::test]
    async fn test_spawn_runs_and_await_done_returns() {
        let (scheduler, _store) = test_scheduler().await;
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        scheduler.spawn("job-1", move |_cancel| async move {
            r.store(true, Ordering::SeqCst);
        });
        scheduler.await_done("job-1").await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_signals_running_task() {
        let (scheduler, _store) = test_scheduler().await;
        let observed = Arc::new(AtomicBool::new(false));
        let o = observed.clone();
        scheduler.spawn("job-2", move |cancel| async move {
            cancel.cancelled().await;
            o.store(true, Ordering::SeqCst);
        });
        scheduler.cancel("job-2");
        scheduler.await_done("job-2").await;
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let (scheduler, job_store) = test_scheduler().await;
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            let job_id = format!("job-{i}");
            job_store
                .create(&job_id, JobType::AssistantResponse, None, &serde_json::json!({}))
                .await
                .unwrap();
            let c = concurrent.clone();
            let m = max_seen.clone();
            scheduler.spawn(job_id, move |_cancel| async move {
                let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                c.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(max_seen.load(Ordering::SeqCst) <= WORKER_POOL_SIZE);
    }

    #[tokio::test]
    async fn test_shutdown_force_fails_stuck_job() {
        let (scheduler, job_store) = test_scheduler().await;
        job_store
            .create("stuck", JobType::AssistantResponse, None, &serde_json::json!({}))
            .await
            .unwrap();
        scheduler.spawn("stuck", |cancel| async move {
            // Never observes cancellation; simulates a stuck task.
            loop {
                if cancel.is_cancelled() {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        scheduler.shutdown_with_grace(Duration::from_millis(50)).await;

        let job = job_store.get("stuck").await.unwrap();
        assert_eq!(job.status, crate::domain::job::JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("shutdown"));
    }
}
