// Bounded executor - elastic tokio worker pool with zero-capacity handoff
// reason: lets CommandRunner impose a hard deadline on work it cannot cancel
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use hostmon_core::port::ExecutionError;

/// Default number of workers kept alive while idle
pub const DEFAULT_CORE_WORKERS: usize = 5;

/// Default upper bound on concurrently live workers
pub const DEFAULT_MAX_WORKERS: usize = 200;

type Task = BoxFuture<'static, ()>;

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedExecutorConfig {
    pub core_workers: usize,
    pub max_workers: usize,
}

impl Default for BoundedExecutorConfig {
    fn default() -> Self {
        Self {
            core_workers: DEFAULT_CORE_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

struct PoolState {
    /// Parked workers, each waiting on its own handoff slot
    idle: Vec<oneshot::Sender<Task>>,
    live: usize,
    shutdown: bool,
}

struct Inner {
    config: BoundedExecutorConfig,
    state: Mutex<PoolState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker pool without a queue
///
/// A submitted task either lands on a parked worker or spawns a new one.
/// With `max_workers` live and none parked, submission fails with
/// `ResourceExhausted` instead of queuing. Workers above `core_workers`
/// retire as soon as their task ends.
#[derive(Clone)]
pub struct BoundedExecutor {
    inner: Arc<Inner>,
}

impl BoundedExecutor {
    pub fn new(config: BoundedExecutorConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        let config = BoundedExecutorConfig {
            core_workers: config.core_workers.min(max_workers),
            max_workers,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    live: 0,
                    shutdown: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> BoundedExecutorConfig {
        self.inner.config
    }

    /// Hand `task` to a worker
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `ExecutorShutdown` after `shutdown()`
    /// - `ResourceExhausted` when every worker is busy and the pool is full
    pub fn submit<F>(&self, task: F) -> Result<(), ExecutionError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut task: Task = task.boxed();

        loop {
            let mut state = self.inner.state();
            if state.shutdown {
                return Err(ExecutionError::ExecutorShutdown);
            }

            if let Some(slot) = state.idle.pop() {
                drop(state);
                match slot.send(task) {
                    Ok(()) => return Ok(()),
                    // Worker vanished between parking and handoff; try the next one
                    Err(returned) => {
                        task = returned;
                        continue;
                    }
                }
            }

            if state.live >= self.inner.config.max_workers {
                return Err(ExecutionError::ResourceExhausted {
                    max_workers: self.inner.config.max_workers,
                });
            }
            state.live += 1;
            let live = state.live;
            drop(state);

            debug!(live_workers = live, "Spawning executor worker");
            tokio::spawn(worker_loop(Arc::clone(&self.inner), task));
            return Ok(());
        }
    }

    /// Stop accepting work; parked workers exit, busy ones finish their task
    pub fn shutdown(&self) {
        let parked = {
            let mut state = self.inner.state();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.idle)
        };
        info!(parked_workers = parked.len(), "Bounded executor shutting down");
        drop(parked);
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.state().shutdown
    }

    /// Workers currently alive (busy or parked)
    pub fn live_workers(&self) -> usize {
        self.inner.state().live
    }

    /// Workers parked waiting for a task
    pub fn idle_workers(&self) -> usize {
        self.inner.state().idle.len()
    }
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(BoundedExecutorConfig::default())
    }
}

async fn worker_loop(inner: Arc<Inner>, first: Task) {
    let mut next = Some(first);

    while let Some(task) = next.take() {
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            error!(panic = %panic_message(panic.as_ref()), "Executor task panicked");
        }

        let slot = {
            let mut state = inner.state();
            if state.shutdown || state.live > inner.config.core_workers {
                state.live -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.idle.push(tx);
            rx
        };

        // Err: the executor dropped our slot on shutdown
        next = slot.await.ok();
    }

    inner.state().live -= 1;
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_submit_runs_task() {
        let executor = BoundedExecutor::default();
        let (tx, rx) = oneshot::channel();

        executor
            .submit(async move {
                let _ = tx.send(42);
            })
            .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_saturated_pool_rejects_instead_of_queuing() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 1,
            max_workers: 2,
        });
        let release = Arc::new(Notify::new());

        for _ in 0..2 {
            let release = Arc::clone(&release);
            executor
                .submit(async move { release.notified().await })
                .unwrap();
        }
        settle().await;

        let rejected = executor.submit(async {});
        assert_eq!(
            rejected,
            Err(ExecutionError::ResourceExhausted { max_workers: 2 })
        );

        release.notify_waiters();
        settle().await;
        assert!(executor.submit(async {}).is_ok());
    }

    #[tokio::test]
    async fn test_extra_workers_retire_and_core_workers_park() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 1,
            max_workers: 4,
        });
        let release = Arc::new(Notify::new());

        for _ in 0..3 {
            let release = Arc::clone(&release);
            executor
                .submit(async move { release.notified().await })
                .unwrap();
        }
        settle().await;
        assert_eq!(executor.live_workers(), 3);

        release.notify_waiters();
        settle().await;

        assert_eq!(executor.live_workers(), 1);
        assert_eq!(executor.idle_workers(), 1);
    }

    #[tokio::test]
    async fn test_parked_worker_is_reused() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 2,
            max_workers: 2,
        });

        executor.submit(async {}).unwrap();
        settle().await;
        assert_eq!(executor.idle_workers(), 1);

        executor.submit(async {}).unwrap();
        settle().await;
        assert_eq!(executor.live_workers(), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_kill_pool() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 1,
            max_workers: 1,
        });

        executor.submit(async { panic!("boom") }).unwrap();
        settle().await;

        let (tx, rx) = oneshot::channel();
        executor
            .submit(async move {
                let _ = tx.send(());
            })
            .unwrap();
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_and_releases_parked_workers() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 2,
            max_workers: 2,
        });
        executor.submit(async {}).unwrap();
        settle().await;
        assert_eq!(executor.idle_workers(), 1);

        executor.shutdown();
        settle().await;

        assert!(executor.is_shutdown());
        assert_eq!(executor.live_workers(), 0);
        assert_eq!(
            executor.submit(async {}),
            Err(ExecutionError::ExecutorShutdown)
        );
    }

    #[test]
    fn test_config_is_clamped() {
        let executor = BoundedExecutor::new(BoundedExecutorConfig {
            core_workers: 10,
            max_workers: 0,
        });
        assert_eq!(
            executor.config(),
            BoundedExecutorConfig {
                core_workers: 1,
                max_workers: 1
            }
        );
    }
}
