// ── Bridge scheduler ──
//
// One per bridge. Runs one-shot jobs (activation, reachability checks,
// fire-and-forget commands) and the fixed-delay discovery timer. Every
// task is tracked so `shutdown()` can cancel and join them all.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Cheaply cloneable handle to the bridge's task set.
#[derive(Clone, Default)]
pub struct Scheduler {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// A repeating job started by [`Scheduler::schedule_with_fixed_delay`].
pub struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once [`shutdown()`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `job` once in the background. Dropped unfinished on shutdown.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            trace!("scheduler shut down, job dropped");
            return;
        }
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = job => {}
            }
        });
    }

    /// Run `job` after `initial_delay`, then again `delay` after each run
    /// completes.
    ///
    /// Cancellation is only observed between runs: a run that has started
    /// is allowed to finish.
    pub fn schedule_with_fixed_delay<F, Fut>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        mut job: F,
    ) -> ScheduledTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();

        let handle = self.tracker.spawn(async move {
            let mut wait = initial_delay;
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }
                job().await;
                wait = delay;
            }
            debug!("repeating job stopped");
        });

        ScheduledTask { cancel, handle }
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl ScheduledTask {
    /// Suppress future runs without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suppress future runs and wait for an in-progress run to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_runs_after_initial_delay() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let task = scheduler.schedule_with_fixed_delay(
            Duration::from_secs(5),
            Duration::from_secs(60),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        task.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_running_job_finish() {
        let scheduler = Scheduler::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);

        let task = scheduler.schedule_with_fixed_delay(
            Duration::ZERO,
            Duration::from_secs(60),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.stop().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_one_shot_jobs() {
        let scheduler = Scheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        scheduler.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.shutdown().await;
        assert!(scheduler.is_shut_down());

        let counter = Arc::clone(&ran);
        scheduler.spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
