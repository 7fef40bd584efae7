//! Cancellable repeating task bound to the lifetime of its owner.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs a tick function on a fixed interval until it breaks, or until the
/// task is cancelled or dropped.
///
/// Ticks never overlap: the next tick starts only after the previous one
/// returned, and intervals missed meanwhile are skipped rather than
/// replayed. The first tick runs immediately.
pub struct PeriodicTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn on the current tokio runtime.
    ///
    /// The tick receives the task's cancellation token and must check it
    /// before mutating shared state after any await point.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let flow = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    flow = tick(cancelled.clone()) => flow,
                };

                if flow.is_break() {
                    debug!("{} finished", name);
                    break;
                }
            }
        });

        debug!("{} started ({:?} interval)", name, period);
        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Stop the task. No tick starts or mutates state afterwards.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the task to end on its own (tick returned `Break`) or
    /// through cancellation.
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if !self.token.is_cancelled() && !self.is_finished() {
            debug!("{} stopped by its owner", self.name);
        }
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval_until_break() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut task = PeriodicTask::spawn("counter", Duration::from_secs(5), move |_| {
            let seen = seen.clone();
            async move {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });

        task.finished().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let task = PeriodicTask::spawn("dropped", Duration::from_secs(5), move |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_secs(6)).await;
        let before = count.load(Ordering::SeqCst);
        assert_eq!(before, 2);

        drop(task);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_tick() {
        let finished_ticks = Arc::new(AtomicUsize::new(0));
        let seen = finished_ticks.clone();
        let mut task = PeriodicTask::spawn("slow", Duration::from_secs(1), move |_| {
            let seen = seen.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        task.cancel();
        task.finished().await;
        assert_eq!(finished_ticks.load(Ordering::SeqCst), 0);
    }
}
