use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Coalesces bursts of triggers into one deferred run: `schedule` cancels
/// any pending timer and arms a new one, so only the last trigger within a
/// quiet period fires. Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Mutex::new(None),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let quiet = self.quiet;
        *pending = Some(tokio::spawn(async move {
            sleep(quiet).await;
            task.await;
        }));
    }

    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn task_runs_after_the_quiet_period() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(599)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_cancels_the_pending_run() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&runs);
            debouncer.schedule(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_run() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
