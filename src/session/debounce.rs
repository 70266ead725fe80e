use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Runs the most recently scheduled action once `delay` has passed without a
/// newer one arriving. Only the waiting phase is cancellable: an action that
/// has started always runs to completion.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            tokio::spawn(action);
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drops the pending action, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match pending {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_run() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            debouncer.schedule(counting(&runs));
            sleep(Duration::from_millis(400)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_schedules_each_run() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counting(&runs));
        sleep(Duration::from_millis(1500)).await;
        debouncer.schedule(counting(&runs));
        sleep(Duration::from_millis(1500)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_waiting_action() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counting(&runs));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
