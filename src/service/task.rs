use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Resolves once the owning [Task] is stopped or dropped.
pub type StopSignal = oneshot::Receiver<Stop>;

#[derive(Debug, Clone, Copy)]
pub struct Stop;

/// A background task that can be cancelled through its handle.
///
/// The spawned future is expected to `select!` on the [StopSignal]. Dropping the handle
/// closes the channel, which stops the task too.
#[derive(Debug)]
pub struct Task {
    tx: oneshot::Sender<Stop>,
    handle: JoinHandle<()>,
}

impl Task {
    pub fn spawn<F>(f: impl FnOnce(StopSignal) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(f(rx));
        Self { tx, handle }
    }

    pub fn stop(self) {
        let _ = self.tx.send(Stop);
    }

    /// Stops the task and waits for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Stop);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn counting_task(counter: Arc<AtomicUsize>) -> Task {
        Task::spawn(|mut stop| async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => { counter.fetch_add(1, Ordering::SeqCst); }
                    _ = &mut stop => break,
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(counter.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        task.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        drop(counting_task(counter.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
