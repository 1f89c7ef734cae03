use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shutdown flag observed by a scheduled task.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    #[inline]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested or the owning handle is gone.
    pub async fn triggered(&mut self) {
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}

/// Owner of a background polling task. Dropping the handle stops the timer;
/// work already in flight finishes but is not committed.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn spawn<F, Fut>(make_task: F) -> Self
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(make_task(ShutdownSignal(rx)));
        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Signal shutdown and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "polling task failed");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
