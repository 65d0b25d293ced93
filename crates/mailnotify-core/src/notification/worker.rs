//! Single-threaded background worker.
//!
//! A [`Worker`] owns one OS thread running a current-thread tokio runtime.
//! Submitted jobs run strictly one after another in submission order, so
//! work submitted here never interleaves with other work submitted here.
//! Delayed submission ([`Worker::submit_after`]) is the timer the refresh
//! coordinator uses for its debounce window.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::{Error, Result};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

enum Command {
    Run(Job),
    Stop,
}

/// Handle to a dedicated worker thread.
///
/// Dropping the handle stops the worker after the jobs already queued.
pub struct Worker {
    name: String,
    tx: mpsc::UnboundedSender<Command>,
    handle: Handle,
    done: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Worker {
    /// Start a worker thread called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the thread cannot be created.
    pub fn spawn(name: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let (done_tx, done_rx) = oneshot::channel();

        let thread_name = name.to_string();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Worker {thread_name} started");
                runtime.block_on(async {
                    while let Some(command) = rx.recv().await {
                        match command {
                            Command::Run(job) => {
                                // A panicking job must not take the worker down.
                                if let Err(e) = tokio::spawn(job).await {
                                    error!("Job on worker {thread_name} failed: {e}");
                                }
                            }
                            Command::Stop => break,
                        }
                    }
                });
                // Closing the queue first makes later submits fail fast.
                drop(rx);
                // Dropping the runtime cancels pending timers and spawned tasks.
                drop(runtime);
                debug!("Worker {thread_name} stopped");
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            name: name.to_string(),
            tx,
            handle,
            done: Mutex::new(Some(done_rx)),
        })
    }

    /// Worker thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job to run after every job queued before it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerStopped`] if the worker has stopped.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx
            .send(Command::Run(Box::pin(job)))
            .map_err(|_| Error::WorkerStopped)
    }

    /// Queue a job once `delay` has elapsed.
    ///
    /// The delay runs on the worker's own runtime. If the worker stops
    /// before the delay elapses, the job is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerStopped`] if the worker has stopped.
    pub fn submit_after<F>(&self, delay: Duration, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.is_closed() {
            return Err(Error::WorkerStopped);
        }

        let tx = self.tx.clone();
        let job: Job = Box::pin(job);
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::Run(job));
        });
        Ok(())
    }

    /// Wait until every job submitted before this call has run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerStopped`] if the worker stops first.
    pub async fn wait_idle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            let _ = tx.send(());
        })?;
        rx.await.map_err(|_| Error::WorkerStopped)
    }

    /// Stop the worker after the jobs already queued and wait for the thread to exit.
    ///
    /// Timers that have not fired yet are dropped. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Stop);
        let done = self.done.lock().take();
        if let Some(done) = done {
            let _ = done.await;
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Stop);
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("stopped", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let worker = Worker::spawn("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            worker
                .submit(async move {
                    // Yield so a concurrent scheduler would get a chance to reorder.
                    tokio::task::yield_now().await;
                    seen.lock().push(i);
                })
                .unwrap();
        }
        worker.wait_idle().await.unwrap();

        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn jobs_run_on_the_worker_thread() {
        let worker = Worker::spawn("test-thread").unwrap();
        let (tx, rx) = oneshot::channel();

        worker
            .submit(async move {
                let name = std::thread::current().name().map(ToString::to_string);
                let _ = tx.send(name);
            })
            .unwrap();

        assert_eq!(rx.await.unwrap().as_deref(), Some("test-thread"));
    }

    #[tokio::test]
    async fn delayed_job_runs_after_delay() {
        let worker = Worker::spawn("test-delay").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        worker
            .submit_after(Duration::from_millis(100), async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        worker.wait_idle().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        worker.wait_idle().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_worker() {
        let worker = Worker::spawn("test-panic").unwrap();

        worker.submit(async { panic!("boom") }).unwrap();
        assert!(worker.wait_idle().await.is_ok());
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails() {
        let worker = Worker::spawn("test-stop").unwrap();
        worker.shutdown().await;

        assert!(matches!(worker.submit(async {}), Err(Error::WorkerStopped)));
        assert!(matches!(
            worker.submit_after(Duration::from_millis(1), async {}),
            Err(Error::WorkerStopped)
        ));
        worker.shutdown().await;
    }
}
