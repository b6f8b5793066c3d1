use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Everything a stage needs at activation time: the run's cancellation token
/// and a registry for the worker threads it spawns.
///
/// Clones share the same token and registry, so one context describes one
/// pipeline run.
#[derive(Debug, Clone)]
pub struct StageContext {
    cancel: CancellationToken,
    workers: Arc<Mutex<Vec<(String, JoinHandle<()>)>>>,
}

impl StageContext {
    /// Create a context bound to `cancel`
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The run's cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start a worker thread and remember it for [`StageContext::join`]
    pub fn spawn<F>(&self, label: impl Into<String>, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let label = label.into();
        let handle = thread::spawn(work);
        self.workers.lock().push((label, handle));
    }

    /// Number of workers spawned and not yet joined
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Wait for every spawned worker to exit.
    ///
    /// All workers are joined even if one of them panicked; the first panic
    /// is reported.
    pub fn join(&self) -> Result<()> {
        let workers = std::mem::take(&mut *self.workers.lock());
        let mut first_error = None;

        for (label, handle) in workers {
            if handle.join().is_err() && first_error.is_none() {
                first_error = Some(PipelineError::WorkerPanicked(label));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_join_waits_for_workers() {
        let ctx = StageContext::new(CancellationToken::new());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            ctx.spawn("counter", move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(ctx.worker_count(), 3);

        ctx.join().unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        assert_eq!(ctx.worker_count(), 0);
    }

    #[test]
    fn test_join_reports_panicked_worker() {
        let ctx = StageContext::new(CancellationToken::new());
        ctx.spawn("ok", || {});
        ctx.spawn("broken", || panic!("worker failure"));

        match ctx.join() {
            Err(PipelineError::WorkerPanicked(label)) => assert_eq!(label, "broken"),
            other => panic!("unexpected join result: {:?}", other),
        }
    }
}
