use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot broadcast stop signal shared by every stage of a pipeline run.
///
/// The signal is a channel on which nothing is ever sent. Firing the token
/// drops the only sender, which disconnects the channel and wakes every
/// receiver at once. Because the receiver is a regular crossbeam channel it
/// can sit in the same `select!` as a stream receive or send, giving workers
/// an atomic "value OR cancellation OR closed" wait.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    cancelled: AtomicBool,
}

impl CancellationToken {
    /// Create a new, untriggered token
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(trigger)),
                signal,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Fire the signal. Returns `true` only for the call that fired it;
    /// later calls are no-ops.
    pub fn cancel(&self) -> bool {
        let trigger = self.inner.trigger.lock().take();
        match trigger {
            Some(sender) => {
                // Flag first so anyone woken by the disconnect sees it set.
                self.inner.cancelled.store(true, Ordering::SeqCst);
                drop(sender);
                tracing::debug!("cancellation signal fired");
                true
            }
            None => false,
        }
    }

    /// Check whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready (disconnected) once the token fires.
    ///
    /// Intended for `recv(token.signal()) -> _ => ...` arms of a
    /// `crossbeam::channel::select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Block until the token fires or `timeout` elapses.
    /// Returns `true` if the token fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_one_shot() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_signal() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(observer.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_timeout_without_cancel() {
        let token = CancellationToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_cancel_wakes_blocked_waiters() {
        let token = CancellationToken::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let token = token.clone();
                thread::spawn(move || token.wait_timeout(Duration::from_secs(5)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }
}
