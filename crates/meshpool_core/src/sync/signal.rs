//! Waitable boolean flag.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A boolean flag that threads can block on.
///
/// `raise`/`clear` flip the flag and wake every waiter. Reads are a single
/// atomic load; the mutex is only taken to flip the flag or to park.
///
/// ## Usage
///
/// ```rust
/// use meshpool_core::Signal;
/// use std::sync::Arc;
/// use std::thread;
///
/// let uploading = Arc::new(Signal::new());
/// uploading.raise();
///
/// let worker = {
///     let uploading = Arc::clone(&uploading);
///     thread::spawn(move || uploading.clear())
/// };
///
/// uploading.wait_cleared();
/// worker.join().unwrap();
/// assert!(!uploading.is_raised());
/// ```
#[derive(Debug, Default)]
pub struct Signal {
    raised: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Signal {
    /// Creates a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Raises the flag. Returns false if it was already raised.
    pub fn raise(&self) -> bool {
        let _guard = self.mutex.lock();
        let was_raised = self.raised.swap(true, Ordering::AcqRel);
        self.condvar.notify_all();
        !was_raised
    }

    /// Lowers the flag and wakes everyone waiting for it to clear.
    pub fn clear(&self) {
        let _guard = self.mutex.lock();
        self.raised.store(false, Ordering::Release);
        self.condvar.notify_all();
    }

    /// Blocks until the flag is lowered.
    pub fn wait_cleared(&self) {
        self.wait_for_state(false, None);
    }

    /// Blocks until the flag is lowered or `timeout` elapses.
    ///
    /// Returns true if the flag is lowered on return.
    pub fn wait_cleared_timeout(&self, timeout: Duration) -> bool {
        self.wait_for_state(false, Some(timeout))
    }

    /// Blocks until the flag is raised or `timeout` elapses.
    ///
    /// Returns true if the flag is raised on return.
    pub fn wait_raised_timeout(&self, timeout: Duration) -> bool {
        self.wait_for_state(true, Some(timeout))
    }

    fn wait_for_state(&self, want: bool, timeout: Option<Duration>) -> bool {
        if self.raised.load(Ordering::Acquire) == want {
            return true;
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.mutex.lock();
        while self.raised.load(Ordering::Acquire) != want {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        return self.raised.load(Ordering::Acquire) == want;
                    }
                }
                None => self.condvar.wait(&mut guard),
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_raise_and_clear() {
        let signal = Signal::new();
        assert!(!signal.is_raised());
        assert!(signal.raise());
        assert!(!signal.raise());
        assert!(signal.is_raised());
        signal.clear();
        assert!(!signal.is_raised());
    }

    #[test]
    fn test_wait_cleared_returns_immediately_when_lowered() {
        let signal = Signal::new();
        assert!(signal.wait_cleared_timeout(Duration::from_millis(0)));
    }

    #[test]
    fn test_wait_cleared_times_out() {
        let signal = Signal::new();
        signal.raise();
        let start = Instant::now();
        assert!(!signal.wait_cleared_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_cleared_wakes_on_clear() {
        let signal = Arc::new(Signal::new());
        signal.raise();

        let clearer = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                signal.clear();
            })
        };

        assert!(signal.wait_cleared_timeout(Duration::from_secs(5)));
        clearer.join().unwrap();
    }

    #[test]
    fn test_wait_raised_wakes_on_raise() {
        let signal = Arc::new(Signal::new());

        let raiser = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                signal.raise();
            })
        };

        assert!(signal.wait_raised_timeout(Duration::from_secs(5)));
        raiser.join().unwrap();
    }
}
