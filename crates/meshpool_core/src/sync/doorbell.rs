//! Latched wake-up for an idle worker thread.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A latched wake-up.
///
/// `ring` is remembered until the next `wait_timeout` consumes it, so a ring
/// that lands while the worker is busy is never lost.
#[derive(Debug, Default)]
pub struct Doorbell {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl Doorbell {
    /// Creates a silent doorbell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the waiter, or latches the ring for its next wait.
    pub fn ring(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Sleeps until rung or until `timeout` elapses, then resets the latch.
    ///
    /// Returns true if the doorbell was rung.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if !*pending {
            self.condvar.wait_for(&mut pending, timeout);
        }
        std::mem::replace(&mut *pending, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_ring_is_latched() {
        let bell = Doorbell::new();
        bell.ring();
        assert!(bell.wait_timeout(Duration::from_secs(5)));
        assert!(!bell.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_ring_wakes_sleeper() {
        let bell = Arc::new(Doorbell::new());
        let ringer = {
            let bell = Arc::clone(&bell);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                bell.ring();
            })
        };

        let start = Instant::now();
        assert!(bell.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(5));
        ringer.join().unwrap();
    }
}
