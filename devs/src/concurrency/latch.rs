use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{Error, Result};

/// Countdown latch: threads block in [`Latch::wait`] until the count is released down to zero.
#[derive(Debug, Default)]
pub struct Latch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl Latch {
    /// Constructs a latch expecting `count` releases.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Number of releases still expected.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Decrements the count, waking all waiting threads when it reaches zero.
    ///
    /// Releasing a latch that is already at zero has no effect.
    pub fn release(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let count = self.lock();
        let _count = self
            .zero
            .wait_while(count, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the count reaches zero or `timeout` elapses. Returns `true` if the count
    /// reached zero.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let count = self.lock();
        let (count, _) = self
            .zero
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }

    /// Sets a new count to reuse the latch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LatchInUse`] if the current count has not reached zero.
    pub fn reset(&self, count: usize) -> Result<()> {
        let mut current = self.lock();
        if *current > 0 {
            return Err(Error::LatchInUse(*current));
        }
        *current = count;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a latch when dropped, also when the owning thread unwinds.
pub(crate) struct ReleaseGuard<'a>(pub &'a Latch);

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_wait_for_threads() {
        let latch = Arc::new(Latch::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || latch.release())
            })
            .collect();
        latch.wait();
        assert_eq!(latch.count(), 0);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_release_saturates() {
        let latch = Latch::new(1);
        latch.release();
        latch.release();
        assert_eq!(latch.count(), 0);
        latch.wait();
    }

    #[test]
    fn test_wait_timeout() {
        let latch = Latch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
        {
            let _guard = ReleaseGuard(&latch);
        }
        assert!(latch.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_reset() {
        let latch = Latch::new(2);
        assert!(matches!(latch.reset(1), Err(Error::LatchInUse(2))));
        latch.release();
        latch.release();
        assert!(latch.reset(4).is_ok());
        assert_eq!(latch.count(), 4);
    }
}
