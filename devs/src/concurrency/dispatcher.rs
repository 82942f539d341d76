use std::sync::Arc;

use crate::concurrency::latch::ReleaseGuard;
use crate::concurrency::{Latch, ThreadPool};
use crate::{Error, Result};

/// Runs batches of independent work items on a [`ThreadPool`] and waits for all of them.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<ThreadPool>,
}

impl Dispatcher {
    /// Constructs a dispatcher submitting work to `pool`.
    #[must_use]
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Applies `work` to every item on the pool, blocking until all are done, and returns the
    /// results in the order of `items`.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolShutdown`] if the pool no longer accepts work,
    /// - [`Error::WorkerLost`] if some item did not produce a result, e.g., because `work`
    ///   panicked.
    pub fn run_batch<T, R, F>(&self, items: Vec<T>, work: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let len = items.len();
        let latch = Arc::new(Latch::new(len));
        let work = Arc::new(work);
        let (sender, receiver) = crossbeam_channel::unbounded();
        for (index, item) in items.into_iter().enumerate() {
            let latch = Arc::clone(&latch);
            let work = Arc::clone(&work);
            let sender = sender.clone();
            self.pool.execute(move || {
                let _release = ReleaseGuard(&latch);
                let result = work(item);
                // The receiver outlives the latch wait.
                let _ = sender.send((index, result));
            })?;
        }
        drop(sender);
        latch.wait();
        let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(len).collect();
        for (index, result) in receiver.try_iter() {
            results[index] = Some(result);
        }
        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::WorkerLost)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_results_in_order() {
        let dispatcher = Dispatcher::new(Arc::new(ThreadPool::new(2, 4)));
        let results = dispatcher
            .run_batch((0..50).collect(), |n: u64| {
                std::thread::sleep(std::time::Duration::from_micros(50 - n));
                n * n
            })
            .unwrap();
        assert_eq!(results, (0..50).map(|n| n * n).collect::<Vec<_>>());
        assert!(dispatcher.run_batch(Vec::<u8>::new(), |n| n).unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_pool() {
        let pool = Arc::new(ThreadPool::new(1, 1));
        pool.shutdown();
        let dispatcher = Dispatcher::new(pool);
        assert!(matches!(
            dispatcher.run_batch(vec![1, 2], |n: i32| n),
            Err(Error::PoolShutdown)
        ));
    }
}
