use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{Error, Result};

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Task {
    Run(Job),
    Trim,
}

#[derive(Debug, Default)]
struct Workers {
    spawned: usize,
    trim_requests: usize,
    next_id: usize,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    min: usize,
    max: usize,
    keep_alive: Duration,
    workers: Mutex<Workers>,
    waiting: AtomicUsize,
    completed: AtomicUsize,
}

impl Shared {
    fn workers(&self) -> MutexGuard<'_, Workers> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the worker count when a worker exits, unless it already did so itself.
struct WorkerGuard<'a> {
    shared: &'a Shared,
    retired: bool,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if !self.retired {
            self.shared.workers().spawned -= 1;
        }
    }
}

fn worker_loop(shared: &Shared, receiver: &Receiver<Task>) {
    let mut guard = WorkerGuard {
        shared,
        retired: false,
    };
    loop {
        shared.waiting.fetch_add(1, Ordering::SeqCst);
        let task = receiver.recv_timeout(shared.keep_alive);
        shared.waiting.fetch_sub(1, Ordering::SeqCst);
        match task {
            Ok(Task::Run(job)) => {
                job();
                shared.completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Task::Trim) => {
                let mut workers = shared.workers();
                workers.trim_requests = workers.trim_requests.saturating_sub(1);
                workers.spawned -= 1;
                guard.retired = true;
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut workers = shared.workers();
                if workers.spawned - workers.trim_requests > shared.min {
                    workers.spawned -= 1;
                    guard.retired = true;
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Pool of worker threads consuming jobs from a single queue.
///
/// The pool keeps at least `min` workers alive and spawns new ones, up to `max`, when a job is
/// submitted while no worker is idle. Workers above the minimum exit after being idle for the
/// keep-alive duration, or when [trimmed](ThreadPool::trim).
///
/// Dropping the pool shuts it down: queued jobs still run, and all workers are joined.
#[derive(Debug)]
pub struct ThreadPool {
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    shut_down: AtomicBool,
}

impl ThreadPool {
    /// Constructs a pool with at least `min` and at most `max` workers.
    #[must_use]
    pub fn new(min: usize, max: usize) -> Self {
        Self::with_keep_alive(min, max, DEFAULT_KEEP_ALIVE)
    }

    /// Constructs a pool whose idle workers above `min` exit after `keep_alive`.
    #[must_use]
    pub fn with_keep_alive(min: usize, max: usize, keep_alive: Duration) -> Self {
        let max = max.max(min).max(1);
        let (sender, receiver) = crossbeam_channel::unbounded();
        let pool = Self {
            shared: Arc::new(Shared {
                min,
                max,
                keep_alive,
                workers: Mutex::new(Workers::default()),
                waiting: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            }),
            sender: Mutex::new(Some(sender)),
            receiver,
            shut_down: AtomicBool::new(false),
        };
        {
            let mut workers = pool.shared.workers();
            for _ in 0..min {
                pool.spawn_worker(&mut workers);
            }
        }
        pool
    }

    /// Queues a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolShutdown`] if the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(Error::PoolShutdown)?;
        sender
            .send(Task::Run(Box::new(job)))
            .map_err(|_| Error::PoolShutdown)?;
        let mut workers = self.shared.workers();
        if self.shared.waiting.load(Ordering::SeqCst) == 0 && workers.spawned < self.shared.max {
            self.spawn_worker(&mut workers);
        }
        Ok(())
    }

    /// Asks one worker to exit if there are more than the minimum.
    ///
    /// Without `force`, the request is only made when some worker is idle.
    pub fn trim(&self, force: bool) {
        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return;
        };
        let mut workers = self.shared.workers();
        let idle = self.shared.waiting.load(Ordering::SeqCst) > 0;
        if (force || idle) && workers.spawned - workers.trim_requests > self.shared.min {
            workers.trim_requests += 1;
            if sender.send(Task::Trim).is_err() {
                workers.trim_requests -= 1;
            }
        }
    }

    /// Stops accepting jobs, lets the workers finish the queued ones, and joins them.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handles = std::mem::take(&mut self.shared.workers().handles);
        for handle in handles {
            if handle.join().is_err() {
                log::error!("a worker thread panicked");
            }
        }
        log::debug!(
            "thread pool shut down after completing {} jobs",
            self.completed()
        );
    }

    /// Checks if the pool has been shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Number of live workers.
    #[must_use]
    pub fn spawned(&self) -> usize {
        self.shared.workers().spawned
    }

    /// Number of idle workers.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.shared.waiting.load(Ordering::SeqCst)
    }

    /// Number of jobs completed so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Number of queued jobs not yet picked up by a worker.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.receiver.len()
    }

    /// Minimum number of workers.
    #[must_use]
    pub fn min_size(&self) -> usize {
        self.shared.min
    }

    /// Maximum number of workers.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.shared.max
    }

    fn spawn_worker(&self, workers: &mut Workers) {
        let id = workers.next_id;
        let shared = Arc::clone(&self.shared);
        let receiver = self.receiver.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("devs-worker-{}", id))
            .spawn(move || worker_loop(&shared, &receiver));
        match spawned {
            Ok(handle) => {
                workers.next_id += 1;
                workers.spawned += 1;
                workers.handles.retain(|h| !h.is_finished());
                workers.handles.push(handle);
            }
            Err(err) => log::error!("failed to spawn worker thread: {}", err),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
