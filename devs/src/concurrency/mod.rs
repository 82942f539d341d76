//! Threading building blocks for the parallel strategy.
//!
//! A [`ThreadPool`] runs jobs from a single queue on a variable number of workers, a [`Latch`]
//! lets a thread wait for a known number of participants, and a [`Dispatcher`] combines both to
//! run one batch of processor steps and collect the results in order.

mod dispatcher;
mod latch;
mod thread_pool;

pub use dispatcher::Dispatcher;
pub use latch::Latch;
pub use thread_pool::ThreadPool;
