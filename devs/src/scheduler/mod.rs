//! Pending-event schedulers used by coordinators to find their imminent children.
//!
//! Every implementation satisfies the same contract (see [`Scheduler`]) and is selected at run
//! time with [`SchedulerKind`]. The choice only affects performance.
//!
//! The queues backing the schedulers ([`SplayTree`], [`CalendarQueue`], [`LadderQueue`]) are
//! generic and can be used on their own for anything implementing [`Timed`].

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{Time, Timed};

mod binary_heap;
mod calendar_queue;
mod ladder_queue;
mod minimal_list;
mod sorted_list;
mod splay_tree;

pub use binary_heap::BinaryHeapScheduler;
pub use calendar_queue::{CalendarQueue, CalendarQueueScheduler};
pub use ladder_queue::{LadderQueue, LadderQueueScheduler};
pub use minimal_list::MinimalListScheduler;
pub use sorted_list::SortedListScheduler;
pub use splay_tree::{SplayTree, SplayTreeScheduler};

/// A scheduled child: its position among the coordinator's children and its next activation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Time of the next activation.
    pub time: OrderedFloat<Time>,
    /// Index of the child in declaration order.
    pub id: usize,
}

impl Entry {
    /// Constructs a new entry.
    #[must_use]
    pub fn new(time: Time, id: usize) -> Self {
        Self {
            time: OrderedFloat(time),
            id,
        }
    }

    /// Time of the next activation.
    #[must_use]
    pub fn time(&self) -> Time {
        self.time.into_inner()
    }
}

impl Timed for Entry {
    fn time_next(&self) -> Time {
        self.time()
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entries are ordered by time first, and ties are broken by declaration order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Priority structure over the next activation times of children.
///
/// Only children with a finite activation time are expected to be scheduled.
pub trait Scheduler: std::fmt::Debug + Send {
    /// Adds an entry.
    fn schedule(&mut self, entry: Entry);

    /// Removes the given entry, returning it if it was scheduled.
    fn unschedule(&mut self, entry: Entry) -> Option<Entry>;

    /// The minimum scheduled time, or `None` if nothing is scheduled.
    fn read(&mut self) -> Option<Time>;

    /// Removes and returns all entries scheduled exactly at `time`.
    fn imminent(&mut self, time: Time) -> Vec<Entry>;

    /// Returns all entries scheduled exactly at `time` without removing them.
    fn read_imminent(&mut self, time: Time) -> Vec<Entry> {
        let imminent = self.imminent(time);
        for entry in &imminent {
            self.schedule(*entry);
        }
        imminent
    }

    /// Moves an entry to a new time. Nothing is scheduled if `time` is infinite.
    fn reschedule(&mut self, entry: Entry, time: Time) {
        self.unschedule(entry);
        if time.is_finite() {
            self.schedule(Entry::new(time, entry.id));
        }
    }

    /// Number of scheduled entries.
    fn len(&self) -> usize;

    /// Checks if nothing is scheduled.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Available scheduler implementations.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// See [`SortedListScheduler`].
    SortedList,
    /// See [`MinimalListScheduler`].
    MinimalList,
    /// See [`BinaryHeapScheduler`].
    BinaryHeap,
    /// See [`SplayTreeScheduler`].
    SplayTree,
    /// See [`CalendarQueueScheduler`].
    CalendarQueue,
    /// See [`LadderQueueScheduler`].
    LadderQueue,
}

impl Default for SchedulerKind {
    fn default() -> Self {
        Self::LadderQueue
    }
}

impl SchedulerKind {
    /// Builds an empty scheduler of this kind.
    #[must_use]
    pub fn build(self) -> Box<dyn Scheduler> {
        match self {
            Self::SortedList => Box::new(SortedListScheduler::default()),
            Self::MinimalList => Box::new(MinimalListScheduler::default()),
            Self::BinaryHeap => Box::new(BinaryHeapScheduler::default()),
            Self::SplayTree => Box::new(SplayTreeScheduler::default()),
            Self::CalendarQueue => Box::new(CalendarQueueScheduler::default()),
            Self::LadderQueue => Box::new(LadderQueueScheduler::default()),
        }
    }

    /// Builds a scheduler of this kind containing `entries`.
    #[must_use]
    pub fn build_with<I>(self, entries: I) -> Box<dyn Scheduler>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut scheduler = self.build();
        for entry in entries {
            scheduler.schedule(entry);
        }
        scheduler
    }
}
