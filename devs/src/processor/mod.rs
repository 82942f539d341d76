//! Processors: the abstract simulators driving the model tree.
//!
//! Every atomic model is wrapped in a [`Simulator`], and every coupled model in a [`Coordinator`]
//! owning the processors of its children. A parent drives a child by dispatching an [`Event`];
//! outputs leaving the child travel back as the return value of [`Processor::dispatch`].

use std::collections::BTreeMap;

use crate::concurrency::Dispatcher;
use crate::{
    Error, Event, EventCounts, EventKind, Message, Model, Result, SchedulerKind, Strategy, Time,
    Value, INFINITY,
};

mod coordinator;
pub use coordinator::Coordinator;

mod simulator;
pub use simulator::{Simulator, Snapshot};

/// Settings shared by all processors of one tree.
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    /// Synchronization strategy.
    pub strategy: Strategy,
    /// Scheduler used by coordinators.
    pub scheduler: SchedulerKind,
    /// Runs atomic children concurrently under the parallel strategies, if present.
    pub dispatcher: Option<Dispatcher>,
}

impl ProcessorConfig {
    /// Constructs a configuration without a dispatcher.
    #[must_use]
    pub fn new(strategy: Strategy, scheduler: SchedulerKind) -> Self {
        Self {
            strategy,
            scheduler,
            dispatcher: None,
        }
    }

    /// Sets the dispatcher used to step atomic children concurrently.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

/// A node of the processor tree.
#[derive(Debug)]
pub enum Processor<V> {
    /// Processor of an atomic model.
    Simulator(Simulator<V>),
    /// Processor of a coupled model.
    Coordinator(Coordinator<V>),
}

impl<V: Value> Processor<V> {
    /// Builds the processor tree of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchChild`] if a coupling references an unknown child.
    pub fn new(model: Model<V>, config: &ProcessorConfig) -> Result<Self> {
        Self::build(model, None, config)
    }

    pub(crate) fn build(
        model: Model<V>,
        parent_path: Option<&str>,
        config: &ProcessorConfig,
    ) -> Result<Self> {
        let path = parent_path.map_or_else(
            || model.name().to_string(),
            |parent| format!("{}/{}", parent, model.name()),
        );
        match model {
            Model::Atomic(model) => Ok(Self::Simulator(Simulator::new(
                model,
                path,
                config.strategy,
            ))),
            Model::Coupled(model) => Ok(Self::Coordinator(Coordinator::new(
                model.into_parts(),
                path,
                config,
            )?)),
        }
    }

    /// Handles an event and returns the messages leaving the processor's model.
    ///
    /// # Errors
    ///
    /// Returns a synchronization error if the event violates the timing contract of the
    /// processor, and propagates errors raised by model callbacks.
    pub fn dispatch(&mut self, event: Event<V>) -> Result<Vec<Message<V>>> {
        match self {
            Self::Simulator(simulator) => simulator.dispatch(event),
            Self::Coordinator(coordinator) => coordinator.dispatch(event),
        }
    }

    /// Invokes the post-simulation callback of every atomic model in the tree.
    pub fn post_simulation(&mut self) {
        match self {
            Self::Simulator(simulator) => simulator.post_simulation(),
            Self::Coordinator(coordinator) => coordinator.post_simulation(),
        }
    }

    /// Discards saved snapshots no longer reachable by a rollback past `gvt`, returning how
    /// many were discarded.
    pub fn fossil_collection(&mut self, gvt: Time) -> usize {
        match self {
            Self::Simulator(simulator) => simulator.fossil_collection(gvt),
            Self::Coordinator(coordinator) => coordinator.fossil_collection(gvt),
        }
    }
}

impl<V> Processor<V> {
    /// Name of the processed model.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simulator(simulator) => simulator.name(),
            Self::Coordinator(coordinator) => coordinator.name(),
        }
    }

    /// Slash-separated names of the models from the root down to this one.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Simulator(simulator) => simulator.path(),
            Self::Coordinator(coordinator) => coordinator.path(),
        }
    }

    /// Time of the last transition.
    #[must_use]
    pub fn time_last(&self) -> Time {
        match self {
            Self::Simulator(simulator) => simulator.time_last(),
            Self::Coordinator(coordinator) => coordinator.time_last(),
        }
    }

    /// Time of the next scheduled transition.
    #[must_use]
    pub fn time_next(&self) -> Time {
        match self {
            Self::Simulator(simulator) => simulator.time_next(),
            Self::Coordinator(coordinator) => coordinator.time_next(),
        }
    }

    /// Events handled by this processor alone.
    #[must_use]
    pub fn counts(&self) -> &EventCounts {
        match self {
            Self::Simulator(simulator) => simulator.counts(),
            Self::Coordinator(coordinator) => coordinator.counts(),
        }
    }

    /// Events handled by this processor and all of its descendants.
    #[must_use]
    pub fn total_counts(&self) -> EventCounts {
        let mut total = self.counts().clone();
        for child in self.children() {
            total += &child.total_counts();
        }
        total
    }

    /// Event counts of every processor in the tree, keyed by path.
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, EventCounts> {
        let mut stats = BTreeMap::new();
        self.collect_stats(&mut stats);
        stats
    }

    fn collect_stats(&self, stats: &mut BTreeMap<String, EventCounts>) {
        stats.insert(self.path().to_string(), self.counts().clone());
        for child in self.children() {
            child.collect_stats(stats);
        }
    }

    /// Child processors; empty for a simulator.
    #[must_use]
    pub fn children(&self) -> &[Processor<V>] {
        match self {
            Self::Simulator(_) => &[],
            Self::Coordinator(coordinator) => coordinator.children(),
        }
    }

    /// Finds a descendant by its path relative to this processor, e.g., `sub/model`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Processor<V>> {
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let child = self.children().iter().find(|c| c.name() == head)?;
        match rest {
            Some(rest) => child.find(rest),
            None => Some(child),
        }
    }

    /// The behavior of the atomic model, if this is a simulator of a model with behavior `T`.
    #[must_use]
    pub fn behavior<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Simulator(simulator) => simulator.model().behavior().as_any().downcast_ref(),
            Self::Coordinator(_) => None,
        }
    }

    /// Checks the timing invariants of the whole tree: `time_last <= time_next` everywhere, and
    /// the `time_next` of every coordinator equals the minimum over its children.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        if self.time_last() > self.time_next() {
            return false;
        }
        match self {
            Self::Simulator(_) => true,
            Self::Coordinator(coordinator) => {
                let children = coordinator.children();
                let min = children
                    .iter()
                    .map(Processor::time_next)
                    .fold(INFINITY, Time::min);
                (children.is_empty() || min == coordinator.time_next())
                    && children.iter().all(Processor::invariants_hold)
            }
        }
    }

    /// Returns the simulator if this is one.
    #[must_use]
    pub fn as_simulator(&self) -> Option<&Simulator<V>> {
        match self {
            Self::Simulator(simulator) => Some(simulator),
            Self::Coordinator(_) => None,
        }
    }

    /// Returns the coordinator if this is one.
    #[must_use]
    pub fn as_coordinator(&self) -> Option<&Coordinator<V>> {
        match self {
            Self::Simulator(_) => None,
            Self::Coordinator(coordinator) => Some(coordinator),
        }
    }
}

/// Fails unless `time` is exactly `time_next`.
fn ensure_imminent(
    path: &str,
    event: EventKind,
    time: Time,
    time_next: Time,
) -> Result<()> {
    if time == time_next {
        Ok(())
    } else {
        Err(Error::BadSynchronisation {
            path: path.to_string(),
            event,
            time,
            time_next,
        })
    }
}

/// Fails unless `time` lies in `[time_last, time_next]`.
fn ensure_within(
    path: &str,
    event: EventKind,
    time: Time,
    time_last: Time,
    time_next: Time,
) -> Result<()> {
    if time_last <= time && time <= time_next {
        Ok(())
    } else {
        Err(Error::OutsideWindow {
            path: path.to_string(),
            event,
            time,
            time_last,
            time_next,
        })
    }
}

fn unsupported(path: &str, event: EventKind, strategy: Strategy) -> Error {
    Error::UnsupportedEvent {
        path: path.to_string(),
        event,
        strategy: strategy.to_string(),
    }
}
