use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{Message, Time};

/// Type of an event exchanged between processors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Initialization.
    Init,
    /// Output collection of the parallel strategies (`@`).
    Collect,
    /// Internal (`*`) step.
    Internal,
    /// Input delivery.
    Input,
    /// Output traveling upwards. Only counted, never dispatched.
    Output,
    /// Time-warp rollback.
    Rollback,
}

/// A timestamped event dispatched by a parent processor to one of its children.
///
/// Outputs travel upwards as return values of [`Processor::dispatch`](crate::Processor::dispatch)
/// rather than as events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<V> {
    /// Initialize at the given time.
    Init(Time),
    /// Collect outputs of all models imminent at the given time.
    Collect(Time),
    /// Perform the step at the given time.
    Internal(Time),
    /// Deliver a bag of messages at the given time.
    Input(Time, Vec<Message<V>>),
    /// Restore the state from before the given time.
    Rollback(Time),
}

impl<V> Event<V> {
    /// Time of the event.
    #[must_use]
    pub fn time(&self) -> Time {
        match self {
            Self::Init(time)
            | Self::Collect(time)
            | Self::Internal(time)
            | Self::Input(time, _)
            | Self::Rollback(time) => *time,
        }
    }

    /// Type of the event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Init(_) => EventKind::Init,
            Self::Collect(_) => EventKind::Collect,
            Self::Internal(_) => EventKind::Internal,
            Self::Input(..) => EventKind::Input,
            Self::Rollback(_) => EventKind::Rollback,
        }
    }
}

impl<V> fmt::Display for Event<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(time, bag) => write!(f, "input({}, {} messages)", time, bag.len()),
            event => write!(f, "{}({})", event.kind(), event.time()),
        }
    }
}

/// Number of events of each type handled by a processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts(BTreeMap<EventKind, usize>);

impl EventCounts {
    /// Counts one event of the given type.
    pub fn record(&mut self, kind: EventKind) {
        *self.0.entry(kind).or_default() += 1;
    }

    /// Number of events of the given type.
    #[must_use]
    pub fn get(&self, kind: EventKind) -> usize {
        self.0.get(&kind).copied().unwrap_or_default()
    }

    /// Total number of events of all types.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Iterates over non-zero counts ordered by event type.
    pub fn iter(&self) -> impl Iterator<Item = (EventKind, usize)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }
}

impl AddAssign<&EventCounts> for EventCounts {
    fn add_assign(&mut self, other: &EventCounts) {
        for (kind, count) in other.iter() {
            *self.0.entry(kind).or_default() += count;
        }
    }
}

impl fmt::Display for EventCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.iter()
                .map(|(kind, count)| format!("{}: {}", kind, count))
                .join(", ")
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counts() {
        let mut counts = EventCounts::default();
        counts.record(EventKind::Internal);
        counts.record(EventKind::Internal);
        counts.record(EventKind::Init);
        assert_eq!(counts.get(EventKind::Internal), 2);
        assert_eq!(counts.get(EventKind::Rollback), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.to_string(), "init: 1, internal: 2");

        let mut sum = EventCounts::default();
        sum += &counts;
        sum += &counts;
        assert_eq!(sum.get(EventKind::Internal), 4);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(Event::<()>::Internal(5.0).to_string(), "internal(5)");
        assert_eq!(
            Event::Input(2.5, vec![Message::new(1, "in")]).to_string(),
            "input(2.5, 1 messages)"
        );
    }
}
