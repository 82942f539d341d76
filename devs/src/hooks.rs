use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Time;

/// A point of the simulation lifecycle observers can subscribe to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// The run has finished and post-simulation callbacks have been invoked.
    PostSimulation,
    /// The model tree has been rolled back.
    Rollback,
    /// A root output has been withdrawn by a rollback.
    OutputCancelled,
}

/// Published to the subscribers of the corresponding [`Hook`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// See [`Hook::PostSimulation`].
    PostSimulation {
        /// Final simulation time.
        time: Time,
    },
    /// See [`Hook::Rollback`].
    Rollback {
        /// The time the tree was rolled back to.
        time: Time,
        /// The straggler time that caused the rollback.
        straggler: Time,
    },
    /// See [`Hook::OutputCancelled`].
    OutputCancelled {
        /// Time stamp of the withdrawn output.
        time: Time,
        /// Root output port of the withdrawn output.
        port: String,
    },
}

impl Notification {
    /// The hook this notification belongs to.
    #[must_use]
    pub fn hook(&self) -> Hook {
        match self {
            Self::PostSimulation { .. } => Hook::PostSimulation,
            Self::Rollback { .. } => Hook::Rollback,
            Self::OutputCancelled { .. } => Hook::OutputCancelled,
        }
    }
}

type Subscriber = Box<dyn FnMut(&Notification) + Send>;

/// Fans notifications out to the subscribers of each hook, in subscription order.
#[derive(Default)]
pub struct Hooks {
    subscribers: HashMap<Hook, Vec<Subscriber>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.subscribers.iter().map(|(h, s)| (h, s.len())))
            .finish()
    }
}

impl Hooks {
    /// Registers `subscriber` to be called for every notification of `hook`.
    pub fn subscribe<F>(&mut self, hook: Hook, subscriber: F)
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.subscribers
            .entry(hook)
            .or_default()
            .push(Box::new(subscriber));
    }

    /// Removes all subscribers of `hook`.
    pub fn unsubscribe_all(&mut self, hook: Hook) {
        self.subscribers.remove(&hook);
    }

    /// Number of subscribers of `hook`.
    #[must_use]
    pub fn count(&self, hook: Hook) -> usize {
        self.subscribers.get(&hook).map_or(0, Vec::len)
    }

    /// Calls every subscriber of the notification's hook.
    pub fn publish(&mut self, notification: &Notification) {
        if let Some(subscribers) = self.subscribers.get_mut(&notification.hook()) {
            for subscriber in subscribers {
                subscriber(notification);
            }
        }
    }
}
