//! Static structure of a simulation: atomic and coupled models.

use std::any::Any;
use std::fmt;

use crate::{Message, Result, Time, INFINITY};

mod ports;
pub use ports::Ports;

mod atomic;
pub use atomic::{AtomicModel, Outbox};

mod coupled;
pub(crate) use coupled::CoupledParts;
pub use coupled::{CoupledModel, SelectFn};

/// Behavior of an atomic model: its state together with the DEVS transition functions.
///
/// All methods have defaults describing a passive model that ignores its inputs, so an
/// implementation only overrides what it needs. The kernel calls these methods; it never inspects
/// the state behind them.
///
/// Implementors must be [`Clone`]: the time-warp strategy snapshots the whole behavior after every
/// transition (see [`BehaviorObject`]).
pub trait AtomicBehavior<V>: BehaviorObject<V> + fmt::Debug + Send {
    /// External transition (δext), invoked when `messages` arrive `elapsed` time units after the
    /// last transition.
    fn external_transition(&mut self, elapsed: Time, messages: &[Message<V>]) {
        let _ = (elapsed, messages);
    }

    /// Internal transition (δint), invoked when the time advance expires.
    fn internal_transition(&mut self) {}

    /// Confluent transition (δcon), invoked by the parallel strategies when inputs arrive at the
    /// same instant as an internal transition.
    ///
    /// Defaults to the internal transition followed by the external transition with zero elapsed
    /// time.
    fn confluent_transition(&mut self, messages: &[Message<V>]) {
        self.internal_transition();
        self.external_transition(0.0, messages);
    }

    /// Output function (λ), invoked right before an internal transition. Values are posted to
    /// output ports through `outbox`.
    ///
    /// # Errors
    ///
    /// Errors from [`Outbox::post`] should be propagated.
    fn output(&self, outbox: &mut Outbox<'_, V>) -> Result<()> {
        let _ = outbox;
        Ok(())
    }

    /// Time advance (ta): the time until the next internal transition, counted from the last
    /// transition. Must not be negative.
    fn time_advance(&self) -> Time {
        INFINITY
    }

    /// Invoked once on every atomic model when the simulation is finished.
    fn post_simulation(&mut self) {}
}

/// Object-safe helpers implemented for every [`Clone`] behavior.
///
/// This trait is implemented automatically and should not be implemented by hand.
pub trait BehaviorObject<V> {
    /// Clones the behavior into a new box.
    fn clone_box(&self) -> Box<dyn AtomicBehavior<V>>;
    /// Allows downcasting to the concrete behavior type.
    fn as_any(&self) -> &dyn Any;
}

impl<V, T> BehaviorObject<V> for T
where
    T: AtomicBehavior<V> + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn AtomicBehavior<V>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<V> Clone for Box<dyn AtomicBehavior<V>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A node of the model tree.
#[derive(Debug)]
pub enum Model<V> {
    /// Leaf model with behavior.
    Atomic(AtomicModel<V>),
    /// Composite model.
    Coupled(CoupledModel<V>),
}

impl<V> Model<V> {
    /// Name of the model.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Atomic(model) => model.name(),
            Self::Coupled(model) => model.name(),
        }
    }

    /// Name of the parent model, if the model has been added to one.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        match self {
            Self::Atomic(model) => model.parent(),
            Self::Coupled(model) => model.parent(),
        }
    }

    pub(crate) fn set_parent(&mut self, parent: &str) {
        match self {
            Self::Atomic(model) => model.set_parent(parent),
            Self::Coupled(model) => model.set_parent(parent),
        }
    }

    /// Ports of the model.
    #[must_use]
    pub fn ports(&self) -> &Ports<V> {
        match self {
            Self::Atomic(model) => model.ports(),
            Self::Coupled(model) => model.ports(),
        }
    }

    pub(crate) fn ports_mut(&mut self) -> &mut Ports<V> {
        match self {
            Self::Atomic(model) => model.ports_mut(),
            Self::Coupled(model) => model.ports_mut(),
        }
    }

    /// Checks if this is an atomic model.
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::Atomic(_))
    }
}

impl<V> From<AtomicModel<V>> for Model<V> {
    fn from(model: AtomicModel<V>) -> Self {
        Self::Atomic(model)
    }
}

impl<V> From<CoupledModel<V>> for Model<V> {
    fn from(model: CoupledModel<V>) -> Self {
        Self::Coupled(model)
    }
}
