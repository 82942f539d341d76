//! Discrete-event simulation kernel following the DEVS formalism.
//!
//! A simulation is described as a tree of [`Model`]s: [`AtomicModel`]s at the leaves carry the
//! state and behavior (see [`AtomicBehavior`]), while [`CoupledModel`]s compose children and wire
//! their ports together with couplings. Before running, the model tree is turned into a matching
//! tree of [`Processor`]s, which implement the abstract simulator protocol: every coordinator keeps
//! a [`Scheduler`] over its children to find the imminent ones quickly.
//!
//! Three synchronization [`Strategy`] variants are supported:
//! - [`Strategy::Classic`] steps exactly one imminent model per coordinator and tick,
//! - [`Strategy::Parallel`] collects the outputs of all imminent models first and then steps every
//!   affected model exactly once,
//! - [`Strategy::TimeWarp`] behaves like the parallel one, but also saves snapshots after every
//!   transition so that the tree can be rolled back when a straggling input arrives.
//!
//! # Examples
//!
//! ```
//! # use devs::{AtomicBehavior, AtomicModel, CoupledModel, Message, Outbox, Simulation, SimulationConfig, Time, INFINITY};
//! #[derive(Debug, Clone)]
//! struct Ticker {
//!     sigma: Time,
//! }
//!
//! impl AtomicBehavior<u32> for Ticker {
//!     fn internal_transition(&mut self) {
//!         self.sigma = 5.0;
//!     }
//!     fn output(&self, outbox: &mut Outbox<'_, u32>) -> devs::Result<()> {
//!         outbox.post("out", 1)
//!     }
//!     fn time_advance(&self) -> Time {
//!         self.sigma
//!     }
//! }
//!
//! #[derive(Debug, Clone, Default)]
//! struct Counter {
//!     received: u32,
//! }
//!
//! impl AtomicBehavior<u32> for Counter {
//!     fn external_transition(&mut self, _elapsed: Time, messages: &[Message<u32>]) {
//!         self.received += messages.iter().map(Message::payload).sum::<u32>();
//!     }
//! }
//!
//! # fn main() -> devs::Result<()> {
//! let mut root = CoupledModel::new("root");
//! root.add_child(AtomicModel::new("ticker", Ticker { sigma: 0.0 }).with_output_port("out"))?;
//! root.add_child(AtomicModel::new("counter", Counter::default()))?;
//! root.add_internal_coupling("ticker", "counter", Some("out"), Some("in"))?;
//!
//! let mut simulation = Simulation::new(root, SimulationConfig::default().with_duration(20.0))?;
//! simulation.simulate()?;
//! let counter = simulation
//!     .processor()
//!     .find("counter")
//!     .and_then(|p| p.behavior::<Counter>())
//!     .unwrap();
//! assert_eq!(counter.received, 4);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
#![deny(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod time;
pub use time::{is_valid_time, Time, Timed, INFINITY};

mod port;
pub use port::{Port, PortKind};

mod message;
pub use message::Message;

mod coupling;
pub use coupling::{Coupling, CouplingKind, Couplings, PortRef};

mod model;
pub use model::{
    AtomicBehavior, AtomicModel, BehaviorObject, CoupledModel, Model, Outbox, Ports, SelectFn,
};

mod event;
pub use event::{Event, EventCounts, EventKind};

pub mod scheduler;
pub use scheduler::{Entry, Scheduler, SchedulerKind};

mod strategy;
pub use strategy::Strategy;

mod processor;
pub use processor::{Coordinator, Processor, ProcessorConfig, Simulator, Snapshot};

mod hooks;
pub use hooks::{Hook, Hooks, Notification};

pub mod concurrency;

mod config;
pub use config::{SimulationConfig, TimeWarpConfig};

mod simulation;
pub use simulation::{Simulation, Stats, Status, TOTAL};

pub mod logger;

/// Marker trait for message payloads.
///
/// Payloads travel between processors by value, get cloned when a single output fans out to
/// several destinations, and may be moved to worker threads by the parallel strategy.
pub trait Value: Clone + std::fmt::Debug + Send + 'static {}

impl<T> Value for T where T: Clone + std::fmt::Debug + Send + 'static {}
