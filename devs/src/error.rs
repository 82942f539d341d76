use crate::{EventKind, PortKind, Time};

/// Error type encompassing all simulation errors.
///
/// Construction errors signal a malformed model graph, synchronization errors signal a violated
/// DEVS timing contract, and resource errors come from the concurrency helpers. None of them is
/// meant to be retried: the run should be aborted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A coupling or lookup referenced a child that does not exist.
    #[error("model `{parent}` has no child named `{child}`")]
    NoSuchChild {
        /// Name of the coupled model.
        parent: String,
        /// Name of the missing child.
        child: String,
    },
    /// Two children of one coupled model share a name.
    #[error("model `{parent}` already has a child named `{child}`")]
    DuplicateChild {
        /// Name of the coupled model.
        parent: String,
        /// Name of the duplicated child.
        child: String,
    },
    /// A message or a coupling referenced a port that does not exist.
    #[error("model `{model}` has no port named `{port}`")]
    NoSuchPort {
        /// Name of the host model.
        model: String,
        /// Name of the missing port.
        port: String,
    },
    /// A port was used in the wrong direction, e.g., posting a value to an input port.
    #[error("port `{port}` of model `{model}` is not an {expected} port")]
    InvalidPortKind {
        /// Name of the host model.
        model: String,
        /// Name of the port.
        port: String,
        /// The kind of port that was required.
        expected: PortKind,
    },
    /// An output port already holds a value that has not been picked up yet.
    #[error("a message was already sent through port `{port}` of model `{model}`")]
    MessageAlreadySent {
        /// Name of the host model.
        model: String,
        /// Name of the port.
        port: String,
    },
    /// An internal coupling would connect a model to itself.
    #[error("model `{model}` cannot be coupled with itself")]
    FeedbackLoop {
        /// Name of the model.
        model: String,
    },
    /// The select function of a coupled model returned an index out of range.
    #[error("select function of `{model}` picked {index} out of {count} imminent children")]
    InvalidSelection {
        /// Name of the coupled model.
        model: String,
        /// Returned index.
        index: usize,
        /// Number of imminent children offered.
        count: usize,
    },
    /// An atomic model returned a negative (or NaN) time advance.
    #[error("model `{model}` returned an invalid time advance: {value}")]
    NegativeTimeAdvance {
        /// Path of the model.
        model: String,
        /// The returned value.
        value: Time,
    },
    /// An event carried a time that is not a valid simulation time.
    #[error("invalid simulation time: {0}")]
    InvalidTime(Time),
    /// An event that must occur exactly at `time_next` occurred at a different time.
    #[error("bad synchronisation in `{path}`: {event} event at {time}, expected at {time_next}")]
    BadSynchronisation {
        /// Path of the processor.
        path: String,
        /// Kind of the offending event.
        event: EventKind,
        /// Time of the offending event.
        time: Time,
        /// The only time at which the event is legal.
        time_next: Time,
    },
    /// An event occurred outside the `[time_last, time_next]` window of the processor.
    #[error("bad synchronisation in `{path}`: {event} event at {time} outside [{time_last}, {time_next}]")]
    OutsideWindow {
        /// Path of the processor.
        path: String,
        /// Kind of the offending event.
        event: EventKind,
        /// Time of the offending event.
        time: Time,
        /// Lower bound of the legal window.
        time_last: Time,
        /// Upper bound of the legal window.
        time_next: Time,
    },
    /// A coordinator expected an imminent child but its scheduler returned none.
    #[error("coordinator `{path}` has no imminent child at {time}")]
    NoImminentChild {
        /// Path of the coordinator.
        path: String,
        /// Time of the step.
        time: Time,
    },
    /// A rollback target precedes every saved snapshot.
    #[error("simulator `{path}` has no state saved at or before {time}")]
    MissingSnapshot {
        /// Path of the simulator.
        path: String,
        /// The rollback target.
        time: Time,
    },
    /// An event was dispatched to a processor running a strategy that does not handle it.
    #[error("{event} events are not supported by `{path}` under the {strategy} strategy")]
    UnsupportedEvent {
        /// Path of the processor.
        path: String,
        /// Kind of the event.
        event: EventKind,
        /// Name of the strategy.
        strategy: String,
    },
    /// A straggling input would require rolling back before the global virtual time.
    #[error("input at {time} arrived too late: global virtual time is already {gvt}")]
    StragglerBeforeGvt {
        /// Time of the straggler.
        time: Time,
        /// Current global virtual time.
        gvt: Time,
    },
    /// An external input was stamped before the current time of a non-optimistic simulation.
    #[error("input at {time} precedes the current simulation time {current}")]
    InputInThePast {
        /// Time of the input.
        time: Time,
        /// Current simulation time.
        current: Time,
    },
    /// Attempted to start a simulation that has already been started.
    #[error("simulation has already been started")]
    AlreadyStarted,
    /// Attempted to feed a simulation that has already reached its end.
    #[error("simulation has already finished")]
    Finished,
    /// Injected input targets a port the root model does not expose as an input.
    #[error("root model has no input port named `{0}`")]
    NotAnInputPort(String),
    /// Work was submitted to a thread pool that has been shut down.
    #[error("thread pool has been shut down")]
    PoolShutdown,
    /// A worker thread never returned the work it was given.
    #[error("a worker thread did not return its work")]
    WorkerLost,
    /// Attempted to reset a latch that still has pending participants.
    #[error("latch cannot be reset while {0} participants are pending")]
    LatchInUse(usize),
    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Configuration could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias using [`Error`](enum.Error.html).
pub type Result<T> = std::result::Result<T, Error>;
