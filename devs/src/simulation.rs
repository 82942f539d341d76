//! The root driver: runs the processor tree through simulated time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;

use crate::concurrency::{Dispatcher, ThreadPool};
use crate::{
    is_valid_time, CoupledModel, Error, Event, EventCounts, Hook, Hooks, Message, Model,
    Notification, PortKind, Processor, ProcessorConfig, Result, SimulationConfig, Strategy, Time,
    Value, INFINITY,
};

/// Key of the aggregated row in [`Stats`].
pub const TOTAL: &str = "TOTAL";

/// Event counts keyed by processor path, with an extra [`TOTAL`] row.
pub type Stats = BTreeMap<String, EventCounts>;

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    /// Not initialized yet.
    Waiting,
    /// Initialized and processing ticks.
    Running,
    /// Reached the end of the simulated time.
    Done,
}

/// Drives a model tree from time 0 until the configured duration.
///
/// Each step processes one tick: the earliest of the root's next internal event and the earliest
/// injected input. Under [`Strategy::TimeWarp`], injecting an input stamped at or before an
/// already processed tick rolls the whole tree back and withdraws the outputs it produced since.
pub struct Simulation<V> {
    root: Processor<V>,
    config: SimulationConfig,
    status: Status,
    time: Time,
    pending: BTreeMap<OrderedFloat<Time>, Vec<Message<V>>>,
    consumed: Vec<(Time, Vec<Message<V>>)>,
    outputs: Vec<(Time, Message<V>)>,
    ticks: Vec<Time>,
    ticks_since_fossil: usize,
    gvt: Time,
    hooks: Hooks,
    started: Option<Instant>,
    finished: Option<Duration>,
}

impl<V: Value> Simulation<V> {
    /// Builds the processor tree of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration fails validation, or any error of
    /// [`Processor::new`].
    pub fn new(model: CoupledModel<V>, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut processor_config = ProcessorConfig::new(config.strategy, config.scheduler);
        if config.workers > 1 && config.strategy.uses_bags() {
            let pool = Arc::new(ThreadPool::new(1, config.workers));
            processor_config = processor_config.with_dispatcher(Dispatcher::new(pool));
        }
        let root = Processor::new(Model::from(model), &processor_config)?;
        Ok(Self {
            root,
            config,
            status: Status::Waiting,
            time: 0.0,
            pending: BTreeMap::new(),
            consumed: Vec::new(),
            outputs: Vec::new(),
            ticks: Vec::new(),
            ticks_since_fossil: 0,
            gvt: 0.0,
            hooks: Hooks::default(),
            started: None,
            finished: None,
        })
    }

    /// Runs the simulation until the configured duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the simulation has been stepped or run before, and
    /// propagates any error raised while processing a tick.
    pub fn simulate(&mut self) -> Result<()> {
        if self.status != Status::Waiting {
            return Err(Error::AlreadyStarted);
        }
        while self.step()?.is_some() {}
        Ok(())
    }

    /// Processes one tick, initializing the tree first if needed.
    ///
    /// Returns the time of the processed tick, or `None` once the end of the simulation has been
    /// reached.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by the processors.
    pub fn step(&mut self) -> Result<Option<Time>> {
        match self.status {
            Status::Waiting => self.start()?,
            Status::Running => {}
            Status::Done => return Ok(None),
        }
        let time = self.next_time();
        if time >= self.config.duration {
            self.finish();
            return Ok(None);
        }
        self.tick(time)?;
        Ok(Some(time))
    }

    /// Queues `payload` for input port `port` of the root model at `time`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTime`] if `time` is negative or not finite,
    /// - [`Error::Finished`] if the simulation is done,
    /// - [`Error::NotAnInputPort`] if the root model has no such input port,
    /// - [`Error::InputInThePast`] if `time` precedes the current time of a classic or parallel
    ///   simulation, or if a time-warp simulation would have to go back before its tick at 0,
    /// - [`Error::StragglerBeforeGvt`] if a time-warp rollback would have to go past the global
    ///   virtual time.
    pub fn inject(&mut self, time: Time, port: &str, payload: V) -> Result<()> {
        if !is_valid_time(time) || time.is_infinite() {
            return Err(Error::InvalidTime(time));
        }
        if self.status == Status::Done {
            return Err(Error::Finished);
        }
        let known = self
            .root
            .as_coordinator()
            .map_or(false, |root| root.ports().contains(PortKind::Input, port));
        if !known {
            return Err(Error::NotAnInputPort(port.to_string()));
        }
        if self.status != Status::Waiting {
            if self.config.strategy.saves_snapshots() {
                if self.ticks.last().map_or(false, |&latest| time <= latest) {
                    self.roll_back_before(time)?;
                }
            } else if time < self.time {
                return Err(Error::InputInThePast {
                    time,
                    current: self.time,
                });
            }
        }
        log::debug!("input queued for `{}` at {}", port, time);
        self.pending
            .entry(OrderedFloat(time))
            .or_default()
            .push(Message::new(payload, port));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        log::info!(
            "starting {} simulation of `{}` until {} ({} scheduler)",
            self.config.strategy,
            self.root.name(),
            self.config.duration,
            self.config.scheduler
        );
        self.started = Some(Instant::now());
        self.root.dispatch(Event::Init(0.0))?;
        self.status = Status::Running;
        Ok(())
    }

    fn finish(&mut self) {
        self.root.post_simulation();
        self.status = Status::Done;
        self.finished = self.started.map(|started| started.elapsed());
        log::info!(
            "simulation finished at {} in {}",
            self.time,
            humantime::format_duration(self.elapsed())
        );
        for (path, counts) in self.stats() {
            log::debug!("{}: {}", path, counts);
        }
        self.hooks
            .publish(&Notification::PostSimulation { time: self.time });
    }

    fn next_time(&self) -> Time {
        let input = self
            .pending
            .keys()
            .next()
            .map_or(INFINITY, |time| time.into_inner());
        input.min(self.root.time_next())
    }

    fn tick(&mut self, time: Time) -> Result<()> {
        let inputs = self.pending.remove(&OrderedFloat(time)).unwrap_or_default();
        let imminent = self.root.time_next() == time;
        log::trace!(
            "tick at {} ({} inputs, root imminent: {})",
            time,
            inputs.len(),
            imminent
        );
        if self.config.strategy.saves_snapshots() && !inputs.is_empty() {
            self.consumed.push((time, inputs.clone()));
        }
        match self.config.strategy {
            Strategy::Classic => {
                if !inputs.is_empty() {
                    self.root.dispatch(Event::Input(time, inputs))?;
                }
                if self.root.time_next() == time {
                    let output = self.root.dispatch(Event::Internal(time))?;
                    self.record_outputs(time, output);
                }
            }
            Strategy::Parallel | Strategy::TimeWarp => {
                if imminent {
                    let output = self.root.dispatch(Event::Collect(time))?;
                    self.record_outputs(time, output);
                }
                if !inputs.is_empty() {
                    self.root.dispatch(Event::Input(time, inputs))?;
                }
                self.root.dispatch(Event::Internal(time))?;
            }
        }
        self.time = time;
        if self.config.strategy.saves_snapshots() {
            self.ticks.push(time);
            self.advance_gvt();
        }
        Ok(())
    }

    fn record_outputs(&mut self, time: Time, output: Vec<Message<V>>) {
        for message in output {
            log::info!("output at {}: {}", time, message);
            self.outputs.push((time, message));
        }
    }

    /// Raises the global virtual time and runs fossil collection when it is due.
    fn advance_gvt(&mut self) {
        let earliest_input = self
            .pending
            .keys()
            .next()
            .map_or(INFINITY, |time| time.into_inner());
        let latest_tick = self.ticks.last().copied().unwrap_or(0.0);
        let candidate = earliest_input.min(latest_tick) - self.config.time_warp.max_lag;
        self.gvt = self.gvt.max(candidate);
        self.ticks_since_fossil += 1;
        if self.ticks_since_fossil >= self.config.time_warp.fossil_interval {
            self.ticks_since_fossil = 0;
            let gvt = self.gvt;
            let discarded = self.root.fossil_collection(gvt);
            self.ticks.retain(|&tick| tick >= gvt);
            self.consumed.retain(|(time, _)| *time >= gvt);
            log::trace!("fossil collection at gvt {} discarded {}", gvt, discarded);
        }
    }

    /// Restores the tree to the latest processed tick strictly before `straggler`, or to its
    /// initial state if there is none, and withdraws everything that happened since.
    fn roll_back_before(&mut self, straggler: Time) -> Result<()> {
        let target = self
            .ticks
            .iter()
            .rposition(|&tick| tick < straggler)
            .map(|position| (position, self.ticks[position]));
        let time = target.map_or(0.0, |(_, time)| time);
        if time < self.gvt {
            return Err(Error::StragglerBeforeGvt {
                time: straggler,
                gvt: self.gvt,
            });
        }
        match target {
            Some((position, time)) => {
                self.root.dispatch(Event::Rollback(time))?;
                self.ticks.truncate(position + 1);
            }
            None if self.ticks.first().map_or(false, |&first| first == 0.0) => {
                // The initial state has been superseded by a tick at 0.
                return Err(Error::InputInThePast {
                    time: straggler,
                    current: self.time,
                });
            }
            None => {
                self.root.dispatch(Event::Rollback(0.0))?;
                self.ticks.clear();
            }
        }
        let cutoff = target.map(|(_, time)| time);
        let keep = |stamp: Time| cutoff.map_or(false, |cutoff| stamp <= cutoff);
        let (kept, requeued): (Vec<_>, Vec<_>) = std::mem::take(&mut self.consumed)
            .into_iter()
            .partition(|(consumed, _)| keep(*consumed));
        self.consumed = kept;
        for (consumed, messages) in requeued {
            let queue = self.pending.entry(OrderedFloat(consumed)).or_default();
            let later = std::mem::replace(queue, messages);
            queue.extend(later);
        }
        let first_cancelled = self
            .outputs
            .iter()
            .position(|(output, _)| !keep(*output))
            .unwrap_or(self.outputs.len());
        let cancelled = self.outputs.split_off(first_cancelled);
        self.time = time;
        log::info!(
            "straggler at {} rolled the simulation back to {}, cancelling {} outputs",
            straggler,
            time,
            cancelled.len()
        );
        self.hooks
            .publish(&Notification::Rollback { time, straggler });
        for (time, message) in cancelled {
            self.hooks.publish(&Notification::OutputCancelled {
                time,
                port: message.port().to_string(),
            });
        }
        Ok(())
    }
}

impl<V> Simulation<V> {
    /// The root processor.
    #[must_use]
    pub fn processor(&self) -> &Processor<V> {
        &self.root
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Time of the last processed tick.
    #[must_use]
    pub fn time(&self) -> Time {
        self.time
    }

    /// The configuration of this run.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Progress through simulated time, between 0 and 100.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        match self.status {
            Status::Done => 100.0,
            _ if self.config.duration == 0.0 => 0.0,
            _ => (self.time / self.config.duration * 100.0).min(100.0),
        }
    }

    /// Wall-clock time spent since the simulation started, frozen once it is done.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.finished
            .or_else(|| self.started.map(|started| started.elapsed()))
            .unwrap_or_default()
    }

    /// Messages that left the root model, with their time stamps.
    #[must_use]
    pub fn outputs(&self) -> &[(Time, Message<V>)] {
        &self.outputs
    }

    /// Global virtual time; always 0 unless running time warp.
    #[must_use]
    pub fn gvt(&self) -> Time {
        self.gvt
    }

    /// Event counts of every processor, plus the [`TOTAL`] row.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let mut stats = self.root.stats();
        stats.insert(TOTAL.to_string(), self.root.total_counts());
        stats
    }

    /// Notification subscribers.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Subscribes to notifications of `hook`.
    pub fn subscribe<F>(&mut self, hook: Hook, subscriber: F)
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.hooks.subscribe(hook, subscriber);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{AtomicBehavior, AtomicModel, EventKind, Outbox, SchedulerKind, TimeWarpConfig};
    use rstest::rstest;
    use std::sync::Mutex;

    /// Emits a counter every `period`.
    #[derive(Debug, Clone)]
    struct Clock {
        period: Time,
        ticks: u32,
    }

    impl AtomicBehavior<u32> for Clock {
        fn internal_transition(&mut self) {
            self.ticks += 1;
        }
        fn output(&self, outbox: &mut Outbox<'_, u32>) -> Result<()> {
            outbox.post("out", self.ticks)
        }
        fn time_advance(&self) -> Time {
            self.period
        }
    }

    /// Sums what it receives and remembers when.
    #[derive(Debug, Clone, Default)]
    struct Adder {
        sum: u32,
        times: Vec<Time>,
        now: Time,
        finished: bool,
    }

    impl AtomicBehavior<u32> for Adder {
        fn external_transition(&mut self, elapsed: Time, messages: &[Message<u32>]) {
            self.now += elapsed;
            self.times.push(self.now);
            self.sum += messages.iter().map(Message::payload).sum::<u32>();
        }
        fn post_simulation(&mut self) {
            self.finished = true;
        }
    }

    /// A clock feeding an adder, with the clock's output and an `in` port exposed.
    fn model() -> CoupledModel<u32> {
        let mut root = CoupledModel::new("root");
        root.add_child(
            AtomicModel::new(
                "clock",
                Clock {
                    period: 2.0,
                    ticks: 1,
                },
            )
            .with_output_port("out"),
        )
        .unwrap();
        root.add_child(AtomicModel::new("adder", Adder::default()))
            .unwrap();
        root.add_internal_coupling("clock", "adder", Some("out"), Some("in"))
            .unwrap();
        root.add_external_output_coupling("clock", Some("out"), Some("out"))
            .unwrap();
        root.add_external_input_coupling("adder", Some("in"), Some("in"))
            .unwrap();
        root
    }

    fn adder(simulation: &Simulation<u32>) -> &Adder {
        simulation
            .processor()
            .find("adder")
            .and_then(Processor::behavior::<Adder>)
            .unwrap()
    }

    #[rstest]
    fn test_runs_until_duration(
        #[values(Strategy::Classic, Strategy::Parallel, Strategy::TimeWarp)] strategy: Strategy,
    ) {
        let config = SimulationConfig::default()
            .with_duration(7.0)
            .with_strategy(strategy);
        let mut simulation = Simulation::new(model(), config).unwrap();
        let finished = Arc::new(Mutex::new(None));
        let observer = Arc::clone(&finished);
        simulation.subscribe(Hook::PostSimulation, move |n| {
            *observer.lock().unwrap() = Some(n.clone());
        });
        assert_eq!(simulation.status(), Status::Waiting);
        simulation.simulate().unwrap();
        assert_eq!(simulation.status(), Status::Done);
        assert_eq!(simulation.percentage(), 100.0);
        assert_eq!(simulation.time(), 6.0);
        assert_eq!(adder(&simulation).sum, 1 + 2 + 3);
        assert_eq!(adder(&simulation).times, vec![2.0, 4.0, 6.0]);
        assert!(adder(&simulation).finished);
        assert_eq!(
            simulation
                .outputs()
                .iter()
                .map(|(t, m)| (*t, *m.payload()))
                .collect::<Vec<_>>(),
            vec![(2.0, 1), (4.0, 2), (6.0, 3)]
        );
        assert_eq!(
            *finished.lock().unwrap(),
            Some(Notification::PostSimulation { time: 6.0 })
        );
        assert!(matches!(simulation.simulate(), Err(Error::AlreadyStarted)));
        assert!(simulation.processor().invariants_hold());
    }

    #[test]
    fn test_stats() {
        let config = SimulationConfig::default()
            .with_duration(5.0)
            .with_scheduler(SchedulerKind::MinimalList);
        let mut simulation = Simulation::new(model(), config).unwrap();
        simulation.simulate().unwrap();
        let stats = simulation.stats();
        assert_eq!(
            stats.keys().collect::<Vec<_>>(),
            vec!["TOTAL", "root", "root/adder", "root/clock"]
        );
        assert_eq!(stats["root/clock"].get(EventKind::Internal), 2);
        assert_eq!(stats["root/clock"].get(EventKind::Output), 2);
        assert_eq!(stats["root/adder"].get(EventKind::Input), 2);
        assert_eq!(stats["root"].get(EventKind::Init), 1);
        assert_eq!(stats[TOTAL].get(EventKind::Init), 3);
        assert_eq!(stats[TOTAL].get(EventKind::Output), 4);
    }

    #[rstest]
    fn test_inject(#[values(Strategy::Classic, Strategy::Parallel)] strategy: Strategy) {
        let config = SimulationConfig::default()
            .with_duration(5.0)
            .with_strategy(strategy);
        let mut simulation = Simulation::new(model(), config).unwrap();
        simulation.inject(3.0, "in", 10).unwrap();
        assert!(matches!(
            simulation.inject(1.0, "out", 1),
            Err(Error::NotAnInputPort(_))
        ));
        assert!(matches!(
            simulation.inject(-1.0, "in", 1),
            Err(Error::InvalidTime(_))
        ));
        assert_eq!(simulation.step().unwrap(), Some(2.0));
        assert_eq!(simulation.step().unwrap(), Some(3.0));
        assert!(matches!(
            simulation.inject(2.5, "in", 1),
            Err(Error::InputInThePast { .. })
        ));
        assert_eq!(simulation.step().unwrap(), Some(4.0));
        assert_eq!(simulation.step().unwrap(), None);
        assert_eq!(adder(&simulation).sum, 1 + 10 + 2);
        assert_eq!(adder(&simulation).times, vec![2.0, 3.0, 4.0]);
    }

    #[rstest]
    fn test_inject_after_finish(
        #[values(Strategy::Classic, Strategy::Parallel, Strategy::TimeWarp)] strategy: Strategy,
    ) {
        let config = SimulationConfig::default()
            .with_duration(7.0)
            .with_strategy(strategy);
        let mut simulation = Simulation::new(model(), config).unwrap();
        let rollbacks = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&rollbacks);
        simulation.subscribe(Hook::Rollback, move |_| *counter.lock().unwrap() += 1);
        simulation.simulate().unwrap();
        assert!(matches!(
            simulation.inject(3.0, "in", 100),
            Err(Error::Finished)
        ));
        assert_eq!(*rollbacks.lock().unwrap(), 0);
        assert_eq!(simulation.time(), 6.0);
        assert_eq!(simulation.outputs().len(), 3);
        assert_eq!(adder(&simulation).sum, 1 + 2 + 3);
        assert_eq!(simulation.step().unwrap(), None);
    }

    #[test]
    fn test_straggler_rolls_back() {
        let config = SimulationConfig::default()
            .with_duration(9.0)
            .with_strategy(Strategy::TimeWarp);
        let mut simulation = Simulation::new(model(), config).unwrap();
        let notifications = Arc::new(Mutex::new(Vec::new()));
        for hook in [Hook::Rollback, Hook::OutputCancelled] {
            let notifications = Arc::clone(&notifications);
            simulation.subscribe(hook, move |n| notifications.lock().unwrap().push(n.clone()));
        }
        for _ in 0..3 {
            simulation.step().unwrap();
        }
        assert_eq!(simulation.time(), 6.0);
        assert_eq!(adder(&simulation).sum, 6);

        simulation.inject(3.0, "in", 100).unwrap();
        assert_eq!(simulation.time(), 2.0);
        assert_eq!(adder(&simulation).sum, 1);
        assert_eq!(simulation.outputs().len(), 1);
        assert_eq!(
            *notifications.lock().unwrap(),
            vec![
                Notification::Rollback {
                    time: 2.0,
                    straggler: 3.0
                },
                Notification::OutputCancelled {
                    time: 4.0,
                    port: String::from("out")
                },
                Notification::OutputCancelled {
                    time: 6.0,
                    port: String::from("out")
                },
            ]
        );

        simulation.simulate().unwrap_err();
        while simulation.step().unwrap().is_some() {}
        assert_eq!(adder(&simulation).sum, 1 + 100 + 2 + 3 + 4);
        assert_eq!(adder(&simulation).times, vec![2.0, 3.0, 4.0, 6.0, 8.0]);
        assert!(simulation.processor().invariants_hold());
    }

    #[test]
    fn test_straggler_before_gvt() {
        let config = SimulationConfig::default()
            .with_duration(20.0)
            .with_strategy(Strategy::TimeWarp)
            .with_time_warp(TimeWarpConfig {
                max_lag: 3.0,
                fossil_interval: 2,
            });
        let mut simulation = Simulation::new(model(), config).unwrap();
        for _ in 0..5 {
            simulation.step().unwrap();
        }
        assert_eq!(simulation.time(), 10.0);
        assert_eq!(simulation.gvt(), 7.0);
        assert!(matches!(
            simulation.inject(5.0, "in", 1),
            Err(Error::StragglerBeforeGvt { .. })
        ));
        simulation.inject(9.0, "in", 1).unwrap();
        assert_eq!(simulation.time(), 8.0);
        let clock = simulation.processor().find("clock").unwrap();
        assert!(clock.as_simulator().unwrap().history().len() <= 3);
    }

    #[test]
    fn test_parallel_with_workers() {
        let mut root = CoupledModel::new("root");
        for i in 0..4 {
            let name = format!("clock{}", i);
            root.add_child(
                AtomicModel::new(
                    name.as_str(),
                    Clock {
                        period: 1.0,
                        ticks: 1,
                    },
                )
                .with_output_port("out"),
            )
            .unwrap();
        }
        root.add_child(AtomicModel::new("adder", Adder::default()))
            .unwrap();
        for i in 0..4 {
            root.add_internal_coupling(&format!("clock{}", i), "adder", Some("out"), Some("in"))
                .unwrap();
        }
        let config = SimulationConfig::default()
            .with_duration(3.5)
            .with_strategy(Strategy::Parallel)
            .with_workers(3);
        let mut simulation = Simulation::new(root, config).unwrap();
        simulation.simulate().unwrap();
        assert_eq!(adder(&simulation).sum, 4 * (1 + 2 + 3));
        assert_eq!(adder(&simulation).times, vec![1.0, 2.0, 3.0]);
    }
}
