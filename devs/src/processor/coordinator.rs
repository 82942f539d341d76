use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::concurrency::Dispatcher;
use crate::model::CoupledParts;
use crate::processor::{ensure_imminent, ensure_within, unsupported, ProcessorConfig};
use crate::{
    is_valid_time, CouplingKind, Couplings, Entry, Error, Event, EventCounts, EventKind, Message,
    Model, PortKind, Ports, Processor, Result, Scheduler, SchedulerKind, SelectFn, Simulator,
    Strategy, Time, Value, INFINITY,
};

/// Couplings of a coupled model resolved to child indices.
#[derive(Debug, Default)]
struct Routes {
    /// Own input port to child input ports.
    external_input: HashMap<String, Vec<(usize, String)>>,
    /// Child output port to own output ports.
    external_output: HashMap<(usize, String), Vec<String>>,
    /// Child output port to sibling input ports.
    internal: HashMap<(usize, String), Vec<(usize, String)>>,
}

impl Routes {
    fn resolve(parent: &str, couplings: &Couplings, names: &[&str]) -> Result<Self> {
        let index = |model: &str| {
            names
                .iter()
                .position(|name| *name == model)
                .ok_or_else(|| Error::NoSuchChild {
                    parent: parent.to_string(),
                    child: model.to_string(),
                })
        };
        let mut routes = Self::default();
        for (kind, coupling) in couplings.iter() {
            let (source, destination) = (&coupling.source, &coupling.destination);
            match kind {
                CouplingKind::ExternalInput => routes
                    .external_input
                    .entry(source.port.clone())
                    .or_default()
                    .push((index(&destination.model)?, destination.port.clone())),
                CouplingKind::ExternalOutput => routes
                    .external_output
                    .entry((index(&source.model)?, source.port.clone()))
                    .or_default()
                    .push(destination.port.clone()),
                CouplingKind::Internal => routes
                    .internal
                    .entry((index(&source.model)?, source.port.clone()))
                    .or_default()
                    .push((index(&destination.model)?, destination.port.clone())),
            }
        }
        Ok(routes)
    }
}

/// Processor of a coupled model.
///
/// The coordinator owns the processors of its children and a [`Scheduler`] holding every child
/// with a finite `time_next`, keyed by the child's index in declaration order.
pub struct Coordinator<V> {
    name: String,
    path: String,
    strategy: Strategy,
    scheduler_kind: SchedulerKind,
    ports: Ports<V>,
    children: Vec<Processor<V>>,
    routes: Routes,
    select: Option<SelectFn>,
    scheduler: Box<dyn Scheduler>,
    dispatcher: Option<Dispatcher>,
    time_last: Time,
    time_next: Time,
    bag: Vec<Message<V>>,
    pending: BTreeMap<usize, Vec<Message<V>>>,
    synchronize: BTreeSet<usize>,
    counts: EventCounts,
}

impl<V: fmt::Debug> fmt::Debug for Coordinator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("path", &self.path)
            .field("strategy", &self.strategy)
            .field("scheduler", &self.scheduler_kind)
            .field("time_last", &self.time_last)
            .field("time_next", &self.time_next)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

impl<V: Value> Coordinator<V> {
    pub(crate) fn new(
        parts: CoupledParts<V>,
        path: String,
        config: &ProcessorConfig,
    ) -> Result<Self> {
        let names: Vec<&str> = parts.children.iter().map(Model::name).collect();
        let routes = Routes::resolve(&parts.name, &parts.couplings, &names)?;
        let children = parts
            .children
            .into_iter()
            .map(|child| Processor::build(child, Some(&path), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: parts.name,
            path,
            strategy: config.strategy,
            scheduler_kind: config.scheduler,
            ports: parts.ports,
            children,
            routes,
            select: parts.select,
            scheduler: config.scheduler.build(),
            dispatcher: config.dispatcher.clone(),
            time_last: 0.0,
            time_next: INFINITY,
            bag: Vec::new(),
            pending: BTreeMap::new(),
            synchronize: BTreeSet::new(),
            counts: EventCounts::default(),
        })
    }

    /// Handles an event and returns the messages leaving the coupled model.
    ///
    /// # Errors
    ///
    /// See [`Processor::dispatch`].
    pub fn dispatch(&mut self, event: Event<V>) -> Result<Vec<Message<V>>> {
        log::trace!("{} <- {}", self.path, event);
        let time = event.time();
        if !is_valid_time(time) || time.is_infinite() {
            return Err(Error::InvalidTime(time));
        }
        self.counts.record(event.kind());
        let bags = self.strategy.uses_bags();
        match event {
            Event::Init(time) => self.init(time).map(|()| Vec::new()),
            Event::Internal(time) if !bags => self.step(time),
            Event::Input(time, messages) if !bags => {
                self.forward(time, messages).map(|()| Vec::new())
            }
            Event::Collect(time) if bags => self.collect(time),
            Event::Input(time, messages) if bags => {
                self.receive(time, messages).map(|()| Vec::new())
            }
            Event::Internal(time) if bags => self.transition(time).map(|()| Vec::new()),
            Event::Rollback(time) if self.strategy.saves_snapshots() => {
                self.rollback(time).map(|()| Vec::new())
            }
            event => Err(unsupported(&self.path, event.kind(), self.strategy)),
        }
    }

    /// Invokes the post-simulation callbacks of all descendants.
    pub fn post_simulation(&mut self) {
        for child in &mut self.children {
            child.post_simulation();
        }
    }

    /// Runs fossil collection on all descendants.
    pub fn fossil_collection(&mut self, gvt: Time) -> usize {
        self.children
            .iter_mut()
            .map(|child| child.fossil_collection(gvt))
            .sum()
    }

    fn init(&mut self, time: Time) -> Result<()> {
        for child in &mut self.children {
            child.dispatch(Event::Init(time))?;
        }
        self.bag.clear();
        self.pending.clear();
        self.synchronize.clear();
        self.rebuild_scheduler();
        self.time_last = self
            .children
            .iter()
            .map(Processor::time_last)
            .fold(time, Time::max);
        Ok(())
    }

    /// Classic internal event: steps exactly one imminent child, chosen by the select function.
    fn step(&mut self, time: Time) -> Result<Vec<Message<V>>> {
        ensure_imminent(&self.path, EventKind::Internal, time, self.time_next)?;
        let mut imminent = self.scheduler.imminent(time);
        if imminent.is_empty() {
            return Err(Error::NoImminentChild {
                path: self.path.clone(),
                time,
            });
        }
        imminent.sort();
        let index = self.select(&imminent)?;
        let selected = imminent.remove(index);
        for entry in imminent {
            self.scheduler.schedule(entry);
        }
        let child = &mut self.children[selected.id];
        let output = child.dispatch(Event::Internal(time))?;
        let time_next = child.time_next();
        if time_next.is_finite() {
            self.scheduler.schedule(Entry::new(time_next, selected.id));
        }
        let mut outgoing = Vec::new();
        let mut delivered: BTreeMap<usize, Vec<Message<V>>> = BTreeMap::new();
        self.route(selected.id, output, &mut delivered, &mut outgoing);
        for (destination, messages) in delivered {
            self.deliver(time, destination, messages)?;
        }
        self.update_times(time);
        Ok(outgoing)
    }

    /// Classic input event: forwards the messages to children through the external input
    /// couplings.
    fn forward(&mut self, time: Time, messages: Vec<Message<V>>) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Input,
            time,
            self.time_last,
            self.time_next,
        )?;
        for (destination, messages) in self.route_inputs(messages)? {
            self.deliver(time, destination, messages)?;
        }
        self.update_times(time);
        Ok(())
    }

    /// Collects the outputs of all imminent children, routing them to siblings and upwards.
    fn collect(&mut self, time: Time) -> Result<Vec<Message<V>>> {
        ensure_imminent(&self.path, EventKind::Collect, time, self.time_next)?;
        let mut imminent = self.scheduler.imminent(time);
        imminent.sort();
        let mut outgoing = Vec::new();
        let mut pending = std::mem::take(&mut self.pending);
        for entry in imminent {
            self.synchronize.insert(entry.id);
            let output = self.children[entry.id].dispatch(Event::Collect(time))?;
            self.route(entry.id, output, &mut pending, &mut outgoing);
        }
        self.synchronize.extend(pending.keys().copied());
        self.pending = pending;
        Ok(outgoing)
    }

    fn receive(&mut self, time: Time, messages: Vec<Message<V>>) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Input,
            time,
            self.time_last,
            self.time_next,
        )?;
        for message in &messages {
            self.ports.ensure(PortKind::Input, message.port())?;
        }
        self.bag.extend(messages);
        Ok(())
    }

    /// Parallel internal event: delivers every pending bag and steps every affected child once.
    fn transition(&mut self, time: Time) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Internal,
            time,
            self.time_last,
            self.time_next,
        )?;
        let bag = std::mem::take(&mut self.bag);
        for (destination, messages) in self.route_inputs(bag)? {
            self.pending.entry(destination).or_default().extend(messages);
        }
        self.synchronize.extend(self.pending.keys().copied());
        if self.synchronize.is_empty() {
            return Ok(());
        }
        for (destination, messages) in std::mem::take(&mut self.pending) {
            self.children[destination].dispatch(Event::Input(time, messages))?;
        }
        let synchronize: Vec<usize> = std::mem::take(&mut self.synchronize)
            .into_iter()
            .collect();
        for &id in &synchronize {
            let time_next = self.children[id].time_next();
            if time_next.is_finite() {
                self.scheduler.unschedule(Entry::new(time_next, id));
            }
        }
        self.step_children(time, &synchronize)?;
        for &id in &synchronize {
            let time_next = self.children[id].time_next();
            if time_next.is_finite() {
                self.scheduler.schedule(Entry::new(time_next, id));
            }
        }
        self.update_times(time);
        Ok(())
    }

    /// Dispatches an internal event to each of `ids`, concurrently for atomic children if a
    /// dispatcher is configured.
    fn step_children(&mut self, time: Time, ids: &[usize]) -> Result<()> {
        let atomic = ids
            .iter()
            .filter(|&&id| matches!(self.children[id], Processor::Simulator(_)))
            .count();
        let Some(dispatcher) = self.dispatcher.clone().filter(|_| atomic > 1) else {
            for &id in ids {
                self.children[id].dispatch(Event::Internal(time))?;
            }
            return Ok(());
        };
        if dispatcher.pool().is_shut_down() {
            return Err(Error::PoolShutdown);
        }
        let mut slots: Vec<Option<Processor<V>>> = std::mem::take(&mut self.children)
            .into_iter()
            .map(Some)
            .collect();
        let batch: Vec<(usize, Simulator<V>)> = ids
            .iter()
            .filter_map(|&id| match slots[id].take() {
                Some(Processor::Simulator(simulator)) => Some((id, simulator)),
                other => {
                    slots[id] = other;
                    None
                }
            })
            .collect();
        let outcome = dispatcher.run_batch(batch, move |(id, mut simulator)| {
            let result = simulator.dispatch(Event::Internal(time));
            (id, simulator, result)
        });
        let (results, mut first_error) = match outcome {
            Ok(results) => (results, None),
            Err(err) => (Vec::new(), Some(err)),
        };
        for (id, simulator, result) in results {
            slots[id] = Some(Processor::Simulator(simulator));
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        match slots.into_iter().collect::<Option<Vec<_>>>() {
            Some(children) => self.children = children,
            None => {
                log::error!("{}: children lost while stepping at {}", self.path, time);
                return Err(first_error.unwrap_or(Error::WorkerLost));
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        for &id in ids {
            if let Processor::Coordinator(_) = self.children[id] {
                self.children[id].dispatch(Event::Internal(time))?;
            }
        }
        Ok(())
    }

    /// Rolls back every child that is ahead of `time` and recomputes the times of the coordinator.
    fn rollback(&mut self, time: Time) -> Result<()> {
        for child in &mut self.children {
            if child.time_last() > time {
                child.dispatch(Event::Rollback(time))?;
            }
        }
        self.bag.clear();
        self.pending.clear();
        self.synchronize.clear();
        self.rebuild_scheduler();
        self.time_last = self
            .children
            .iter()
            .map(Processor::time_last)
            .fold(0.0, Time::max);
        log::debug!(
            "{}: rolled back to {}, next event at {}",
            self.path,
            self.time_last,
            self.time_next
        );
        Ok(())
    }

    /// Calls the select function over the imminent children and validates its answer.
    fn select(&self, imminent: &[Entry]) -> Result<usize> {
        if imminent.len() == 1 {
            return Ok(0);
        }
        let index = self.select.as_ref().map_or(0, |select| {
            let names: Vec<&str> = imminent
                .iter()
                .map(|entry| self.children[entry.id].name())
                .collect();
            select(&names)
        });
        if index < imminent.len() {
            Ok(index)
        } else {
            Err(Error::InvalidSelection {
                model: self.path.clone(),
                index,
                count: imminent.len(),
            })
        }
    }

    /// Routes the output of child `source` through internal couplings into `siblings` and
    /// through external output couplings into `outgoing`.
    fn route(
        &mut self,
        source: usize,
        output: Vec<Message<V>>,
        siblings: &mut BTreeMap<usize, Vec<Message<V>>>,
        outgoing: &mut Vec<Message<V>>,
    ) {
        for message in output {
            self.counts.record(EventKind::Output);
            let key = (source, message.port().to_string());
            if let Some(destinations) = self.routes.internal.get(&key) {
                for (destination, port) in destinations {
                    siblings
                        .entry(*destination)
                        .or_default()
                        .push(message.redirect(port.as_str()));
                }
            }
            if let Some(ports) = self.routes.external_output.get(&key) {
                outgoing.extend(ports.iter().map(|port| message.redirect(port.as_str())));
            }
        }
    }

    /// Groups messages arriving at own input ports by destination child.
    fn route_inputs(
        &self,
        messages: Vec<Message<V>>,
    ) -> Result<BTreeMap<usize, Vec<Message<V>>>> {
        let mut grouped: BTreeMap<usize, Vec<Message<V>>> = BTreeMap::new();
        for message in messages {
            self.ports.ensure(PortKind::Input, message.port())?;
            if let Some(destinations) = self.routes.external_input.get(message.port()) {
                for (destination, port) in destinations {
                    grouped
                        .entry(*destination)
                        .or_default()
                        .push(message.redirect(port.as_str()));
                }
            }
        }
        Ok(grouped)
    }

    /// Classic delivery of a bag to one child, keeping the scheduler up to date.
    fn deliver(&mut self, time: Time, destination: usize, messages: Vec<Message<V>>) -> Result<()> {
        let child = &mut self.children[destination];
        let previous = Entry::new(child.time_next(), destination);
        child.dispatch(Event::Input(time, messages))?;
        let time_next = child.time_next();
        if previous.time().is_finite() {
            self.scheduler.reschedule(previous, time_next);
        } else if time_next.is_finite() {
            self.scheduler.schedule(Entry::new(time_next, destination));
        }
        Ok(())
    }

    fn rebuild_scheduler(&mut self) {
        let entries = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.time_next().is_finite())
            .map(|(id, child)| Entry::new(child.time_next(), id));
        self.scheduler = self.scheduler_kind.build_with(entries);
        self.time_next = self.scheduler.read().unwrap_or(INFINITY);
        log::debug!(
            "{}: scheduler rebuilt with {} children",
            self.path,
            self.scheduler.len()
        );
    }

    fn update_times(&mut self, time: Time) {
        self.time_last = time;
        self.time_next = self.scheduler.read().unwrap_or(INFINITY);
    }
}

impl<V> Coordinator<V> {
    /// Name of the coupled model.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the coupled model from the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Ports of the coupled model.
    #[must_use]
    pub fn ports(&self) -> &Ports<V> {
        &self.ports
    }

    /// Child processors in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Processor<V>] {
        &self.children
    }

    /// Time of the last transition.
    #[must_use]
    pub fn time_last(&self) -> Time {
        self.time_last
    }

    /// Time of the next transition of any descendant.
    #[must_use]
    pub fn time_next(&self) -> Time {
        self.time_next
    }

    /// Events handled by the coordinator itself.
    #[must_use]
    pub fn counts(&self) -> &EventCounts {
        &self.counts
    }

    /// Number of children currently scheduled.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::concurrency::ThreadPool;
    use crate::{AtomicBehavior, AtomicModel, CoupledModel, Outbox};
    use rstest::rstest;
    use std::sync::Arc;

    /// Emits its name with the given period.
    #[derive(Debug, Clone)]
    struct Beacon {
        period: Time,
        sent: u32,
    }

    impl AtomicBehavior<u32> for Beacon {
        fn internal_transition(&mut self) {
            self.sent += 1;
        }
        fn output(&self, outbox: &mut Outbox<'_, u32>) -> Result<()> {
            outbox.post("out", self.sent)
        }
        fn time_advance(&self) -> Time {
            self.period
        }
    }

    /// Records everything it receives, together with the reception time offsets.
    #[derive(Debug, Clone, Default)]
    struct Sink {
        received: Vec<u32>,
        transitions: u32,
    }

    impl AtomicBehavior<u32> for Sink {
        fn external_transition(&mut self, _elapsed: Time, messages: &[Message<u32>]) {
            self.transitions += 1;
            self.received.extend(messages.iter().map(|m| *m.payload()));
        }
    }

    fn beacon(name: &str, period: Time) -> AtomicModel<u32> {
        AtomicModel::new(name, Beacon { period, sent: 0 }).with_output_port("out")
    }

    /// Two beacons with the same period feeding one sink, and an external output.
    fn model() -> CoupledModel<u32> {
        let mut root = CoupledModel::new("root");
        root.add_child(beacon("a", 2.0)).unwrap();
        root.add_child(beacon("b", 2.0)).unwrap();
        root.add_child(AtomicModel::new("sink", Sink::default())).unwrap();
        root.add_internal_coupling("a", "sink", Some("out"), Some("in"))
            .unwrap();
        root.add_internal_coupling("b", "sink", Some("out"), Some("in"))
            .unwrap();
        root.add_external_output_coupling("a", Some("out"), Some("out"))
            .unwrap();
        root
    }

    fn coordinator(model: CoupledModel<u32>, config: &ProcessorConfig) -> Coordinator<u32> {
        match Processor::new(Model::from(model), config).unwrap() {
            Processor::Coordinator(coordinator) => coordinator,
            Processor::Simulator(_) => unreachable!(),
        }
    }

    fn sink(coordinator: &Coordinator<u32>) -> &Sink {
        coordinator.children()[2].behavior::<Sink>().unwrap()
    }

    #[test]
    fn test_classic_selects_one_child_per_tick() {
        let config = ProcessorConfig::new(Strategy::Classic, SchedulerKind::SortedList);
        let mut coordinator = coordinator(model(), &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        assert_eq!(coordinator.time_next(), 2.0);
        assert_eq!(coordinator.scheduled(), 2);

        let out = coordinator.dispatch(Event::Internal(2.0)).unwrap();
        assert_eq!(out, vec![Message::new(0, "out")]);
        assert_eq!(coordinator.children()[0].time_next(), 4.0);
        assert_eq!(coordinator.children()[1].time_next(), 2.0);
        assert_eq!(coordinator.time_next(), 2.0);

        let out = coordinator.dispatch(Event::Internal(2.0)).unwrap();
        assert!(out.is_empty());
        assert_eq!(coordinator.time_next(), 4.0);
        assert_eq!(sink(&coordinator).received, vec![0, 0]);
        assert_eq!(sink(&coordinator).transitions, 2);
        assert_eq!(coordinator.counts().get(EventKind::Output), 2);
    }

    #[test]
    fn test_custom_select() {
        let config = ProcessorConfig::new(Strategy::Classic, SchedulerKind::BinaryHeap);
        let model = model().with_select(|names| names.iter().position(|n| *n == "b").unwrap());
        let mut coordinator = coordinator(model, &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        coordinator.dispatch(Event::Internal(2.0)).unwrap();
        assert_eq!(coordinator.children()[1].time_next(), 4.0);
        assert_eq!(coordinator.children()[0].time_next(), 2.0);
    }

    #[test]
    fn test_invalid_select() {
        let config = ProcessorConfig::new(Strategy::Classic, SchedulerKind::BinaryHeap);
        let mut coordinator = coordinator(model().with_select(|names| names.len()), &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        assert!(matches!(
            coordinator.dispatch(Event::Internal(2.0)),
            Err(Error::InvalidSelection { index: 2, count: 2, .. })
        ));
    }

    #[test]
    fn test_bad_synchronisation() {
        let config = ProcessorConfig::default();
        let mut coordinator = coordinator(model(), &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        assert!(matches!(
            coordinator.dispatch(Event::Internal(1.0)),
            Err(Error::BadSynchronisation { .. })
        ));
        assert!(matches!(
            coordinator.dispatch(Event::Collect(2.0)),
            Err(Error::UnsupportedEvent { .. })
        ));
    }

    #[rstest]
    fn test_parallel_steps_all_imminent(
        #[values(SchedulerKind::SplayTree, SchedulerKind::LadderQueue)] scheduler: SchedulerKind,
        #[values(false, true)] pool: bool,
    ) {
        let mut config = ProcessorConfig::new(Strategy::Parallel, scheduler);
        if pool {
            config = config.with_dispatcher(Dispatcher::new(Arc::new(ThreadPool::new(2, 2))));
        }
        let mut coordinator = coordinator(model(), &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        for tick in 1..=3 {
            let time = 2.0 * f64::from(tick);
            let out = coordinator.dispatch(Event::Collect(time)).unwrap();
            assert_eq!(out, vec![Message::new(tick - 1, "out")]);
            coordinator.dispatch(Event::Internal(time)).unwrap();
            assert_eq!(coordinator.time_last(), time);
            assert_eq!(coordinator.time_next(), time + 2.0);
        }
        let sink = sink(&coordinator);
        assert_eq!(sink.received, vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(sink.transitions, 3);
    }

    #[test]
    fn test_pool_shutdown_keeps_children() {
        let pool = Arc::new(ThreadPool::new(1, 2));
        let config = ProcessorConfig::new(Strategy::Parallel, SchedulerKind::BinaryHeap)
            .with_dispatcher(Dispatcher::new(Arc::clone(&pool)));
        let mut coordinator = coordinator(model(), &config);
        coordinator.dispatch(Event::Init(0.0)).unwrap();
        coordinator.dispatch(Event::Collect(2.0)).unwrap();
        pool.shutdown();
        assert!(matches!(
            coordinator.dispatch(Event::Internal(2.0)),
            Err(Error::PoolShutdown)
        ));
        assert_eq!(coordinator.children().len(), 3);
        assert_eq!(coordinator.children()[0].time_next(), 2.0);
    }

    #[test]
    fn test_nested_input_routing() {
        let mut inner = CoupledModel::new("inner");
        inner
            .add_child(AtomicModel::new("sink", Sink::default()))
            .unwrap();
        inner
            .add_external_input_coupling("sink", Some("in"), Some("in"))
            .unwrap();
        let mut root = CoupledModel::new("root");
        root.add_child(beacon("a", 1.5)).unwrap();
        root.add_child(inner).unwrap();
        root.add_internal_coupling("a", "inner", Some("out"), Some("in"))
            .unwrap();

        let config = ProcessorConfig::default();
        let mut root = Processor::new(Model::from(root), &config).unwrap();
        root.dispatch(Event::Init(0.0)).unwrap();
        for _ in 0..3 {
            let time = root.time_next();
            root.dispatch(Event::Internal(time)).unwrap();
            assert!(root.invariants_hold());
        }
        let sink = root.find("inner/sink").unwrap();
        assert_eq!(sink.path(), "root/inner/sink");
        assert_eq!(sink.behavior::<Sink>().unwrap().received, vec![0, 1, 2]);
        assert_eq!(sink.time_last(), 4.5);
        assert!(root.find("inner/nope").is_none());
        assert!(root.find("a").unwrap().behavior::<Sink>().is_none());
    }
}
