use crate::processor::{ensure_imminent, ensure_within, unsupported};
use crate::{
    is_valid_time, AtomicBehavior, AtomicModel, Error, Event, EventCounts, EventKind, Message,
    Result, Strategy, Time, Value,
};

/// State of a simulator saved after a transition under the time-warp strategy.
#[derive(Debug, Clone)]
pub struct Snapshot<V> {
    time_last: Time,
    time_next: Time,
    behavior: Box<dyn AtomicBehavior<V>>,
}

impl<V> Snapshot<V> {
    /// Time of the transition after which the snapshot was taken.
    #[must_use]
    pub fn time_last(&self) -> Time {
        self.time_last
    }

    /// Time of the next internal transition at the moment of the snapshot.
    #[must_use]
    pub fn time_next(&self) -> Time {
        self.time_next
    }

    /// The saved behavior.
    #[must_use]
    pub fn behavior(&self) -> &dyn AtomicBehavior<V> {
        self.behavior.as_ref()
    }
}

/// Processor of an atomic model.
#[derive(Debug)]
pub struct Simulator<V> {
    model: AtomicModel<V>,
    path: String,
    strategy: Strategy,
    time_last: Time,
    time_next: Time,
    bag: Vec<Message<V>>,
    history: Vec<Snapshot<V>>,
    counts: EventCounts,
}

impl<V: Value> Simulator<V> {
    /// Constructs a simulator of `model`, identified by `path` in errors and logs.
    #[must_use]
    pub fn new(model: AtomicModel<V>, path: String, strategy: Strategy) -> Self {
        Self {
            model,
            path,
            strategy,
            time_last: 0.0,
            time_next: 0.0,
            bag: Vec::new(),
            history: Vec::new(),
            counts: EventCounts::default(),
        }
    }

    /// Handles an event and returns the messages produced by the model.
    ///
    /// # Errors
    ///
    /// See [`Processor::dispatch`](crate::Processor::dispatch).
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
                self.react(time, &messages).map(|()| Vec::new())
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

    /// Invokes the post-simulation callback of the model.
    pub fn post_simulation(&mut self) {
        self.model.behavior_mut().post_simulation();
    }

    /// Discards every snapshot superseded by a later one taken at or before `gvt`. The most recent
    /// snapshot is always kept. Returns the number of discarded snapshots.
    pub fn fossil_collection(&mut self, gvt: Time) -> usize {
        let keep_from = self
            .history
            .iter()
            .rposition(|snapshot| snapshot.time_last <= gvt)
            .unwrap_or(0);
        self.history.drain(..keep_from);
        if keep_from > 0 {
            log::debug!(
                "{}: discarded {} snapshots before {}",
                self.path,
                keep_from,
                gvt
            );
        }
        keep_from
    }

    fn init(&mut self, time: Time) -> Result<()> {
        self.bag.clear();
        self.history.clear();
        self.advance(time)
    }

    /// Classic internal event: output followed by the internal transition.
    fn step(&mut self, time: Time) -> Result<Vec<Message<V>>> {
        ensure_imminent(&self.path, EventKind::Internal, time, self.time_next)?;
        let output = self.output()?;
        self.model.behavior_mut().internal_transition();
        log::debug!("{}: internal transition at {}", self.path, time);
        self.advance(time)?;
        Ok(output)
    }

    /// Classic input event: external transition.
    fn react(&mut self, time: Time, messages: &[Message<V>]) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Input,
            time,
            self.time_last,
            self.time_next,
        )?;
        self.model.check_inputs(messages)?;
        let elapsed = time - self.time_last;
        self.model
            .behavior_mut()
            .external_transition(elapsed, messages);
        log::debug!("{}: external transition at {}", self.path, time);
        self.advance(time)
    }

    fn collect(&mut self, time: Time) -> Result<Vec<Message<V>>> {
        ensure_imminent(&self.path, EventKind::Collect, time, self.time_next)?;
        self.output()
    }

    fn receive(&mut self, time: Time, messages: Vec<Message<V>>) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Input,
            time,
            self.time_last,
            self.time_next,
        )?;
        self.model.check_inputs(&messages)?;
        self.bag.extend(messages);
        Ok(())
    }

    /// Parallel internal event: confluent, internal or external transition depending on whether
    /// the model is imminent and whether its bag holds messages. Does nothing if neither.
    fn transition(&mut self, time: Time) -> Result<()> {
        ensure_within(
            &self.path,
            EventKind::Internal,
            time,
            self.time_last,
            self.time_next,
        )?;
        let bag = std::mem::take(&mut self.bag);
        let behavior = self.model.behavior_mut();
        let kind = if time == self.time_next {
            if bag.is_empty() {
                behavior.internal_transition();
                "internal"
            } else {
                behavior.confluent_transition(&bag);
                "confluent"
            }
        } else if bag.is_empty() {
            return Ok(());
        } else {
            behavior.external_transition(time - self.time_last, &bag);
            "external"
        };
        log::debug!("{}: {} transition at {}", self.path, kind, time);
        self.advance(time)
    }

    fn rollback(&mut self, time: Time) -> Result<()> {
        while self
            .history
            .last()
            .map_or(false, |snapshot| snapshot.time_last > time)
        {
            self.history.pop();
        }
        let snapshot = self.history.last().ok_or_else(|| Error::MissingSnapshot {
            path: self.path.clone(),
            time,
        })?;
        self.time_last = snapshot.time_last;
        self.time_next = snapshot.time_next;
        self.model.replace_behavior(snapshot.behavior.clone());
        self.bag.clear();
        log::debug!(
            "{}: rolled back to {} (requested {})",
            self.path,
            self.time_last,
            time
        );
        Ok(())
    }

    fn output(&mut self) -> Result<Vec<Message<V>>> {
        let output = self.model.fetch_output()?;
        for _ in &output {
            self.counts.record(EventKind::Output);
        }
        Ok(output)
    }

    /// Sets `time_last` to `time` and schedules the next internal transition.
    fn advance(&mut self, time: Time) -> Result<()> {
        let time_advance = self.model.behavior().time_advance();
        if !is_valid_time(time_advance) {
            return Err(Error::NegativeTimeAdvance {
                model: self.path.clone(),
                value: time_advance,
            });
        }
        self.time_last = time;
        self.time_next = time + time_advance;
        if self.strategy.saves_snapshots() {
            self.history.push(Snapshot {
                time_last: self.time_last,
                time_next: self.time_next,
                behavior: self.model.behavior().clone_box(),
            });
        }
        Ok(())
    }
}

impl<V> Simulator<V> {
    /// Name of the model.
    #[must_use]
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Path of the model from the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The simulated model.
    #[must_use]
    pub fn model(&self) -> &AtomicModel<V> {
        &self.model
    }

    /// Time of the last transition.
    #[must_use]
    pub fn time_last(&self) -> Time {
        self.time_last
    }

    /// Time of the next internal transition.
    #[must_use]
    pub fn time_next(&self) -> Time {
        self.time_next
    }

    /// Events handled so far.
    #[must_use]
    pub fn counts(&self) -> &EventCounts {
        &self.counts
    }

    /// Saved snapshots, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Snapshot<V>] {
        &self.history
    }
}
