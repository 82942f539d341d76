use crate::{AtomicBehavior, Message, PortKind, Ports, Result, Value};

/// Gives an output function write access to the output ports of its model.
pub struct Outbox<'a, V> {
    ports: &'a mut Ports<V>,
}

impl<'a, V> Outbox<'a, V> {
    pub(crate) fn new(ports: &'a mut Ports<V>) -> Self {
        Self { ports }
    }

    /// Drops `value` off at output port `port`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchPort`](crate::Error::NoSuchPort) if the model has no such port,
    /// - [`Error::InvalidPortKind`](crate::Error::InvalidPortKind) if `port` is an input port,
    /// - [`Error::MessageAlreadySent`](crate::Error::MessageAlreadySent) if a value was already
    ///   posted to `port` in this output call.
    pub fn post(&mut self, port: &str, value: V) -> Result<()> {
        self.ports.post(port, value)
    }

    /// Name of the model that produces the output.
    #[must_use]
    pub fn model(&self) -> &str {
        self.ports.host()
    }
}

/// A leaf model: ports plus a behavior.
#[derive(Debug, Clone)]
pub struct AtomicModel<V> {
    name: String,
    parent: Option<String>,
    ports: Ports<V>,
    behavior: Box<dyn AtomicBehavior<V>>,
}

impl<V: Value> AtomicModel<V> {
    /// Constructs a model named `name` without any ports.
    pub fn new<S, B>(name: S, behavior: B) -> Self
    where
        S: Into<String>,
        B: AtomicBehavior<V> + 'static,
    {
        Self::with_boxed_behavior(name, Box::new(behavior))
    }

    /// Constructs a model from an already boxed behavior.
    pub fn with_boxed_behavior<S: Into<String>>(
        name: S,
        behavior: Box<dyn AtomicBehavior<V>>,
    ) -> Self {
        let name = name.into();
        Self {
            ports: Ports::new(name.clone()),
            name,
            parent: None,
            behavior,
        }
    }

    /// Adds an input port named `name`.
    #[must_use]
    pub fn with_input_port(mut self, name: &str) -> Self {
        self.ports.add_input(Some(name));
        self
    }

    /// Adds an output port named `name`.
    #[must_use]
    pub fn with_output_port(mut self, name: &str) -> Self {
        self.ports.add_output(Some(name));
        self
    }

    /// Adds an input port and returns its name. See [`Ports::add`].
    pub fn add_input_port(&mut self, name: Option<&str>) -> String {
        self.ports.add_input(name)
    }

    /// Adds an output port and returns its name. See [`Ports::add`].
    pub fn add_output_port(&mut self, name: Option<&str>) -> String {
        self.ports.add_output(name)
    }

    /// Runs the output function and collects the posted values. On failure, values posted
    /// before the error are discarded.
    pub(crate) fn fetch_output(&mut self) -> Result<Vec<Message<V>>> {
        let mut outbox = Outbox::new(&mut self.ports);
        let result = self.behavior.output(&mut outbox);
        let messages = self.ports.pick_up_all();
        result.map(|()| messages)
    }

    /// Ensures every message is addressed to an input port of this model.
    pub(crate) fn check_inputs(&self, messages: &[Message<V>]) -> Result<()> {
        messages
            .iter()
            .try_for_each(|message| self.ports.ensure(PortKind::Input, message.port()))
    }

    pub(crate) fn replace_behavior(&mut self, behavior: Box<dyn AtomicBehavior<V>>) {
        self.behavior = behavior;
    }
}

impl<V> AtomicModel<V> {
    /// The behavior of the model.
    #[must_use]
    pub fn behavior(&self) -> &dyn AtomicBehavior<V> {
        self.behavior.as_ref()
    }

    /// Mutable access to the behavior of the model.
    pub fn behavior_mut(&mut self) -> &mut dyn AtomicBehavior<V> {
        self.behavior.as_mut()
    }

    /// Name of the model.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the parent model.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: &str) {
        self.parent = Some(parent.to_string());
    }

    /// Ports of the model.
    #[must_use]
    pub fn ports(&self) -> &Ports<V> {
        &self.ports
    }

    pub(crate) fn ports_mut(&mut self) -> &mut Ports<V> {
        &mut self.ports
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Error, Time};

    #[derive(Debug, Clone)]
    struct Twice;

    impl AtomicBehavior<i32> for Twice {
        fn output(&self, outbox: &mut Outbox<'_, i32>) -> Result<()> {
            outbox.post("out", 1)?;
            outbox.post("out", 2)
        }
    }

    #[derive(Debug, Clone)]
    struct Emitter;

    impl AtomicBehavior<i32> for Emitter {
        fn output(&self, outbox: &mut Outbox<'_, i32>) -> Result<()> {
            outbox.post("b", 2)?;
            outbox.post("a", 1)
        }
        fn time_advance(&self) -> Time {
            1.0
        }
    }

    #[test]
    fn test_fetch_output_in_port_order() {
        let mut model = AtomicModel::new("m", Emitter)
            .with_output_port("a")
            .with_output_port("b");
        let messages = model.fetch_output().unwrap();
        assert_eq!(messages, vec![Message::new(1, "a"), Message::new(2, "b")]);
        assert!(model.fetch_output().unwrap().len() == 2);
    }

    #[derive(Debug, Clone)]
    struct Stray;

    impl AtomicBehavior<i32> for Stray {
        fn output(&self, outbox: &mut Outbox<'_, i32>) -> Result<()> {
            outbox.post("a", 1)?;
            outbox.post("missing", 2)
        }
    }

    #[test]
    fn test_posting_twice_fails() {
        let mut model = AtomicModel::new("m", Twice).with_output_port("out");
        assert!(matches!(
            model.fetch_output(),
            Err(Error::MessageAlreadySent { .. })
        ));
        assert!(!model.ports().output_ports()[0].is_pending());
    }

    #[test]
    fn test_failed_output_leaves_ports_empty() {
        let mut model = AtomicModel::new("m", Stray).with_output_port("a");
        assert!(matches!(
            model.fetch_output(),
            Err(Error::NoSuchPort { .. })
        ));
        assert!(model.ports().output_ports().iter().all(|port| !port.is_pending()));
        model.replace_behavior(Box::new(Emitter));
        model.ports_mut().add_output(Some("b"));
        assert_eq!(
            model.fetch_output().unwrap(),
            vec![Message::new(1, "a"), Message::new(2, "b")]
        );
    }

    #[test]
    fn test_check_inputs() {
        let model = AtomicModel::new("m", Twice)
            .with_input_port("in")
            .with_output_port("out");
        assert!(model.check_inputs(&[Message::new(1, "in")]).is_ok());
        assert!(matches!(
            model.check_inputs(&[Message::new(1, "out")]),
            Err(Error::InvalidPortKind { .. })
        ));
        assert!(matches!(
            model.check_inputs(&[Message::new(1, "x")]),
            Err(Error::NoSuchPort { .. })
        ));
    }
}
