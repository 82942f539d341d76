use crate::{Error, Message, Port, PortKind, Result};

/// Input and output ports of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Ports<V> {
    host: String,
    input: Vec<Port<V>>,
    output: Vec<Port<V>>,
}

impl<V> Ports<V> {
    /// Constructs an empty port set for model `host`.
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            input: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Adds a port and returns its name.
    ///
    /// If `name` is omitted, a name is generated from the direction and the current number of
    /// ports of that direction, e.g., `input_0`. Adding a name that already exists returns the
    /// existing port.
    pub fn add(&mut self, kind: PortKind, name: Option<&str>) -> String {
        let ports = self.ports_mut(kind);
        let name = name.map_or_else(|| format!("{}_{}", kind, ports.len()), String::from);
        if ports.iter().any(|p| p.name() == name) {
            log::warn!(
                "{} port `{}` already exists in `{}`, reusing it",
                kind,
                name,
                self.host
            );
        } else {
            let port = Port::new(name.clone(), self.host.clone(), kind);
            self.ports_mut(kind).push(port);
        }
        name
    }

    /// Adds an input port and returns its name. See [`Ports::add`].
    pub fn add_input(&mut self, name: Option<&str>) -> String {
        self.add(PortKind::Input, name)
    }

    /// Adds an output port and returns its name. See [`Ports::add`].
    pub fn add_output(&mut self, name: Option<&str>) -> String {
        self.add(PortKind::Output, name)
    }

    /// Like [`Ports::add`], but silently reuses an existing port. Used when wiring couplings.
    pub(crate) fn reuse_or_add(&mut self, kind: PortKind, name: Option<&str>) -> String {
        match name {
            Some(name) if self.contains(kind, name) => name.to_string(),
            _ => self.add(kind, name),
        }
    }

    /// Name of the host model.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// All input ports in declaration order.
    #[must_use]
    pub fn input_ports(&self) -> &[Port<V>] {
        &self.input
    }

    /// All output ports in declaration order.
    #[must_use]
    pub fn output_ports(&self) -> &[Port<V>] {
        &self.output
    }

    /// Looks up a port by direction and name.
    #[must_use]
    pub fn get(&self, kind: PortKind, name: &str) -> Option<&Port<V>> {
        self.ports(kind).iter().find(|p| p.name() == name)
    }

    /// Checks if a port with the given direction and name exists.
    #[must_use]
    pub fn contains(&self, kind: PortKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Ensures that `name` is a port of direction `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPortKind`] if the port exists only in the other direction, and
    /// [`Error::NoSuchPort`] if it does not exist at all.
    pub fn ensure(&self, kind: PortKind, name: &str) -> Result<()> {
        if self.contains(kind, name) {
            return Ok(());
        }
        let other = match kind {
            PortKind::Input => PortKind::Output,
            PortKind::Output => PortKind::Input,
        };
        if self.contains(other, name) {
            Err(Error::InvalidPortKind {
                model: self.host.clone(),
                port: name.to_string(),
                expected: kind,
            })
        } else {
            Err(Error::NoSuchPort {
                model: self.host.clone(),
                port: name.to_string(),
            })
        }
    }

    /// Drops `value` off at output port `name`.
    pub(crate) fn post(&mut self, name: &str, value: V) -> Result<()> {
        self.ensure(PortKind::Output, name)?;
        self.output
            .iter_mut()
            .find(|p| p.name() == name)
            .map_or_else(
                || {
                    Err(Error::NoSuchPort {
                        model: self.host.clone(),
                        port: name.to_string(),
                    })
                },
                |port| port.drop_off(value),
            )
    }

    /// Picks up all pending output values, in port declaration order.
    pub(crate) fn pick_up_all(&mut self) -> Vec<Message<V>> {
        self.output
            .iter_mut()
            .filter_map(|port| port.pick_up().map(|value| Message::new(value, port.name())))
            .collect()
    }

    fn ports(&self, kind: PortKind) -> &Vec<Port<V>> {
        match kind {
            PortKind::Input => &self.input,
            PortKind::Output => &self.output,
        }
    }

    fn ports_mut(&mut self, kind: PortKind) -> &mut Vec<Port<V>> {
        match kind {
            PortKind::Input => &mut self.input,
            PortKind::Output => &mut self.output,
        }
    }
}
