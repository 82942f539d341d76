use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Direction of a port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Receives messages from the outside of the host model.
    Input,
    /// Sends messages to the outside of the host model.
    Output,
}

/// A message endpoint of a model.
///
/// An output port holds at most one pending value between the moment the model's output function
/// drops it off and the moment its processor picks it up. Inbound values are not stored in the
/// port: they are delivered to the model as a bag of [`Message`](crate::Message)s.
#[derive(Debug, Clone, PartialEq)]
pub struct Port<V> {
    name: String,
    host: String,
    kind: PortKind,
    outgoing: Option<V>,
}

impl<V> Port<V> {
    /// Constructs an empty port named `name` belonging to model `host`.
    pub fn new<N: Into<String>, H: Into<String>>(name: N, host: H, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            kind,
            outgoing: None,
        }
    }

    /// Name of the port, unique within its host and direction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the model the port belongs to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Direction of the port.
    #[must_use]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Checks if the port is an input port.
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.kind == PortKind::Input
    }

    /// Checks if the port is an output port.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.kind == PortKind::Output
    }

    /// Checks if a value is waiting to be picked up.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.outgoing.is_some()
    }

    /// Stores `value` until it is picked up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageAlreadySent`] if a value has already been dropped off and not yet
    /// picked up. The pending value is left untouched.
    pub fn drop_off(&mut self, value: V) -> Result<()> {
        if self.outgoing.is_some() {
            return Err(Error::MessageAlreadySent {
                model: self.host.clone(),
                port: self.name.clone(),
            });
        }
        self.outgoing = Some(value);
        Ok(())
    }

    /// Takes the pending value out of the port, leaving it empty.
    pub fn pick_up(&mut self) -> Option<V> {
        self.outgoing.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_drop_off_twice() {
        let mut port = Port::new("out", "gen", PortKind::Output);
        assert!(!port.is_pending());
        port.drop_off(1).unwrap();
        assert!(port.is_pending());
        match port.drop_off(2) {
            Err(Error::MessageAlreadySent { model, port }) => {
                assert_eq!(model, "gen");
                assert_eq!(port, "out");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(port.pick_up(), Some(1));
        assert_eq!(port.pick_up(), None);
        port.drop_off(3).unwrap();
        assert_eq!(port.pick_up(), Some(3));
    }

    #[test]
    fn test_kind() {
        let port = Port::<()>::new("in", "m", PortKind::Input);
        assert!(port.is_input());
        assert!(!port.is_output());
        assert_eq!(port.kind().to_string(), "input");
    }

    #[quickcheck]
    fn round_trip_leaves_port_empty(value: String) -> bool {
        let mut port = Port::new("out", "m", PortKind::Output);
        port.drop_off(value.clone()).is_ok()
            && port.pick_up() == Some(value)
            && !port.is_pending()
    }
}
