use std::fmt;

/// A payload traveling through a port.
///
/// The port is the name of a port of the model the message is currently addressed to: an input
/// port when a message is delivered to a model, an output port when it leaves one.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<V> {
    payload: V,
    port: String,
}

impl<V> Message<V> {
    /// Constructs a new message.
    pub fn new<S: Into<String>>(payload: V, port: S) -> Self {
        Self {
            payload,
            port: port.into(),
        }
    }

    /// The carried value.
    #[must_use]
    pub fn payload(&self) -> &V {
        &self.payload
    }

    /// Name of the port.
    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Consumes the message and returns the carried value.
    pub fn into_payload(self) -> V {
        self.payload
    }

    /// Readdresses the payload to another port.
    #[must_use]
    pub fn redirect<S: Into<String>>(&self, port: S) -> Self
    where
        V: Clone,
    {
        Self::new(self.payload.clone(), port)
    }
}

impl<V: fmt::Debug> fmt::Display for Message<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.payload, self.port)
    }
}
