use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Reference to a port of a model by names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "{}@{}", model, port)]
pub struct PortRef {
    /// Name of the host model.
    pub model: String,
    /// Name of the port.
    pub port: String,
}

impl PortRef {
    /// Constructs a new port reference.
    pub fn new<M: Into<String>, P: Into<String>>(model: M, port: P) -> Self {
        Self {
            model: model.into(),
            port: port.into(),
        }
    }
}

/// The set a coupling belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CouplingKind {
    /// From an input port of the coupled model to an input port of a child (EIC).
    ExternalInput,
    /// From an output port of a child to an output port of the coupled model (EOC).
    ExternalOutput,
    /// From an output port of a child to an input port of a sibling (IC).
    Internal,
}

/// A directed connection between two ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "[{} -> {}]", source, destination)]
pub struct Coupling {
    /// The port messages come from.
    pub source: PortRef,
    /// The port messages go to.
    pub destination: PortRef,
}

impl Coupling {
    /// Constructs a new coupling.
    #[must_use]
    pub fn new(source: PortRef, destination: PortRef) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// The three coupling sets of a coupled model, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Couplings {
    external_input: Vec<Coupling>,
    external_output: Vec<Coupling>,
    internal: Vec<Coupling>,
}

impl Couplings {
    /// Adds a coupling to the set of the given kind.
    ///
    /// Returns `false` if the identical coupling has already been added, in which case nothing
    /// changes.
    pub fn add(&mut self, kind: CouplingKind, coupling: Coupling) -> bool {
        let set = match kind {
            CouplingKind::ExternalInput => &mut self.external_input,
            CouplingKind::ExternalOutput => &mut self.external_output,
            CouplingKind::Internal => &mut self.internal,
        };
        if set.contains(&coupling) {
            false
        } else {
            set.push(coupling);
            true
        }
    }

    /// Couplings of one kind.
    #[must_use]
    pub fn get(&self, kind: CouplingKind) -> &[Coupling] {
        match kind {
            CouplingKind::ExternalInput => &self.external_input,
            CouplingKind::ExternalOutput => &self.external_output,
            CouplingKind::Internal => &self.internal,
        }
    }

    /// Iterates over all couplings together with their kinds.
    pub fn iter(&self) -> impl Iterator<Item = (CouplingKind, &Coupling)> {
        self.external_input
            .iter()
            .map(|c| (CouplingKind::ExternalInput, c))
            .chain(
                self.external_output
                    .iter()
                    .map(|c| (CouplingKind::ExternalOutput, c)),
            )
            .chain(self.internal.iter().map(|c| (CouplingKind::Internal, c)))
    }

    /// Total number of couplings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.external_input.len() + self.external_output.len() + self.internal.len()
    }

    /// Checks if there are no couplings at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
