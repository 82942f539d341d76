use std::fmt;

use crate::{Coupling, CouplingKind, Couplings, Error, Model, PortKind, PortRef, Ports, Result};

/// Tie-break function of a coupled model.
///
/// Receives the names of all simultaneously imminent children in declaration order and returns
/// the index of the one to activate.
pub type SelectFn = Box<dyn Fn(&[&str]) -> usize + Send + Sync>;

/// A composite model: children plus the couplings between them.
pub struct CoupledModel<V> {
    name: String,
    parent: Option<String>,
    ports: Ports<V>,
    children: Vec<Model<V>>,
    couplings: Couplings,
    select: Option<SelectFn>,
}

impl<V> fmt::Debug for CoupledModel<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoupledModel")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("ports", &self.ports)
            .field("children", &self.children)
            .field("couplings", &self.couplings)
            .field("custom_select", &self.select.is_some())
            .finish()
    }
}

impl<V> CoupledModel<V> {
    /// Constructs an empty coupled model.
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        Self {
            ports: Ports::new(name.clone()),
            name,
            parent: None,
            children: Vec::new(),
            couplings: Couplings::default(),
            select: None,
        }
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

    /// Adds a child model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateChild`] if a child with the same name already exists.
    pub fn add_child<M: Into<Model<V>>>(&mut self, child: M) -> Result<()> {
        let mut child = child.into();
        if self.child(child.name()).is_some() {
            return Err(Error::DuplicateChild {
                parent: self.name.clone(),
                child: child.name().to_string(),
            });
        }
        child.set_parent(&self.name);
        self.children.push(child);
        Ok(())
    }

    /// Children in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Model<V>] {
        &self.children
    }

    /// Names of the children in declaration order.
    pub fn children_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(Model::name)
    }

    /// Looks up a child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Model<V>> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Looks up a child by name, for modification.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Model<V>> {
        self.children.iter_mut().find(|c| c.name() == name)
    }

    /// All couplings of this model.
    #[must_use]
    pub fn couplings(&self) -> &Couplings {
        &self.couplings
    }

    /// Connects output port `output_port` of child `a` to input port `input_port` of child `b`.
    ///
    /// Ports that do not exist yet are created; omitted names are generated.
    ///
    /// # Errors
    ///
    /// - [`Error::FeedbackLoop`] if `a` and `b` are the same child,
    /// - [`Error::NoSuchChild`] if either child does not exist.
    pub fn add_internal_coupling(
        &mut self,
        a: &str,
        b: &str,
        output_port: Option<&str>,
        input_port: Option<&str>,
    ) -> Result<()> {
        if a == b {
            return Err(Error::FeedbackLoop {
                model: a.to_string(),
            });
        }
        self.ensure_child(b)?;
        let source = self
            .ensure_child_mut(a)?
            .ports_mut()
            .reuse_or_add(PortKind::Output, output_port);
        let destination = self
            .ensure_child_mut(b)?
            .ports_mut()
            .reuse_or_add(PortKind::Input, input_port);
        self.couplings.add(
            CouplingKind::Internal,
            Coupling::new(PortRef::new(a, source), PortRef::new(b, destination)),
        );
        Ok(())
    }

    /// Connects input port `input_port` of this model to input port `child_port` of `child`.
    ///
    /// Ports that do not exist yet are created; omitted names are generated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchChild`] if the child does not exist.
    pub fn add_external_input_coupling(
        &mut self,
        child: &str,
        input_port: Option<&str>,
        child_port: Option<&str>,
    ) -> Result<()> {
        let destination = self
            .ensure_child_mut(child)?
            .ports_mut()
            .reuse_or_add(PortKind::Input, child_port);
        let source = self.ports.reuse_or_add(PortKind::Input, input_port);
        self.couplings.add(
            CouplingKind::ExternalInput,
            Coupling::new(
                PortRef::new(self.name.clone(), source),
                PortRef::new(child, destination),
            ),
        );
        Ok(())
    }

    /// Connects output port `child_port` of `child` to output port `output_port` of this model.
    ///
    /// Ports that do not exist yet are created; omitted names are generated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchChild`] if the child does not exist.
    pub fn add_external_output_coupling(
        &mut self,
        child: &str,
        output_port: Option<&str>,
        child_port: Option<&str>,
    ) -> Result<()> {
        let source = self
            .ensure_child_mut(child)?
            .ports_mut()
            .reuse_or_add(PortKind::Output, child_port);
        let destination = self.ports.reuse_or_add(PortKind::Output, output_port);
        self.couplings.add(
            CouplingKind::ExternalOutput,
            Coupling::new(
                PortRef::new(child, source),
                PortRef::new(self.name.clone(), destination),
            ),
        );
        Ok(())
    }

    /// Overrides the tie-break function used when several children are imminent at once.
    ///
    /// By default, the first imminent child in declaration order is selected.
    pub fn set_select<F>(&mut self, select: F)
    where
        F: Fn(&[&str]) -> usize + Send + Sync + 'static,
    {
        self.select = Some(Box::new(select));
    }

    /// Builder version of [`CoupledModel::set_select`].
    #[must_use]
    pub fn with_select<F>(mut self, select: F) -> Self
    where
        F: Fn(&[&str]) -> usize + Send + Sync + 'static,
    {
        self.set_select(select);
        self
    }

    /// Ensures `name` is an input port of the model.
    ///
    /// # Errors
    ///
    /// See [`Ports::ensure`].
    pub fn ensure_input_port(&self, name: &str) -> Result<()> {
        self.ports.ensure(PortKind::Input, name)
    }

    pub(crate) fn into_parts(self) -> CoupledParts<V> {
        CoupledParts {
            name: self.name,
            ports: self.ports,
            children: self.children,
            couplings: self.couplings,
            select: self.select,
        }
    }

    fn ensure_child(&self, name: &str) -> Result<&Model<V>> {
        let parent = &self.name;
        self.child(name).ok_or_else(|| Error::NoSuchChild {
            parent: parent.clone(),
            child: name.to_string(),
        })
    }

    fn ensure_child_mut(&mut self, name: &str) -> Result<&mut Model<V>> {
        let parent = self.name.clone();
        self.child_mut(name).ok_or_else(|| Error::NoSuchChild {
            parent,
            child: name.to_string(),
        })
    }
}

/// A coupled model taken apart, ready to be turned into a coordinator.
pub(crate) struct CoupledParts<V> {
    pub name: String,
    pub ports: Ports<V>,
    pub children: Vec<Model<V>>,
    pub couplings: Couplings,
    pub select: Option<SelectFn>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{AtomicBehavior, AtomicModel};
    use rstest::{fixture, rstest};

    #[derive(Debug, Clone)]
    struct Passive;

    impl AtomicBehavior<()> for Passive {}

    #[fixture]
    fn model() -> CoupledModel<()> {
        let mut model = CoupledModel::new("root");
        model.add_child(AtomicModel::new("a", Passive)).unwrap();
        model.add_child(AtomicModel::new("b", Passive)).unwrap();
        model
    }

    #[rstest]
    fn test_children(model: CoupledModel<()>) {
        assert_eq!(model.children_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(model.child("a").and_then(Model::parent), Some("root"));
        assert!(model.child("c").is_none());
    }

    #[rstest]
    fn test_duplicate_child(mut model: CoupledModel<()>) {
        assert!(matches!(
            model.add_child(AtomicModel::new("a", Passive)),
            Err(Error::DuplicateChild { .. })
        ));
    }

    #[rstest]
    fn test_internal_coupling_creates_ports(mut model: CoupledModel<()>) {
        model.add_internal_coupling("a", "b", None, None).unwrap();
        let a = model.child("a").unwrap();
        let b = model.child("b").unwrap();
        assert!(a.ports().contains(PortKind::Output, "output_0"));
        assert!(b.ports().contains(PortKind::Input, "input_0"));
        let couplings = model.couplings().get(CouplingKind::Internal);
        assert_eq!(couplings.len(), 1);
        assert_eq!(couplings[0].to_string(), "[a@output_0 -> b@input_0]");
    }

    #[rstest]
    fn test_feedback_loop(mut model: CoupledModel<()>) {
        assert!(matches!(
            model.add_internal_coupling("a", "a", None, None),
            Err(Error::FeedbackLoop { .. })
        ));
    }

    #[rstest]
    fn test_unknown_child(mut model: CoupledModel<()>) {
        assert!(matches!(
            model.add_internal_coupling("a", "x", None, None),
            Err(Error::NoSuchChild { .. })
        ));
        assert!(matches!(
            model.add_external_input_coupling("x", None, None),
            Err(Error::NoSuchChild { .. })
        ));
        assert!(matches!(
            model.add_external_output_coupling("x", None, None),
            Err(Error::NoSuchChild { .. })
        ));
        assert!(model.couplings().is_empty());
    }

    #[rstest]
    fn test_external_couplings(mut model: CoupledModel<()>) {
        model
            .add_external_input_coupling("a", Some("in"), Some("in"))
            .unwrap();
        model
            .add_external_output_coupling("b", Some("out"), Some("out"))
            .unwrap();
        assert!(model.ensure_input_port("in").is_ok());
        assert!(model.ports().contains(PortKind::Output, "out"));
        assert_eq!(
            model.couplings().get(CouplingKind::ExternalInput)[0].to_string(),
            "[root@in -> a@in]"
        );
        assert_eq!(
            model.couplings().get(CouplingKind::ExternalOutput)[0].to_string(),
            "[b@out -> root@out]"
        );
    }
}
