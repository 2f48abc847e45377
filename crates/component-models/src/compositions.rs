//! Composition models: named children wired through explicit connections

use crate::component::ModelRef;
use crate::ports::{Port, PortDirection};
use crate::tasks::ProvidedService;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Transport policy of a single port-to-port connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionPolicy {
    /// Last-sample semantics: the reader sees the most recent value
    Data,
    /// Bounded FIFO of the given capacity
    Buffer {
        /// Number of samples the buffer can hold
        size: usize,
    },
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        ConnectionPolicy::Data
    }
}

/// One port pair within a declared child-to-child connection
#[derive(Debug, Clone)]
pub struct PortPair {
    /// Output port name on the source child
    pub source_port: String,
    /// Input port name on the sink child
    pub sink_port: String,
    /// Transport policy of this pair
    pub policy: ConnectionPolicy,
}

/// A declared connection between two children of a composition
#[derive(Debug, Clone)]
pub struct ChildConnection {
    /// Name of the child producing data
    pub source_child: String,
    /// Name of the child consuming data
    pub sink_child: String,
    /// Connected port pairs
    pub ports: Vec<PortPair>,
}

/// A child slot of a composition
#[derive(Debug, Clone)]
pub struct CompositionChild {
    /// Child name, unique within the composition
    pub name: String,
    /// Models the selected component must fulfill, all of them
    pub required_models: Vec<ModelRef>,
    /// Optional children are dropped when their selection stays abstract
    pub optional: bool,
}

impl CompositionChild {
    /// Create a child slot requiring the given models
    pub fn new(name: impl Into<String>, required_models: Vec<ModelRef>) -> Self {
        Self {
            name: name.into(),
            required_models,
            optional: false,
        }
    }

    /// Mark the child optional
    pub fn as_optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A composition port forwarded from one of its children
#[derive(Debug, Clone)]
pub struct ExportedPort {
    /// Port name on the composition interface
    pub name: String,
    /// Direction on the composition interface
    pub direction: PortDirection,
    /// Data type, copied from the child port
    pub data_type: String,
    /// Child owning the forwarded port
    pub child: String,
    /// Port name on the child
    pub child_port: String,
}

/// A specialization of a composition model
///
/// When the selections made for the constrained children all fulfill the
/// required models, instantiation switches to the specialized composition.
#[derive(Debug, Clone)]
pub struct Specialization {
    /// Per-child model constraints
    pub constraints: IndexMap<String, Vec<ModelRef>>,
    /// The composition model to instantiate instead
    pub specialized: Arc<CompositionModel>,
}

impl Specialization {
    /// Number of constrained children; more constraints means more specific
    pub fn weight(&self) -> usize {
        self.constraints.values().map(Vec::len).sum()
    }
}

/// A named group of child components with declared connections
#[derive(Debug)]
pub struct CompositionModel {
    /// Unique model name
    pub name: String,
    /// Parent composition in the subtyping chain
    pub supermodel: Option<Arc<CompositionModel>>,
    /// Child slots declared on this model (inherited slots excluded)
    pub children: IndexMap<String, CompositionChild>,
    /// Explicit child-to-child connections
    pub connections: Vec<ChildConnection>,
    /// Ports forwarded from children to the composition interface
    pub exports: Vec<ExportedPort>,
    /// Specializations keyed on child selections
    pub specializations: Vec<Specialization>,
    /// Services provided by the composition itself
    pub provides: Vec<ProvidedService>,
}

impl CompositionModel {
    /// Create an empty composition model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supermodel: None,
            children: IndexMap::new(),
            connections: Vec::new(),
            exports: Vec::new(),
            specializations: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Set the parent composition
    pub fn with_supermodel(mut self, supermodel: Arc<CompositionModel>) -> Self {
        self.supermodel = Some(supermodel);
        self
    }

    /// Declare a child slot
    pub fn with_child(mut self, child: CompositionChild) -> Self {
        self.children.insert(child.name.clone(), child);
        self
    }

    /// Declare an explicit connection
    pub fn with_connection(mut self, connection: ChildConnection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Export a child port on the composition interface
    pub fn with_export(mut self, export: ExportedPort) -> Self {
        self.exports.push(export);
        self
    }

    /// Declare a specialization
    pub fn with_specialization(mut self, specialization: Specialization) -> Self {
        self.specializations.push(specialization);
        self
    }

    /// Declare a provided service
    pub fn with_provides(mut self, provided: ProvidedService) -> Self {
        self.provides.push(provided);
        self
    }

    /// Whether this model is `other` or a specialization/submodel of it
    pub fn fulfills_composition(&self, other: &CompositionModel) -> bool {
        if self.name == other.name {
            return true;
        }
        match &self.supermodel {
            Some(parent) => parent.fulfills_composition(other),
            None => false,
        }
    }

    /// Child slots visible on this model, own slots overriding inherited ones
    pub fn each_child(&self) -> IndexMap<String, &CompositionChild> {
        let mut result: IndexMap<String, &CompositionChild> = IndexMap::new();
        for (name, child) in &self.children {
            result.insert(name.clone(), child);
        }
        if let Some(parent) = self.supermodel.as_deref() {
            for (name, child) in parent.each_child() {
                result.entry(name).or_insert(child);
            }
        }
        result
    }

    /// Find a child slot by name, walking the supermodel chain
    pub fn find_child(&self, name: &str) -> Option<&CompositionChild> {
        self.children
            .get(name)
            .or_else(|| self.supermodel.as_deref().and_then(|m| m.find_child(name)))
    }

    /// Connections visible on this model, inherited ones first
    pub fn each_connection(&self) -> Vec<&ChildConnection> {
        let mut result = Vec::new();
        if let Some(parent) = self.supermodel.as_deref() {
            result.extend(parent.each_connection());
        }
        result.extend(self.connections.iter());
        result
    }

    /// Exports visible on this model, inherited ones first
    pub fn each_export(&self) -> Vec<&ExportedPort> {
        let mut result = Vec::new();
        if let Some(parent) = self.supermodel.as_deref() {
            result.extend(parent.each_export());
        }
        result.extend(self.exports.iter());
        result
    }

    /// The composition interface as plain ports
    pub fn each_port(&self) -> Vec<Port> {
        self.each_export()
            .into_iter()
            .map(|export| Port {
                name: export.name.clone(),
                direction: export.direction,
                data_type: export.data_type.clone(),
            })
            .collect()
    }

    /// Find an exported port by composition-interface name
    pub fn find_export(&self, name: &str) -> Option<&ExportedPort> {
        self.each_export().into_iter().find(|e| e.name == name)
    }
}

// Model identity is the registered name.
impl PartialEq for CompositionModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CompositionModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentModelRef, ModelRef};
    use crate::tasks::TaskContextModel;

    fn task_ref(name: &str) -> ModelRef {
        ModelRef::Component(ComponentModelRef::TaskContext(Arc::new(
            TaskContextModel::new(name),
        )))
    }

    #[test]
    fn test_child_inheritance_and_override() {
        let base = Arc::new(
            CompositionModel::new("pipeline")
                .with_child(CompositionChild::new("source", vec![task_ref("producer")]))
                .with_child(CompositionChild::new("sink", vec![task_ref("consumer")])),
        );
        let specialized = CompositionModel::new("fast_pipeline")
            .with_supermodel(Arc::clone(&base))
            .with_child(CompositionChild::new(
                "source",
                vec![task_ref("fast_producer")],
            ));

        let children = specialized.each_child();
        assert_eq!(children.len(), 2);
        match &children["source"].required_models[0] {
            ModelRef::Component(model) => assert_eq!(model.name(), "fast_producer"),
            ModelRef::Service(_) => panic!("expected component requirement"),
        }
        assert!(specialized.fulfills_composition(&base));
    }

    #[test]
    fn test_exported_ports_become_interface() {
        let composition = CompositionModel::new("pipeline").with_export(ExportedPort {
            name: "result".to_string(),
            direction: PortDirection::Output,
            data_type: "/double".to_string(),
            child: "sink".to_string(),
            child_port: "out".to_string(),
        });

        let ports = composition.each_port();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "result");
        assert_eq!(ports[0].direction, PortDirection::Output);
    }
}
