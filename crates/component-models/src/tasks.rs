//! Task-context models: leaf components with ports and arguments

use crate::ports::Port;
use crate::services::DataServiceModel;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Declaration of a task argument
#[derive(Debug, Clone)]
pub struct ArgumentDecl {
    /// Argument name
    pub name: String,
    /// Whether the argument must be set before the task can be deployed
    pub required: bool,
    /// Default value applied at instantiation when nothing sets the argument
    pub default: Option<Value>,
}

impl ArgumentDecl {
    /// A required argument with no default
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    /// An optional argument with a default value
    pub fn with_default(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: Some(default),
        }
    }
}

/// A data service provided by a component model
///
/// `port_mappings` maps the service's abstract port names to the concrete
/// port names of the providing component. Ports with identical names need no
/// entry.
#[derive(Debug, Clone)]
pub struct ProvidedService {
    /// The provided service
    pub service: Arc<DataServiceModel>,
    /// Service port name → component port name
    pub port_mappings: IndexMap<String, String>,
}

impl ProvidedService {
    /// Provide a service whose port names match the component's
    pub fn new(service: Arc<DataServiceModel>) -> Self {
        Self {
            service,
            port_mappings: IndexMap::new(),
        }
    }

    /// Add a port renaming from the service name to the component name
    pub fn with_port_mapping(
        mut self,
        service_port: impl Into<String>,
        component_port: impl Into<String>,
    ) -> Self {
        self.port_mappings
            .insert(service_port.into(), component_port.into());
        self
    }

    /// Map a service port name to the component port name
    pub fn map_port<'a>(&'a self, service_port: &'a str) -> &'a str {
        self.port_mappings
            .get(service_port)
            .map(String::as_str)
            .unwrap_or(service_port)
    }
}

/// A leaf component model: typed ports, arguments, provided services
#[derive(Debug)]
pub struct TaskContextModel {
    /// Unique model name
    pub name: String,
    /// Parent model in the subtyping chain
    pub supermodel: Option<Arc<TaskContextModel>>,
    /// Abstract models cannot be deployed directly
    pub abstract_model: bool,
    /// Root models are framework markers, too general to drive default
    /// selection
    pub root: bool,
    /// Ports declared on this model (inherited ports excluded)
    pub ports: Vec<Port>,
    /// Arguments declared on this model (inherited arguments excluded)
    pub arguments: Vec<ArgumentDecl>,
    /// Services provided by this model (inherited provisions excluded)
    pub provides: Vec<ProvidedService>,
}

impl TaskContextModel {
    /// Create a new concrete task model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supermodel: None,
            abstract_model: false,
            root: false,
            ports: Vec::new(),
            arguments: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Mark this model abstract
    pub fn as_abstract(mut self) -> Self {
        self.abstract_model = true;
        self
    }

    /// Mark this model as a root marker
    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Set the parent model
    pub fn with_supermodel(mut self, supermodel: Arc<TaskContextModel>) -> Self {
        self.supermodel = Some(supermodel);
        self
    }

    /// Declare a port
    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    /// Declare an argument
    pub fn with_argument(mut self, argument: ArgumentDecl) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Declare a provided service
    pub fn with_provides(mut self, provided: ProvidedService) -> Self {
        self.provides.push(provided);
        self
    }

    /// Whether this model is `other` or a submodel of it
    pub fn fulfills_task(&self, other: &TaskContextModel) -> bool {
        if self.name == other.name {
            return true;
        }
        match &self.supermodel {
            Some(parent) => parent.fulfills_task(other),
            None => false,
        }
    }

    /// Whether this model provides `service`, directly or through inheritance
    pub fn fulfills_service(&self, service: &DataServiceModel) -> bool {
        self.find_provided_service(service).is_some()
    }

    /// Find the provision that fulfills `service`, walking the supermodel chain
    pub fn find_provided_service(&self, service: &DataServiceModel) -> Option<&ProvidedService> {
        if let Some(provided) = self
            .provides
            .iter()
            .find(|p| p.service.fulfills(service))
        {
            return Some(provided);
        }
        self.supermodel
            .as_deref()
            .and_then(|parent| parent.find_provided_service(service))
    }

    /// All provisions fulfilling `service`; used to detect ambiguity when a
    /// service selection must pick exactly one
    pub fn find_all_provided_services(&self, service: &DataServiceModel) -> Vec<&ProvidedService> {
        let mut result: Vec<&ProvidedService> = self
            .provides
            .iter()
            .filter(|p| p.service.fulfills(service))
            .collect();
        if let Some(parent) = self.supermodel.as_deref() {
            for provided in parent.find_all_provided_services(service) {
                if !result.iter().any(|p| p.service.name == provided.service.name) {
                    result.push(provided);
                }
            }
        }
        result
    }

    /// The supermodel chain, self first
    pub fn each_supermodel(self: &Arc<Self>) -> Vec<Arc<TaskContextModel>> {
        let mut result = vec![Arc::clone(self)];
        let mut current = self.supermodel.clone();
        while let Some(model) = current {
            current = model.supermodel.clone();
            result.push(model);
        }
        result
    }

    /// All services provided by this model and its supermodels
    pub fn each_provided_service(&self) -> Vec<&ProvidedService> {
        let mut result: Vec<&ProvidedService> = self.provides.iter().collect();
        if let Some(parent) = self.supermodel.as_deref() {
            for provided in parent.each_provided_service() {
                if !result.iter().any(|p| p.service.name == provided.service.name) {
                    result.push(provided);
                }
            }
        }
        result
    }

    /// Find a port by name, walking the supermodel chain
    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.supermodel.as_deref().and_then(|m| m.find_port(name)))
    }

    /// All ports visible on this model, declared-before-inherited
    pub fn each_port(&self) -> Vec<&Port> {
        let mut result: Vec<&Port> = self.ports.iter().collect();
        if let Some(parent) = self.supermodel.as_deref() {
            for port in parent.each_port() {
                if !result.iter().any(|p| p.name == port.name) {
                    result.push(port);
                }
            }
        }
        result
    }

    /// All argument declarations, declared-before-inherited
    pub fn each_argument(&self) -> Vec<&ArgumentDecl> {
        let mut result: Vec<&ArgumentDecl> = self.arguments.iter().collect();
        if let Some(parent) = self.supermodel.as_deref() {
            for argument in parent.each_argument() {
                if !result.iter().any(|a| a.name == argument.name) {
                    result.push(argument);
                }
            }
        }
        result
    }
}

// Model identity is the registered name.
impl PartialEq for TaskContextModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TaskContextModel {}
