//! The model catalog and its descriptor input interface
//!
//! The catalog is fed by an upstream loader (oroGen-style) with plain
//! descriptor records; it resolves names into the in-memory model graph and
//! hands out [`ModelRef`]s. It is an explicit value, threaded through the
//! planner by the caller.

use crate::component::{verify_model_set_consistency, ComponentModelRef, ModelRef};
use crate::compositions::CompositionModel;
use crate::deployments::{DeploymentModel, DeploymentSlot};
use crate::ports::{Port, PortDirection, TypeRegistry};
use crate::services::DataServiceModel;
use crate::tasks::{ArgumentDecl, ProvidedService, TaskContextModel};
use crate::{Error, Result};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Port record of a model descriptor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PortDescriptor {
    /// Port name
    pub name: String,
    /// Data direction
    pub direction: PortDirection,
    /// Transported data type
    pub data_type: String,
}

/// Argument record of a task descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ArgumentDescriptor {
    /// Argument name
    pub name: String,
    /// Whether the argument must be set before deployment
    #[serde(default = "default_true")]
    pub required: bool,
    /// Default value applied at instantiation
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// Provided-service record of a task descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProvidesDescriptor {
    /// Name of the provided service
    pub service: String,
    /// Service port name → task port name
    #[serde(default)]
    pub port_mappings: IndexMap<String, String>,
}

/// Data-service descriptor supplied by the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ServiceDescriptor {
    /// Service name
    pub name: String,
    /// Names of extended services
    #[serde(default)]
    pub extends: Vec<String>,
    /// Abstract ports of the service
    #[serde(default)]
    pub ports: Vec<PortDescriptor>,
    /// Whether the service is a framework root marker
    #[serde(default)]
    pub root: bool,
}

/// Task-context descriptor supplied by the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TaskDescriptor {
    /// Model name
    pub name: String,
    /// Name of the parent model
    #[serde(default)]
    pub supermodel: Option<String>,
    /// Whether the model is abstract
    #[serde(default)]
    pub abstract_model: bool,
    /// Ports declared on the model
    #[serde(default)]
    pub ports: Vec<PortDescriptor>,
    /// Arguments declared on the model
    #[serde(default)]
    pub arguments: Vec<ArgumentDescriptor>,
    /// Services provided by the model
    #[serde(default)]
    pub provides: Vec<ProvidesDescriptor>,
}

/// Slot record of a deployment descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SlotDescriptor {
    /// Runtime name of the deployed task
    pub name: String,
    /// Name of the task model hosted by the slot
    pub task_model: String,
}

/// Deployment descriptor supplied by the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentDescriptor {
    /// Deployment name
    pub name: String,
    /// Task slots of the deployment
    #[serde(default)]
    pub slots: Vec<SlotDescriptor>,
}

/// Registry of every model family plus the type-compatibility table
#[derive(Debug, Default)]
pub struct ModelCatalog {
    services: IndexMap<String, Arc<DataServiceModel>>,
    tasks: IndexMap<String, Arc<TaskContextModel>>,
    compositions: IndexMap<String, Arc<CompositionModel>>,
    deployments: IndexMap<String, Arc<DeploymentModel>>,
    types: TypeRegistry,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The data-type compatibility table
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Mutable access to the data-type compatibility table
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Register a data service from its descriptor
    pub fn register_service(&mut self, descriptor: ServiceDescriptor) -> Result<Arc<DataServiceModel>> {
        let mut model = DataServiceModel::new(&descriptor.name);
        model.root = descriptor.root;
        for parent in &descriptor.extends {
            let parent = self
                .services
                .get(parent)
                .ok_or_else(|| Error::UnknownModel(parent.clone()))?;
            model.extends.push(Arc::clone(parent));
        }
        for port in descriptor.ports {
            model.ports.push(Port {
                name: port.name,
                direction: port.direction,
                data_type: port.data_type,
            });
        }
        self.add_service_model(Arc::new(model))
    }

    /// Register an already-built data-service model
    pub fn add_service_model(&mut self, model: Arc<DataServiceModel>) -> Result<Arc<DataServiceModel>> {
        if self.services.contains_key(&model.name) {
            return Err(Error::DuplicateModel(model.name.clone()));
        }
        debug!(service = %model.name, "registered data service");
        self.services.insert(model.name.clone(), Arc::clone(&model));
        Ok(model)
    }

    /// Register a task context from its descriptor
    pub fn register_task(&mut self, descriptor: TaskDescriptor) -> Result<Arc<TaskContextModel>> {
        let mut model = TaskContextModel::new(&descriptor.name);
        model.abstract_model = descriptor.abstract_model;
        if let Some(parent) = &descriptor.supermodel {
            let parent = self
                .tasks
                .get(parent)
                .ok_or_else(|| Error::UnknownModel(parent.clone()))?;
            model.supermodel = Some(Arc::clone(parent));
        }
        for port in descriptor.ports {
            model.ports.push(Port {
                name: port.name,
                direction: port.direction,
                data_type: port.data_type,
            });
        }
        for argument in descriptor.arguments {
            model.arguments.push(ArgumentDecl {
                name: argument.name,
                required: argument.required && argument.default.is_none(),
                default: argument.default,
            });
        }
        for provides in descriptor.provides {
            let service = self
                .services
                .get(&provides.service)
                .ok_or_else(|| Error::UnknownModel(provides.service.clone()))?;
            model.provides.push(ProvidedService {
                service: Arc::clone(service),
                port_mappings: provides.port_mappings,
            });
        }
        self.add_task_model(Arc::new(model))
    }

    /// Register an already-built task model
    pub fn add_task_model(&mut self, model: Arc<TaskContextModel>) -> Result<Arc<TaskContextModel>> {
        if self.tasks.contains_key(&model.name) {
            return Err(Error::DuplicateModel(model.name.clone()));
        }
        debug!(task = %model.name, "registered task context");
        self.tasks.insert(model.name.clone(), Arc::clone(&model));
        Ok(model)
    }

    /// Register a composition model, validating its child requirements
    pub fn register_composition(&mut self, model: CompositionModel) -> Result<Arc<CompositionModel>> {
        if self.compositions.contains_key(&model.name) {
            return Err(Error::DuplicateModel(model.name.clone()));
        }
        for child in model.each_child().values() {
            verify_model_set_consistency(&child.required_models)?;
        }
        let model = Arc::new(model);
        debug!(composition = %model.name, "registered composition");
        self.compositions
            .insert(model.name.clone(), Arc::clone(&model));
        Ok(model)
    }

    /// Register a deployment from its descriptor
    pub fn register_deployment(&mut self, descriptor: DeploymentDescriptor) -> Result<Arc<DeploymentModel>> {
        if self.deployments.contains_key(&descriptor.name) {
            return Err(Error::DuplicateModel(descriptor.name.clone()));
        }
        let mut model = DeploymentModel::new(&descriptor.name);
        for slot in descriptor.slots {
            let task_model = self
                .tasks
                .get(&slot.task_model)
                .ok_or_else(|| Error::UnknownModel(slot.task_model.clone()))?;
            model.slots.push(DeploymentSlot {
                name: slot.name,
                task_model: Arc::clone(task_model),
            });
        }
        let model = Arc::new(model);
        debug!(deployment = %model.name, slots = model.slots.len(), "registered deployment");
        self.deployments
            .insert(model.name.clone(), Arc::clone(&model));
        Ok(model)
    }

    /// Register an already-built deployment model
    pub fn add_deployment_model(&mut self, model: Arc<DeploymentModel>) -> Result<Arc<DeploymentModel>> {
        if self.deployments.contains_key(&model.name) {
            return Err(Error::DuplicateModel(model.name.clone()));
        }
        self.deployments
            .insert(model.name.clone(), Arc::clone(&model));
        Ok(model)
    }

    /// Find a data service by name
    pub fn find_service(&self, name: &str) -> Option<Arc<DataServiceModel>> {
        self.services.get(name).cloned()
    }

    /// Find a task model by name
    pub fn find_task(&self, name: &str) -> Option<Arc<TaskContextModel>> {
        self.tasks.get(name).cloned()
    }

    /// Find a composition by name
    pub fn find_composition(&self, name: &str) -> Option<Arc<CompositionModel>> {
        self.compositions.get(name).cloned()
    }

    /// Find a deployment by name
    pub fn find_deployment(&self, name: &str) -> Option<Arc<DeploymentModel>> {
        self.deployments.get(name).cloned()
    }

    /// Resolve a bare name against every model family
    ///
    /// Tasks shadow compositions, compositions shadow services; the loader
    /// keeps names unique in practice.
    pub fn resolve_name(&self, name: &str) -> Option<ModelRef> {
        if let Some(task) = self.tasks.get(name) {
            return Some(ModelRef::Component(ComponentModelRef::TaskContext(
                Arc::clone(task),
            )));
        }
        if let Some(composition) = self.compositions.get(name) {
            return Some(ModelRef::Component(ComponentModelRef::Composition(
                Arc::clone(composition),
            )));
        }
        self.services
            .get(name)
            .map(|service| ModelRef::Service(Arc::clone(service)))
    }

    /// All registered deployments, in registration order
    pub fn each_deployment(&self) -> impl Iterator<Item = &Arc<DeploymentModel>> {
        self.deployments.values()
    }
}
