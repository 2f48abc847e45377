//! Deployment models: named task slots hosted by a process server

use crate::component::{ComponentModelRef, ModelRef};
use crate::tasks::TaskContextModel;
use std::sync::Arc;

/// One deployed-task slot of a deployment
#[derive(Debug, Clone)]
pub struct DeploymentSlot {
    /// Runtime name of the task spawned in this slot
    pub name: String,
    /// Task model the slot hosts
    pub task_model: Arc<TaskContextModel>,
}

/// A named physical configuration of task slots
///
/// Which process server hosts the deployment is decided when the model is
/// registered with a deployment group; the model itself only names its slots.
#[derive(Debug)]
pub struct DeploymentModel {
    /// Unique model name
    pub name: String,
    /// Task slots spawned when this deployment starts
    pub slots: Vec<DeploymentSlot>,
}

impl DeploymentModel {
    /// Create an empty deployment model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Add a task slot
    pub fn with_slot(
        mut self,
        name: impl Into<String>,
        task_model: Arc<TaskContextModel>,
    ) -> Self {
        self.slots.push(DeploymentSlot {
            name: name.into(),
            task_model,
        });
        self
    }

    /// Find a slot by runtime name
    pub fn find_slot(&self, name: &str) -> Option<&DeploymentSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// All slots whose task model fulfills `model`
    pub fn slots_for(&self, model: &TaskContextModel) -> Vec<&DeploymentSlot> {
        self.slots
            .iter()
            .filter(|s| s.task_model.fulfills_task(model))
            .collect()
    }
}

impl PartialEq for DeploymentModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DeploymentModel {}

/// One deployment slot available for selection, on a named process server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentBinding {
    /// Name of the process server hosting the deployment
    pub process_server: String,
    /// The deployment model
    pub deployment: Arc<DeploymentModel>,
    /// Slot within the deployment
    pub slot_name: String,
}

impl DeploymentBinding {
    /// Task model hosted by the bound slot
    pub fn task_model(&self) -> Option<&Arc<TaskContextModel>> {
        self.deployment
            .find_slot(&self.slot_name)
            .map(|slot| &slot.task_model)
    }
}

impl std::fmt::Display for DeploymentBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}:{}",
            self.process_server, self.deployment.name, self.slot_name
        )
    }
}

/// A collection of deployment bindings available during deployment selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentGroup {
    bindings: Vec<DeploymentBinding>,
}

impl DeploymentGroup {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every slot of `deployment` on `process_server` available
    pub fn use_deployment(
        &mut self,
        process_server: impl Into<String>,
        deployment: Arc<DeploymentModel>,
    ) {
        let process_server = process_server.into();
        for slot in &deployment.slots {
            let binding = DeploymentBinding {
                process_server: process_server.clone(),
                deployment: Arc::clone(&deployment),
                slot_name: slot.name.clone(),
            };
            if !self.bindings.contains(&binding) {
                self.bindings.push(binding);
            }
        }
    }

    /// Whether the group offers no slots
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Add every binding of `other` that is not already present
    pub fn extend(&mut self, other: &DeploymentGroup) {
        for binding in &other.bindings {
            if !self.bindings.contains(binding) {
                self.bindings.push(binding.clone());
            }
        }
    }

    /// All bindings in the group
    pub fn each_binding(&self) -> impl Iterator<Item = &DeploymentBinding> {
        self.bindings.iter()
    }

    /// Bindings whose slot can host a task of `model`
    ///
    /// The hosted task model must fulfill `model`; proxies resolve to any
    /// slot whose task provides the proxied services.
    pub fn find_all_suitable_deployments(
        &self,
        model: &ComponentModelRef,
    ) -> Vec<&DeploymentBinding> {
        let target = ModelRef::Component(model.clone());
        self.bindings
            .iter()
            .filter(|binding| {
                binding.task_model().is_some_and(|hosted| {
                    ComponentModelRef::TaskContext(Arc::clone(hosted)).fulfills(&target)
                })
            })
            .collect()
    }
}
