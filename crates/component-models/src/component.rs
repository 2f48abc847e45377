//! Component model references and the `fulfills` partial order
//!
//! The planner manipulates models of four component families (task
//! contexts, compositions, deployments, synthesized proxies) plus data
//! services.
//! [`ComponentModelRef`] and [`ModelRef`] are the cheap-clone handles used
//! everywhere; identity is the model name.

use crate::compositions::CompositionModel;
use crate::deployments::DeploymentModel;
use crate::ports::Port;
use crate::services::DataServiceModel;
use crate::tasks::{ProvidedService, TaskContextModel};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A synthetic model standing for "some task fulfilling these models"
///
/// Proxies are produced by the dependency-injection resolver when a set of
/// requirements selects no concrete component class. They keep planning
/// going until the deployer binds a real task.
#[derive(Debug)]
pub struct ProxyTaskModel {
    /// Synthesized name, derived from the proxied models
    pub name: String,
    /// Narrowest task-context constraint among the proxied models
    pub task_model: Option<Arc<TaskContextModel>>,
    /// Data services the eventual task must provide
    pub services: Vec<Arc<DataServiceModel>>,
}

impl ProxyTaskModel {
    /// Synthesize a proxy fulfilling the union of `models`
    ///
    /// The component constraints in `models` must be consistent (one must
    /// fulfill the others); the most specific one becomes the proxy's task
    /// constraint.
    pub fn synthesize(models: &[ModelRef]) -> Result<Self> {
        verify_model_set_consistency(models)?;

        let mut task_model: Option<Arc<TaskContextModel>> = None;
        let mut services: Vec<Arc<DataServiceModel>> = Vec::new();
        for model in models {
            match model {
                ModelRef::Component(ComponentModelRef::TaskContext(task)) => {
                    let narrower = match &task_model {
                        Some(current) => task.fulfills_task(current),
                        None => true,
                    };
                    if narrower {
                        task_model = Some(Arc::clone(task));
                    }
                }
                ModelRef::Component(ComponentModelRef::Proxy(proxy)) => {
                    if let Some(task) = &proxy.task_model {
                        let narrower = match &task_model {
                            Some(current) => task.fulfills_task(current),
                            None => true,
                        };
                        if narrower {
                            task_model = Some(Arc::clone(task));
                        }
                    }
                    for service in &proxy.services {
                        if !services.iter().any(|s| s.name == service.name) {
                            services.push(Arc::clone(service));
                        }
                    }
                }
                ModelRef::Component(ComponentModelRef::Composition(_))
                | ModelRef::Component(ComponentModelRef::Deployment(_)) => {
                    return Err(Error::invalid_descriptor(format!(
                        "cannot synthesize a task proxy for {}",
                        model.name()
                    )));
                }
                ModelRef::Service(service) => {
                    if !services.iter().any(|s| s.name == service.name) {
                        services.push(Arc::clone(service));
                    }
                }
            }
        }

        let mut parts: Vec<&str> = Vec::new();
        if let Some(task) = &task_model {
            parts.push(&task.name);
        }
        parts.extend(services.iter().map(|s| s.name.as_str()));
        Ok(Self {
            name: format!("proxy({})", parts.join(",")),
            task_model,
            services,
        })
    }

    /// Ports promised by the proxied models, service ports first
    pub fn each_port(&self) -> Vec<Port> {
        let mut result: Vec<Port> = Vec::new();
        for service in &self.services {
            for port in &service.ports {
                if !result.iter().any(|p| p.name == port.name) {
                    result.push(port.clone());
                }
            }
        }
        if let Some(task) = &self.task_model {
            for port in task.each_port() {
                if !result.iter().any(|p| p.name == port.name) {
                    result.push(port.clone());
                }
            }
        }
        result
    }
}

/// Cheap-clone reference to a component model
#[derive(Debug, Clone)]
pub enum ComponentModelRef {
    /// A leaf task model
    TaskContext(Arc<TaskContextModel>),
    /// A composition model
    Composition(Arc<CompositionModel>),
    /// A deployment model; its tasks are the execution agents
    Deployment(Arc<DeploymentModel>),
    /// A synthesized placeholder model
    Proxy(Arc<ProxyTaskModel>),
}

impl ComponentModelRef {
    /// The model name
    pub fn name(&self) -> &str {
        match self {
            ComponentModelRef::TaskContext(m) => &m.name,
            ComponentModelRef::Composition(m) => &m.name,
            ComponentModelRef::Deployment(m) => &m.name,
            ComponentModelRef::Proxy(m) => &m.name,
        }
    }

    /// Whether tasks of this model are placeholders that cannot run
    pub fn is_abstract(&self) -> bool {
        match self {
            ComponentModelRef::TaskContext(m) => m.abstract_model,
            ComponentModelRef::Composition(_) | ComponentModelRef::Deployment(_) => false,
            ComponentModelRef::Proxy(_) => true,
        }
    }

    /// Whether this is a synthesized proxy model
    pub fn is_proxy(&self) -> bool {
        matches!(self, ComponentModelRef::Proxy(_))
    }

    /// Whether this model fulfills `target`
    ///
    /// Reflexive and transitive. Task contexts fulfill their supermodels and
    /// provided services; compositions fulfill their supermodels and provided
    /// services; proxies fulfill whatever their proxied models promise.
    pub fn fulfills(&self, target: &ModelRef) -> bool {
        match (self, target) {
            (ComponentModelRef::TaskContext(m), ModelRef::Component(other)) => match other {
                ComponentModelRef::TaskContext(t) => m.fulfills_task(t),
                ComponentModelRef::Composition(_) | ComponentModelRef::Deployment(_) => false,
                ComponentModelRef::Proxy(p) => proxy_target_fulfilled(self, p),
            },
            (ComponentModelRef::TaskContext(m), ModelRef::Service(s)) => m.fulfills_service(s),
            (ComponentModelRef::Composition(m), ModelRef::Component(other)) => match other {
                ComponentModelRef::Composition(c) => m.fulfills_composition(c),
                ComponentModelRef::TaskContext(_) | ComponentModelRef::Deployment(_) => false,
                ComponentModelRef::Proxy(p) => proxy_target_fulfilled(self, p),
            },
            (ComponentModelRef::Composition(m), ModelRef::Service(s)) => m
                .provides
                .iter()
                .any(|provided| provided.service.fulfills(s)),
            // deployments relate by name only, nothing else fulfills them
            (ComponentModelRef::Deployment(m), ModelRef::Component(other)) => match other {
                ComponentModelRef::Deployment(d) => m.name == d.name,
                _ => false,
            },
            (ComponentModelRef::Deployment(_), ModelRef::Service(_)) => false,
            (ComponentModelRef::Proxy(m), target) => {
                if let Some(task) = &m.task_model {
                    if ComponentModelRef::TaskContext(Arc::clone(task)).fulfills(target) {
                        return true;
                    }
                }
                match target {
                    ModelRef::Service(s) => m.services.iter().any(|own| own.fulfills(s)),
                    ModelRef::Component(ComponentModelRef::Proxy(p)) => {
                        proxy_target_fulfilled(self, p)
                    }
                    ModelRef::Component(_) => false,
                }
            }
        }
    }

    /// Whether this model fulfills every model in `targets`
    pub fn fulfills_all(&self, targets: &[ModelRef]) -> bool {
        targets.iter().all(|target| self.fulfills(target))
    }

    /// Every model this one fulfills: itself, its supermodel chain and the
    /// provided-service closure
    pub fn each_fulfilled_model(&self) -> Vec<ModelRef> {
        let mut result: Vec<ModelRef> = Vec::new();
        let push_service = |result: &mut Vec<ModelRef>, service: &Arc<DataServiceModel>| {
            for fulfilled in service.each_fulfilled_service() {
                let model = ModelRef::Service(fulfilled);
                if !result.contains(&model) {
                    result.push(model);
                }
            }
        };
        match self {
            ComponentModelRef::TaskContext(m) => {
                for supermodel in m.each_supermodel() {
                    result.push(ModelRef::Component(ComponentModelRef::TaskContext(
                        supermodel,
                    )));
                }
                for provided in m.each_provided_service() {
                    push_service(&mut result, &provided.service);
                }
            }
            ComponentModelRef::Composition(m) => {
                let mut current = Some(Arc::clone(m));
                while let Some(model) = current {
                    current = model.supermodel.clone();
                    result.push(ModelRef::Component(ComponentModelRef::Composition(model)));
                }
                for provided in &m.provides {
                    push_service(&mut result, &provided.service);
                }
            }
            ComponentModelRef::Deployment(_) => {
                result.push(ModelRef::Component(self.clone()));
            }
            ComponentModelRef::Proxy(m) => {
                result.push(ModelRef::Component(self.clone()));
                if let Some(task) = &m.task_model {
                    for supermodel in task.each_supermodel() {
                        result.push(ModelRef::Component(ComponentModelRef::TaskContext(
                            supermodel,
                        )));
                    }
                    for provided in task.each_provided_service() {
                        push_service(&mut result, &provided.service);
                    }
                }
                for service in &m.services {
                    push_service(&mut result, service);
                }
            }
        }
        result
    }

    /// Ports visible on this model
    pub fn each_port(&self) -> Vec<Port> {
        match self {
            ComponentModelRef::TaskContext(m) => m.each_port().into_iter().cloned().collect(),
            ComponentModelRef::Composition(m) => m.each_port(),
            ComponentModelRef::Deployment(_) => Vec::new(),
            ComponentModelRef::Proxy(m) => m.each_port(),
        }
    }

    /// Find a port by name
    pub fn find_port(&self, name: &str) -> Option<Port> {
        self.each_port().into_iter().find(|p| p.name == name)
    }

    /// The provision through which this model fulfills `service`, if any
    pub fn find_provided_service(&self, service: &DataServiceModel) -> Option<ProvidedService> {
        match self {
            ComponentModelRef::TaskContext(m) => m.find_provided_service(service).cloned(),
            ComponentModelRef::Deployment(_) => None,
            ComponentModelRef::Composition(m) => m
                .provides
                .iter()
                .find(|p| p.service.fulfills(service))
                .cloned(),
            ComponentModelRef::Proxy(m) => m
                .services
                .iter()
                .find(|s| s.fulfills(service))
                .map(|s| ProvidedService::new(Arc::clone(s)))
                .or_else(|| {
                    m.task_model
                        .as_ref()
                        .and_then(|task| task.find_provided_service(service).cloned())
                }),
        }
    }

    /// All distinct provisions fulfilling `service`
    pub fn find_all_provided_services(&self, service: &DataServiceModel) -> Vec<ProvidedService> {
        match self {
            ComponentModelRef::TaskContext(m) => m
                .find_all_provided_services(service)
                .into_iter()
                .cloned()
                .collect(),
            ComponentModelRef::Deployment(_) => Vec::new(),
            ComponentModelRef::Composition(m) => m
                .provides
                .iter()
                .filter(|p| p.service.fulfills(service))
                .cloned()
                .collect(),
            ComponentModelRef::Proxy(_) => self
                .find_provided_service(service)
                .into_iter()
                .collect(),
        }
    }

    /// Port mapping (service port → component port) for a fulfilled service
    ///
    /// Returns the identity mapping when the model has no explicit renaming.
    pub fn port_mappings_for(&self, service: &DataServiceModel) -> IndexMap<String, String> {
        self.find_provided_service(service)
            .map(|provided| provided.port_mappings)
            .unwrap_or_default()
    }
}

fn proxy_target_fulfilled(model: &ComponentModelRef, proxy: &ProxyTaskModel) -> bool {
    if let Some(task) = &proxy.task_model {
        if !model.fulfills(&ModelRef::Component(ComponentModelRef::TaskContext(
            Arc::clone(task),
        ))) {
            return false;
        }
    }
    proxy
        .services
        .iter()
        .all(|service| model.fulfills(&ModelRef::Service(Arc::clone(service))))
}

impl PartialEq for ComponentModelRef {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.name() == other.name()
    }
}

impl Eq for ComponentModelRef {}

impl Hash for ComponentModelRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.name().hash(state);
    }
}

impl fmt::Display for ComponentModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to any model usable as a requirement or selection key
#[derive(Debug, Clone)]
pub enum ModelRef {
    /// A component model (task context, composition or proxy)
    Component(ComponentModelRef),
    /// A data-service model
    Service(Arc<DataServiceModel>),
}

impl ModelRef {
    /// The model name
    pub fn name(&self) -> &str {
        match self {
            ModelRef::Component(m) => m.name(),
            ModelRef::Service(s) => &s.name,
        }
    }

    /// Whether this model is a framework root marker
    pub fn is_root(&self) -> bool {
        match self {
            ModelRef::Component(ComponentModelRef::TaskContext(m)) => m.root,
            ModelRef::Component(_) => false,
            ModelRef::Service(s) => s.root,
        }
    }

    /// Whether this is a data-service model
    pub fn is_service(&self) -> bool {
        matches!(self, ModelRef::Service(_))
    }

    /// Whether this model fulfills `target`
    pub fn fulfills(&self, target: &ModelRef) -> bool {
        match (self, target) {
            (ModelRef::Component(m), target) => m.fulfills(target),
            (ModelRef::Service(s), ModelRef::Service(t)) => s.fulfills(t),
            (ModelRef::Service(_), ModelRef::Component(_)) => false,
        }
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ModelRef::Component(a), ModelRef::Component(b)) => a == b,
            (ModelRef::Service(a), ModelRef::Service(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Eq for ModelRef {}

impl Hash for ModelRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.name().hash(state);
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Arc<TaskContextModel>> for ModelRef {
    fn from(model: Arc<TaskContextModel>) -> Self {
        ModelRef::Component(ComponentModelRef::TaskContext(model))
    }
}

impl From<Arc<CompositionModel>> for ModelRef {
    fn from(model: Arc<CompositionModel>) -> Self {
        ModelRef::Component(ComponentModelRef::Composition(model))
    }
}

impl From<Arc<DataServiceModel>> for ModelRef {
    fn from(model: Arc<DataServiceModel>) -> Self {
        ModelRef::Service(model)
    }
}

impl From<ComponentModelRef> for ModelRef {
    fn from(model: ComponentModelRef) -> Self {
        ModelRef::Component(model)
    }
}

/// Verify that a set of required models can be fulfilled by one component
///
/// Two concrete component classes unrelated by subtyping cannot both be
/// fulfilled by a single task.
pub fn verify_model_set_consistency(models: &[ModelRef]) -> Result<()> {
    let components: Vec<&ComponentModelRef> = models
        .iter()
        .filter_map(|model| match model {
            ModelRef::Component(c) if !c.is_proxy() => Some(c),
            _ => None,
        })
        .collect();

    for (i, a) in components.iter().enumerate() {
        for b in &components[i + 1..] {
            let a_ref = ModelRef::Component((*a).clone());
            let b_ref = ModelRef::Component((*b).clone());
            if !a.fulfills(&b_ref) && !b.fulfills(&a_ref) {
                return Err(Error::InconsistentModelSet(
                    a.name().to_string(),
                    b.name().to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// The most specific component model in `models`, if any is concrete
///
/// Returns `None` when the set contains only services and proxies; the
/// caller then synthesizes a proxy.
pub fn most_specific_component(models: &[ModelRef]) -> Result<Option<ComponentModelRef>> {
    verify_model_set_consistency(models)?;
    let mut best: Option<&ComponentModelRef> = None;
    for model in models {
        if let ModelRef::Component(component) = model {
            if component.is_proxy() {
                continue;
            }
            best = Some(match best {
                None => component,
                Some(current) => {
                    if component.fulfills(&ModelRef::Component(current.clone())) {
                        component
                    } else {
                        current
                    }
                }
            });
        }
    }
    Ok(best.cloned())
}
