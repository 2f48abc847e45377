//! Selection keys and selection values
//!
//! Keys and values are tagged variants so that `normalize` is a total
//! function over them; equality is by variant first, then content.

use crate::requirements::InstanceRequirements;
use component_models::{ComponentModelRef, DataServiceModel, ModelRef, TaskContextModel};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// What a selection can be registered under
#[derive(Debug, Clone)]
pub enum SelectionKey {
    /// A child or requirement name
    Name(String),
    /// A component model (task context or composition)
    Component(ComponentModelRef),
    /// A data-service model
    Service(Arc<DataServiceModel>),
}

impl SelectionKey {
    /// A name key
    pub fn name(name: impl Into<String>) -> Self {
        SelectionKey::Name(name.into())
    }

    /// The key for a model reference
    pub fn for_model(model: &ModelRef) -> Self {
        match model {
            ModelRef::Component(component) => SelectionKey::Component(component.clone()),
            ModelRef::Service(service) => SelectionKey::Service(Arc::clone(service)),
        }
    }

    /// The model this key stands for, if it is a model key
    pub fn as_model(&self) -> Option<ModelRef> {
        match self {
            SelectionKey::Name(_) => None,
            SelectionKey::Component(component) => {
                Some(ModelRef::Component(component.clone()))
            }
            SelectionKey::Service(service) => Some(ModelRef::Service(Arc::clone(service))),
        }
    }
}

impl PartialEq for SelectionKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SelectionKey::Name(a), SelectionKey::Name(b)) => a == b,
            (SelectionKey::Component(a), SelectionKey::Component(b)) => a == b,
            (SelectionKey::Service(a), SelectionKey::Service(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Eq for SelectionKey {}

impl Hash for SelectionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SelectionKey::Name(name) => name.hash(state),
            SelectionKey::Component(component) => component.name().hash(state),
            SelectionKey::Service(service) => service.name.hash(state),
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKey::Name(name) => write!(f, "name:{name}"),
            SelectionKey::Component(component) => write!(f, "model:{}", component.name()),
            SelectionKey::Service(service) => write!(f, "service:{}", service.name),
        }
    }
}

/// What a key can resolve to
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// An unresolved name, replaced during name resolution
    Name(String),
    /// A concrete component model
    Component(ComponentModelRef),
    /// A data-service model, itself resolved further down the chain
    Service(Arc<DataServiceModel>),
    /// A service bound to the component providing it
    BoundService {
        /// The providing component
        component: ComponentModelRef,
        /// The provided service
        service: Arc<DataServiceModel>,
    },
    /// A full requirement set
    Requirements(Box<InstanceRequirements>),
    /// Explicitly select nothing, blocking defaults for the key
    Nothing,
}

impl Selection {
    /// A component selection from a task model
    pub fn from_task(model: Arc<TaskContextModel>) -> Self {
        Selection::Component(ComponentModelRef::TaskContext(model))
    }

    /// A component selection from any model reference
    pub fn from_model(model: &ModelRef) -> Self {
        match model {
            ModelRef::Component(component) => Selection::Component(component.clone()),
            ModelRef::Service(service) => Selection::Service(Arc::clone(service)),
        }
    }

    /// The component model selected here, if the selection is concrete
    pub fn component_model(&self) -> Option<ComponentModelRef> {
        match self {
            Selection::Component(component) => Some(component.clone()),
            Selection::BoundService { component, .. } => Some(component.clone()),
            Selection::Requirements(requirements) => requirements.most_specific_component(),
            Selection::Name(_) | Selection::Service(_) | Selection::Nothing => None,
        }
    }

    /// Whether this selection fulfills `model`
    pub fn fulfills(&self, model: &ModelRef) -> bool {
        match self {
            Selection::Component(component) => component.fulfills(model),
            Selection::BoundService { component, service } => match model {
                ModelRef::Service(target) => {
                    service.fulfills(target) || component.fulfills(model)
                }
                ModelRef::Component(_) => component.fulfills(model),
            },
            Selection::Service(service) => match model {
                ModelRef::Service(target) => service.fulfills(target),
                ModelRef::Component(_) => false,
            },
            Selection::Requirements(requirements) => requirements
                .models()
                .iter()
                .any(|own| own.fulfills(model)),
            Selection::Name(_) | Selection::Nothing => false,
        }
    }

    /// The selection key this value would collapse onto during recursive
    /// resolution, when the value is itself usable as a key
    pub fn as_key(&self) -> Option<SelectionKey> {
        match self {
            Selection::Name(name) => Some(SelectionKey::Name(name.clone())),
            Selection::Component(component) => {
                Some(SelectionKey::Component(component.clone()))
            }
            Selection::Service(service) => Some(SelectionKey::Service(Arc::clone(service))),
            Selection::BoundService { .. } | Selection::Requirements(_) | Selection::Nothing => {
                None
            }
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Name(name) => write!(f, "name:{name}"),
            Selection::Component(component) => write!(f, "model:{}", component.name()),
            Selection::Service(service) => write!(f, "service:{}", service.name),
            Selection::BoundService { component, service } => {
                write!(f, "{}.as({})", component.name(), service.name)
            }
            Selection::Requirements(requirements) => {
                write!(f, "requirements:{requirements}")
            }
            Selection::Nothing => f.write_str("nothing"),
        }
    }
}

impl From<ComponentModelRef> for Selection {
    fn from(model: ComponentModelRef) -> Self {
        Selection::Component(model)
    }
}

impl From<Arc<DataServiceModel>> for Selection {
    fn from(service: Arc<DataServiceModel>) -> Self {
        Selection::Service(service)
    }
}

impl From<InstanceRequirements> for Selection {
    fn from(requirements: InstanceRequirements) -> Self {
        Selection::Requirements(Box::new(requirements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{ProvidedService, TaskContextModel};

    #[test]
    fn test_key_equality_by_variant_then_content() {
        let model = ComponentModelRef::TaskContext(Arc::new(TaskContextModel::new("camera")));
        assert_eq!(SelectionKey::name("camera"), SelectionKey::name("camera"));
        assert_ne!(
            SelectionKey::name("camera"),
            SelectionKey::Component(model.clone())
        );
        assert_eq!(
            SelectionKey::Component(model.clone()),
            SelectionKey::Component(model)
        );
    }

    #[test]
    fn test_selection_fulfills() {
        let service = Arc::new(DataServiceModel::new("image_source"));
        let model = Arc::new(
            TaskContextModel::new("camera_driver")
                .with_provides(ProvidedService::new(Arc::clone(&service))),
        );
        let selection = Selection::from_task(Arc::clone(&model));

        assert!(selection.fulfills(&ModelRef::Service(Arc::clone(&service))));
        assert!(selection.fulfills(&ModelRef::from(model)));
        assert!(!Selection::Nothing.fulfills(&ModelRef::Service(service)));
    }
}
