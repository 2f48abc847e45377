//! Instance requirements: accumulated constraints for one network placeholder

use crate::resolver::DependencyInjection;
use crate::{Error, Result};
use component_models::{
    most_specific_component, verify_model_set_consistency, ComponentModelRef, DeploymentBinding,
    DeploymentGroup, DeploymentModel, ModelRef,
};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A hint narrowing deployment selection for a task
#[derive(Debug, Clone)]
pub enum DeploymentHint {
    /// Only slots of this deployment model qualify
    Deployment(Arc<DeploymentModel>),
    /// Only slots whose runtime name matches this pattern qualify
    ///
    /// The pattern is a regular expression; an invalid pattern degrades to
    /// literal comparison.
    SlotName(String),
}

impl DeploymentHint {
    /// Whether `binding` satisfies this hint
    pub fn matches(&self, binding: &DeploymentBinding) -> bool {
        match self {
            DeploymentHint::Deployment(model) => binding.deployment.name == model.name,
            DeploymentHint::SlotName(pattern) => Self::name_matches(pattern, &binding.slot_name),
        }
    }

    /// Whether `name` satisfies a slot-name hint; deployment hints never
    /// match bare names
    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            DeploymentHint::Deployment(_) => false,
            DeploymentHint::SlotName(pattern) => Self::name_matches(pattern, name),
        }
    }

    fn name_matches(pattern: &str, name: &str) -> bool {
        match Regex::new(pattern) {
            Ok(regex) => regex.is_match(name),
            Err(_) => pattern == name,
        }
    }
}

impl PartialEq for DeploymentHint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DeploymentHint::Deployment(a), DeploymentHint::Deployment(b)) => a.name == b.name,
            (DeploymentHint::SlotName(a), DeploymentHint::SlotName(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DeploymentHint {}

impl Hash for DeploymentHint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            DeploymentHint::Deployment(model) => model.name.hash(state),
            DeploymentHint::SlotName(pattern) => pattern.hash(state),
        }
    }
}

impl fmt::Display for DeploymentHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentHint::Deployment(model) => write!(f, "deployment:{}", model.name),
            DeploymentHint::SlotName(pattern) => write!(f, "slot:{pattern}"),
        }
    }
}

/// Accumulated constraints for a single placeholder in the network
///
/// Requirements are mergeable: the model sets union under
/// fulfills-compatibility, arguments merge by key with conflicts detected,
/// hints accumulate as a set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceRequirements {
    models: Vec<ModelRef>,
    arguments: IndexMap<String, Value>,
    selections: DependencyInjection,
    deployment_hints: IndexSet<DeploymentHint>,
    deployment_group: Option<Arc<DeploymentGroup>>,
    runtime_name: Option<String>,
}

impl InstanceRequirements {
    /// Requirements over the given models
    pub fn new(models: impl IntoIterator<Item = ModelRef>) -> Self {
        Self {
            models: models.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Requirements over a single model
    pub fn from_model(model: impl Into<ModelRef>) -> Self {
        Self::new([model.into()])
    }

    /// The required models
    pub fn models(&self) -> &[ModelRef] {
        &self.models
    }

    /// The accumulated arguments
    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    /// The service selections pushed into instantiation
    pub fn selections(&self) -> &DependencyInjection {
        &self.selections
    }

    /// The accumulated deployment hints
    pub fn deployment_hints(&self) -> &IndexSet<DeploymentHint> {
        &self.deployment_hints
    }

    /// The deployment group consulted during deployment selection
    pub fn deployment_group(&self) -> Option<&Arc<DeploymentGroup>> {
        self.deployment_group.as_ref()
    }

    /// The requested runtime name, if any
    pub fn runtime_name(&self) -> Option<&str> {
        self.runtime_name.as_deref()
    }

    /// Add a required model
    pub fn add_model(&mut self, model: impl Into<ModelRef>) -> &mut Self {
        let model = model.into();
        if !self.models.contains(&model) {
            self.models.push(model);
        }
        self
    }

    /// Set an argument value
    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// Add service selections used when this requirement instantiates
    pub fn with_selections(mut self, selections: DependencyInjection) -> Self {
        self.selections = selections;
        self
    }

    /// Add a deployment hint
    pub fn with_deployment_hint(mut self, hint: DeploymentHint) -> Self {
        self.deployment_hints.insert(hint);
        self
    }

    /// Restrict deployment selection to the given group
    pub fn with_deployment_group(mut self, group: Arc<DeploymentGroup>) -> Self {
        self.deployment_group = Some(group);
        self
    }

    /// Request a specific runtime name
    pub fn with_runtime_name(mut self, name: impl Into<String>) -> Self {
        self.runtime_name = Some(name.into());
        self
    }

    /// The most specific concrete component among the required models
    pub fn most_specific_component(&self) -> Option<ComponentModelRef> {
        most_specific_component(&self.models).ok().flatten()
    }

    /// Verify the required models can be fulfilled by a single component
    pub fn verify(&self) -> Result<()> {
        verify_model_set_consistency(&self.models)?;
        Ok(())
    }

    /// Merge `other` into a copy of `self`
    ///
    /// Fails when the model union is inconsistent, when an argument is set
    /// to two different values, or when both sides request different runtime
    /// names.
    pub fn merge(&self, other: &InstanceRequirements) -> Result<InstanceRequirements> {
        let mut merged = self.clone();
        for model in &other.models {
            merged.add_model(model.clone());
        }
        verify_model_set_consistency(&merged.models)?;

        for (name, value) in &other.arguments {
            match merged.arguments.get(name) {
                Some(existing) if existing != value => {
                    return Err(Error::RequirementConflict(format!(
                        "argument {name} set to both {existing} and {value}"
                    )));
                }
                _ => {
                    merged.arguments.insert(name.clone(), value.clone());
                }
            }
        }

        merged.selections = self.selections.merge(&other.selections)?;
        merged
            .deployment_hints
            .extend(other.deployment_hints.iter().cloned());

        merged.deployment_group = match (&self.deployment_group, &other.deployment_group) {
            (Some(left), Some(right)) => {
                let mut group = (**left).clone();
                group.extend(right);
                Some(Arc::new(group))
            }
            (Some(group), None) | (None, Some(group)) => Some(Arc::clone(group)),
            (None, None) => None,
        };

        merged.runtime_name = match (&self.runtime_name, &other.runtime_name) {
            (Some(left), Some(right)) if left != right => {
                return Err(Error::RequirementConflict(format!(
                    "runtime name requested as both {left} and {right}"
                )));
            }
            (Some(name), _) | (_, Some(name)) => Some(name.clone()),
            (None, None) => None,
        };

        Ok(merged)
    }
}

impl fmt::Display for InstanceRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.models.iter().map(|m| m.name()).collect();
        write!(f, "[{}]", names.join(","))
    }
}

impl From<ModelRef> for InstanceRequirements {
    fn from(model: ModelRef) -> Self {
        Self::from_model(model)
    }
}
