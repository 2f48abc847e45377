//! The dependency-injection mapping and its resolution algorithms
//!
//! Resolution proceeds in stages: explicit selections are normalized and
//! validated, unambiguous defaults fill the remaining model keys, recursive
//! selection chains collapse to their fixed point, and
//! [`DependencyInjection::component_model_for`] finally maps one placeholder
//! to a concrete component model (or a synthesized proxy).

use crate::requirements::InstanceRequirements;
use crate::selection::{Selection, SelectionKey};
use crate::{Error, Result};
use component_models::{
    most_specific_component, ComponentModelRef, DataServiceModel, ModelCatalog, ModelRef,
    ProvidedService, ProxyTaskModel,
};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::debug;

/// Outcome of applying defaults to an explicit mapping
#[derive(Debug, Default)]
pub struct DefaultResolution {
    /// Selections contributed by defaults, keyed by the fulfilled model
    pub additions: IndexMap<SelectionKey, Selection>,
    /// Models matched by two or more distinct defaults, left unselected
    pub ambiguous: Vec<SelectionKey>,
}

/// The component a placeholder resolved to
#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    /// The selected component model; a proxy when nothing concrete matched
    pub model: ComponentModelRef,
    /// Per required service, the provision satisfying it on `model`
    pub selected_services: IndexMap<String, ProvidedService>,
    /// Requirement sets that contributed to the selection
    pub selected_requirements: Vec<InstanceRequirements>,
}

/// Mapping from selection keys to selections, with defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyInjection {
    explicit: IndexMap<SelectionKey, Selection>,
    defaults: Vec<Selection>,
}

impl DependencyInjection {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether neither explicit selections nor defaults are registered
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.defaults.is_empty()
    }

    /// Register an explicit selection, replacing any previous one for `key`
    pub fn add_explicit(&mut self, key: SelectionKey, selection: Selection) {
        self.explicit.insert(key, selection);
    }

    /// Register a default selection
    pub fn add_default(&mut self, selection: Selection) {
        if !self.defaults.contains(&selection) {
            self.defaults.push(selection);
        }
    }

    /// Merge all selections of `other` into `self`, `other` winning on
    /// explicit conflicts
    pub fn add(&mut self, other: &DependencyInjection) {
        for (key, selection) in &other.explicit {
            self.explicit.insert(key.clone(), selection.clone());
        }
        for selection in &other.defaults {
            self.add_default(selection.clone());
        }
    }

    /// The explicit selection for `key`, if any
    pub fn explicit_selection_for(&self, key: &SelectionKey) -> Option<&Selection> {
        self.explicit.get(key)
    }

    /// All explicit selections, in registration order
    pub fn each_explicit(&self) -> impl Iterator<Item = (&SelectionKey, &Selection)> {
        self.explicit.iter()
    }

    /// All default selections, in registration order
    pub fn each_default(&self) -> impl Iterator<Item = &Selection> {
        self.defaults.iter()
    }

    /// Replace name selections by catalog models
    ///
    /// Names that are themselves keys of the mapping are selection chains,
    /// not model names; they are left for [`Self::resolve`] to collapse.
    pub fn resolve_names(&self, catalog: &ModelCatalog) -> Result<Self> {
        let resolve = |selection: &Selection| -> Result<Selection> {
            match selection {
                Selection::Name(name) => {
                    if self
                        .explicit
                        .contains_key(&SelectionKey::Name(name.clone()))
                    {
                        return Ok(selection.clone());
                    }
                    catalog
                        .resolve_name(name)
                        .map(|model| Selection::from_model(&model))
                        .ok_or_else(|| Error::NameResolution(name.clone()))
                }
                other => Ok(other.clone()),
            }
        };

        let mut explicit = IndexMap::new();
        for (key, selection) in &self.explicit {
            explicit.insert(key.clone(), resolve(selection)?);
        }
        let mut defaults = Vec::new();
        for selection in &self.defaults {
            defaults.push(resolve(selection)?);
        }
        Ok(Self { explicit, defaults })
    }

    /// Validate and rewrite one explicit selection pair
    ///
    /// Name keys accept anything. Component keys reduce bound services to
    /// their owning component and require fulfillment. Service keys resolve
    /// component selections to the unique provision of the service.
    pub fn normalize_selection(key: &SelectionKey, selection: &Selection) -> Result<Selection> {
        match key {
            SelectionKey::Name(_) => Ok(selection.clone()),
            SelectionKey::Component(component_key) => {
                let reduced = match selection {
                    Selection::BoundService { component, .. } => {
                        Selection::Component(component.clone())
                    }
                    other => other.clone(),
                };
                let target = ModelRef::Component(component_key.clone());
                match &reduced {
                    Selection::Component(_) | Selection::Requirements(_) => {
                        if reduced.fulfills(&target) {
                            Ok(reduced)
                        } else {
                            Err(Error::InvalidSelection {
                                key: key.to_string(),
                                value: reduced.to_string(),
                                reason: format!("it does not fulfill {}", component_key.name()),
                            })
                        }
                    }
                    Selection::Name(_) | Selection::Nothing => Ok(reduced),
                    Selection::Service(_) | Selection::BoundService { .. } => {
                        Err(Error::InvalidSelection {
                            key: key.to_string(),
                            value: reduced.to_string(),
                            reason: "a data service cannot substitute a component model"
                                .to_string(),
                        })
                    }
                }
            }
            SelectionKey::Service(service_key) => match selection {
                Selection::Component(component) => {
                    bind_service_on(component, service_key).map(|provided| {
                        Selection::BoundService {
                            component: component.clone(),
                            service: provided.service,
                        }
                    })
                }
                Selection::BoundService { service, .. } => {
                    if service.fulfills(service_key) {
                        Ok(selection.clone())
                    } else {
                        Err(Error::InvalidSelection {
                            key: key.to_string(),
                            value: selection.to_string(),
                            reason: format!("it does not fulfill {}", service_key.name),
                        })
                    }
                }
                Selection::Service(service) => {
                    if service.fulfills(service_key) {
                        Ok(selection.clone())
                    } else {
                        Err(Error::InvalidSelection {
                            key: key.to_string(),
                            value: selection.to_string(),
                            reason: format!("it does not fulfill {}", service_key.name),
                        })
                    }
                }
                Selection::Requirements(requirements) => {
                    let target = ModelRef::Service(Arc::clone(service_key));
                    if requirements.models().iter().any(|m| m.fulfills(&target)) {
                        Ok(selection.clone())
                    } else {
                        Err(Error::InvalidSelection {
                            key: key.to_string(),
                            value: selection.to_string(),
                            reason: format!("it does not fulfill {}", service_key.name),
                        })
                    }
                }
                Selection::Name(_) | Selection::Nothing => Ok(selection.clone()),
            },
        }
    }

    fn normalize(
        mapping: &IndexMap<SelectionKey, Selection>,
    ) -> Result<IndexMap<SelectionKey, Selection>> {
        let mut result = IndexMap::new();
        for (key, selection) in mapping {
            result.insert(key.clone(), Self::normalize_selection(key, selection)?);
        }
        Ok(result)
    }

    /// Collapse selection chains (`value` being itself a key) to their fixed
    /// point
    ///
    /// Direct self-loops are kept as-is; any longer cycle fails.
    pub fn resolve_recursive(
        mapping: IndexMap<SelectionKey, Selection>,
    ) -> Result<IndexMap<SelectionKey, Selection>> {
        let mut result = mapping.clone();
        let keys: Vec<SelectionKey> = mapping.keys().cloned().collect();
        for key in keys {
            let mut visited: IndexSet<SelectionKey> = IndexSet::new();
            visited.insert(key.clone());
            let mut current = mapping[&key].clone();
            loop {
                let Some(next_key) = current.as_key() else {
                    break;
                };
                if next_key == key && visited.len() == 1 {
                    // direct self-loop, a valid fixed point
                    break;
                }
                let Some(next) = mapping.get(&next_key) else {
                    break;
                };
                if !visited.insert(next_key.clone()) {
                    return Err(Error::RecursiveSelection(key.to_string()));
                }
                current = next.clone();
                if current.as_key().as_ref() == Some(&next_key) {
                    // chain ends on a self-loop
                    break;
                }
            }
            result.insert(key, current);
        }
        Ok(result)
    }

    /// Apply defaults to the models they fulfill
    ///
    /// A default is registered for every non-root model it fulfills, unless
    /// the model is explicitly selected or two distinct defaults compete for
    /// it. Losing defaults are dropped silently.
    pub fn resolve_defaults(
        explicit: &IndexMap<SelectionKey, Selection>,
        defaults: &[Selection],
    ) -> DefaultResolution {
        let mut resolution = DefaultResolution::default();
        let mut owners: IndexMap<SelectionKey, usize> = IndexMap::new();
        let mut ambiguous: IndexSet<SelectionKey> = IndexSet::new();

        for (index, default) in defaults.iter().enumerate() {
            for model in fulfilled_models_of(default) {
                if model.is_root() {
                    continue;
                }
                let key = SelectionKey::for_model(&model);
                if explicit.contains_key(&key) {
                    debug!(%key, default = %default, "default lost to explicit selection");
                    continue;
                }
                if ambiguous.contains(&key) {
                    continue;
                }
                match owners.get(&key) {
                    None => {
                        owners.insert(key.clone(), index);
                        resolution.additions.insert(key, default.clone());
                    }
                    Some(&previous) if defaults[previous] != *default => {
                        debug!(
                            %key,
                            first = %defaults[previous],
                            second = %default,
                            "default selection ambiguous"
                        );
                        ambiguous.insert(key.clone());
                        resolution.additions.shift_remove(&key);
                    }
                    Some(_) => {}
                }
            }
        }

        resolution.ambiguous = ambiguous.into_iter().collect();
        resolution
    }

    /// Resolve the mapping: normalize, apply defaults, collapse chains
    ///
    /// Resolution is idempotent: resolving an already-resolved mapping
    /// returns an equal mapping.
    pub fn resolve(&self) -> Result<Self> {
        let normalized = Self::normalize(&self.explicit)?;
        let defaults = Self::resolve_defaults(&normalized, &self.defaults);
        let mut merged = normalized;
        for (key, selection) in defaults.additions {
            merged.entry(key).or_insert(selection);
        }
        let merged = Self::normalize(&merged)?;
        let collapsed = Self::resolve_recursive(merged)?;
        // values substituted by chain collapse must satisfy their key too
        let explicit = Self::normalize(&collapsed)?;
        Ok(Self {
            explicit,
            defaults: self.defaults.clone(),
        })
    }

    /// Resolve one placeholder to a component model
    ///
    /// When `name` has a concrete explicit selection it is used outright and
    /// the per-model selections are not consulted; otherwise each required
    /// model is looked up in the mapping and the results merge into the most
    /// specific compatible component. When nothing concrete is selected, a
    /// proxy task model fulfilling the requested models is synthesized.
    pub fn component_model_for(
        &self,
        name: Option<&str>,
        requirements: &InstanceRequirements,
    ) -> Result<ResolvedComponent> {
        let mut candidates: Vec<ComponentModelRef> = Vec::new();
        let mut required_services: Vec<Arc<DataServiceModel>> = Vec::new();
        let mut bound: IndexMap<String, ProvidedService> = IndexMap::new();
        let mut selected_requirements: Vec<InstanceRequirements> = Vec::new();

        let apply_selection =
            |selection: &Selection,
             required: Option<&ModelRef>,
             candidates: &mut Vec<ComponentModelRef>,
             required_services: &mut Vec<Arc<DataServiceModel>>,
             bound: &mut IndexMap<String, ProvidedService>,
             selected_requirements: &mut Vec<InstanceRequirements>|
             -> Result<()> {
                match selection {
                    Selection::Name(other) => return Err(Error::NameResolution(other.clone())),
                    Selection::Nothing => {}
                    Selection::Component(component) => {
                        push_unique(candidates, component.clone());
                    }
                    Selection::Service(service) => {
                        push_unique_service(required_services, Arc::clone(service));
                    }
                    Selection::BoundService { component, service } => {
                        push_unique(candidates, component.clone());
                        if let Some(ModelRef::Service(target)) = required {
                            let provided = component
                                .find_provided_service(service)
                                .unwrap_or_else(|| ProvidedService::new(Arc::clone(service)));
                            bound.insert(target.name.clone(), provided);
                        }
                    }
                    Selection::Requirements(requirements) => {
                        selected_requirements.push((**requirements).clone());
                        for model in requirements.models() {
                            match model {
                                ModelRef::Component(component) => {
                                    push_unique(candidates, component.clone());
                                }
                                ModelRef::Service(service) => {
                                    push_unique_service(required_services, Arc::clone(service));
                                }
                            }
                        }
                    }
                }
                Ok(())
            };

        if let Some(name) = name {
            if let Some(selection) = self.explicit.get(&SelectionKey::name(name)) {
                debug!(name, selection = %selection, "placeholder selected by name");
                // a concrete selection for the name wins outright; the
                // per-model selections are not consulted
                if let Some(resolved) = self.resolve_by_name(selection, requirements)? {
                    return Ok(resolved);
                }
                apply_selection(
                    selection,
                    None,
                    &mut candidates,
                    &mut required_services,
                    &mut bound,
                    &mut selected_requirements,
                )?;
            }
        }

        for model in requirements.models() {
            if let ModelRef::Service(service) = model {
                push_unique_service(&mut required_services, Arc::clone(service));
            }
            let key = SelectionKey::for_model(model);
            match self.explicit.get(&key) {
                None => {
                    if let ModelRef::Component(component) = model {
                        push_unique(&mut candidates, component.clone());
                    }
                }
                Some(selection) => {
                    apply_selection(
                        selection,
                        Some(model),
                        &mut candidates,
                        &mut required_services,
                        &mut bound,
                        &mut selected_requirements,
                    )?;
                }
            }
        }

        let mut all_requirements: Vec<ModelRef> = candidates
            .iter()
            .map(|c| ModelRef::Component(c.clone()))
            .collect();
        all_requirements.extend(
            required_services
                .iter()
                .map(|s| ModelRef::Service(Arc::clone(s))),
        );

        let best = most_specific_component(&all_requirements).map_err(map_model_error)?;
        let model = match best {
            Some(component)
                if !component.is_abstract() && component.fulfills_all(&all_requirements) =>
            {
                component
            }
            _ => {
                let proxy = ProxyTaskModel::synthesize(&all_requirements).map_err(map_model_error)?;
                debug!(proxy = %proxy.name, "no concrete component selected, synthesized proxy");
                ComponentModelRef::Proxy(Arc::new(proxy))
            }
        };

        bind_required_services(&model, &required_services, &mut bound)?;

        Ok(ResolvedComponent {
            model,
            selected_services: bound,
            selected_requirements,
        })
    }

    /// Resolve a placeholder from its name selection alone
    ///
    /// Returns `None` when the selection carries no concrete component, in
    /// which case the caller falls back to the per-model selections.
    fn resolve_by_name(
        &self,
        selection: &Selection,
        requirements: &InstanceRequirements,
    ) -> Result<Option<ResolvedComponent>> {
        let mut bound: IndexMap<String, ProvidedService> = IndexMap::new();
        let mut selected_requirements: Vec<InstanceRequirements> = Vec::new();

        let model = match selection {
            Selection::Name(other) => return Err(Error::NameResolution(other.clone())),
            Selection::Component(component) if !component.is_proxy() => component.clone(),
            Selection::BoundService { component, service } if !component.is_proxy() => {
                // the named provision satisfies whichever required services
                // it fulfills
                for required in requirements.models() {
                    if let ModelRef::Service(target) = required {
                        if service.fulfills(target) {
                            let provided = component
                                .find_provided_service(service)
                                .unwrap_or_else(|| ProvidedService::new(Arc::clone(service)));
                            bound.insert(target.name.clone(), provided);
                        }
                    }
                }
                component.clone()
            }
            Selection::Requirements(selected) => match selected.most_specific_component() {
                Some(component) if !component.is_proxy() => {
                    selected_requirements.push((**selected).clone());
                    component
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        let required_services: Vec<Arc<DataServiceModel>> = requirements
            .models()
            .iter()
            .filter_map(|required| match required {
                ModelRef::Service(service) => Some(Arc::clone(service)),
                ModelRef::Component(_) => None,
            })
            .collect();
        bind_required_services(&model, &required_services, &mut bound)?;

        Ok(Some(ResolvedComponent {
            model,
            selected_services: bound,
            selected_requirements,
        }))
    }

    /// Merge two mappings element-wise
    ///
    /// On a conflicting key the more specific model wins; incomparable
    /// selections fail. Defaults union.
    pub fn merge(&self, other: &DependencyInjection) -> Result<Self> {
        let mut explicit = self.explicit.clone();
        for (key, selection) in &other.explicit {
            match explicit.get(key) {
                None => {
                    explicit.insert(key.clone(), selection.clone());
                }
                Some(existing) if existing == selection => {}
                Some(existing) => {
                    let merged = merge_selection(key, existing, selection)?;
                    explicit.insert(key.clone(), merged);
                }
            }
        }
        let mut defaults = self.defaults.clone();
        for selection in &other.defaults {
            if !defaults.contains(selection) {
                defaults.push(selection.clone());
            }
        }
        Ok(Self { explicit, defaults })
    }
}

fn push_unique(candidates: &mut Vec<ComponentModelRef>, component: ComponentModelRef) {
    if !candidates.contains(&component) {
        candidates.push(component);
    }
}

fn push_unique_service(services: &mut Vec<Arc<DataServiceModel>>, service: Arc<DataServiceModel>) {
    if !services.iter().any(|s| s.name == service.name) {
        services.push(service);
    }
}

/// Bind each required service to the provision satisfying it on `model`
///
/// Services already bound are kept. A proxy provides its services under
/// their own names; a concrete model that does not provide a required
/// service leaves it unbound.
fn bind_required_services(
    model: &ComponentModelRef,
    required_services: &[Arc<DataServiceModel>],
    bound: &mut IndexMap<String, ProvidedService>,
) -> Result<()> {
    for service in required_services {
        if bound.contains_key(&service.name) {
            continue;
        }
        let provisions = model.find_all_provided_services(service);
        match provisions.len() {
            0 => {
                if model.is_proxy() {
                    bound.insert(
                        service.name.clone(),
                        ProvidedService::new(Arc::clone(service)),
                    );
                } else {
                    debug!(
                        model = %model,
                        service = %service.name,
                        "selected component does not provide the required service"
                    );
                }
            }
            1 => {
                bound.insert(service.name.clone(), provisions.into_iter().next().unwrap());
            }
            _ => {
                return Err(Error::AmbiguousService {
                    component: model.name().to_string(),
                    service: service.name.clone(),
                    candidates: provisions
                        .iter()
                        .map(|p| p.service.name.clone())
                        .collect(),
                });
            }
        }
    }
    Ok(())
}

fn bind_service_on(
    component: &ComponentModelRef,
    service: &Arc<DataServiceModel>,
) -> Result<ProvidedService> {
    let provisions = component.find_all_provided_services(service);
    match provisions.len() {
        0 => Err(Error::InvalidSelection {
            key: format!("service:{}", service.name),
            value: format!("model:{}", component.name()),
            reason: format!("{} does not provide {}", component.name(), service.name),
        }),
        1 => Ok(provisions.into_iter().next().unwrap()),
        _ => Err(Error::AmbiguousService {
            component: component.name().to_string(),
            service: service.name.clone(),
            candidates: provisions.iter().map(|p| p.service.name.clone()).collect(),
        }),
    }
}

fn fulfilled_models_of(selection: &Selection) -> Vec<ModelRef> {
    match selection {
        Selection::Component(component) => component.each_fulfilled_model(),
        Selection::Service(service) => service
            .each_fulfilled_service()
            .into_iter()
            .map(ModelRef::Service)
            .collect(),
        Selection::BoundService { service, .. } => service
            .each_fulfilled_service()
            .into_iter()
            .map(ModelRef::Service)
            .collect(),
        Selection::Requirements(requirements) => {
            let mut result = Vec::new();
            for model in requirements.models() {
                let fulfilled = match model {
                    ModelRef::Component(component) => component.each_fulfilled_model(),
                    ModelRef::Service(service) => service
                        .each_fulfilled_service()
                        .into_iter()
                        .map(ModelRef::Service)
                        .collect(),
                };
                for entry in fulfilled {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                }
            }
            result
        }
        Selection::Name(_) | Selection::Nothing => Vec::new(),
    }
}

fn merge_selection(key: &SelectionKey, left: &Selection, right: &Selection) -> Result<Selection> {
    if let (Selection::Service(l), Selection::Service(r)) = (left, right) {
        if l.fulfills(r) {
            return Ok(left.clone());
        }
        if r.fulfills(l) {
            return Ok(right.clone());
        }
    }
    if let (Some(l), Some(r)) = (left.component_model(), right.component_model()) {
        if l.fulfills(&ModelRef::Component(r.clone())) {
            return Ok(left.clone());
        }
        if r.fulfills(&ModelRef::Component(l.clone())) {
            return Ok(right.clone());
        }
    }
    Err(Error::IncompatibleSelections {
        key: key.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    })
}

fn map_model_error(error: component_models::Error) -> Error {
    match error {
        component_models::Error::InconsistentModelSet(a, b) => {
            Error::IncompatibleComponentModels(a, b)
        }
        other => Error::Model(other),
    }
}
