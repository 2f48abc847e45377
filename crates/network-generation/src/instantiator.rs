//! Composition instantiation

use crate::specializations::matching_specialization;
use crate::{Error, Result};
use component_models::{
    ComponentModelRef, CompositionModel, ConnectionPolicy, ModelCatalog, PortDirection,
};
use dependency_injection::{
    DependencyInjection, InstanceRequirements, ResolvedComponent, SelectionKey,
};
use indexmap::IndexMap;
use network_plan::{Plan, TaskId};
use std::sync::Arc;
use tracing::debug;

/// Expands requirements into task graphs inside a plan
pub struct NetworkGenerator<'a> {
    catalog: &'a ModelCatalog,
}

#[derive(Clone)]
struct InstantiatedChild {
    task: TaskId,
    resolved: ResolvedComponent,
}

impl<'a> NetworkGenerator<'a> {
    /// Create a generator working against `catalog`
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    /// Instantiate `requirements` under `context`, returning the root task
    ///
    /// Compositions expand recursively; anything else becomes a single task.
    pub fn instantiate(
        &self,
        plan: &mut Plan,
        requirements: &InstanceRequirements,
        context: &DependencyInjection,
    ) -> Result<TaskId> {
        let context = context.resolve_names(self.catalog)?.resolve()?;
        let resolved = context.component_model_for(None, requirements)?;
        match resolved.model.clone() {
            ComponentModelRef::Composition(composition) => {
                self.instantiate_composition(plan, composition, requirements, &context)
            }
            _ => self.instantiate_leaf(plan, &resolved, requirements),
        }
    }

    fn instantiate_leaf(
        &self,
        plan: &mut Plan,
        resolved: &ResolvedComponent,
        requirements: &InstanceRequirements,
    ) -> Result<TaskId> {
        let task_id = plan.add_task(resolved.model.clone());
        let mut snapshot = requirements.clone();
        for selected in &resolved.selected_requirements {
            for hint in selected.deployment_hints() {
                snapshot = snapshot.with_deployment_hint(hint.clone());
            }
            if let Some(group) = selected.deployment_group() {
                if snapshot.deployment_group().is_none() {
                    snapshot = snapshot.with_deployment_group(Arc::clone(group));
                }
            }
            if snapshot.runtime_name().is_none() {
                if let Some(name) = selected.runtime_name() {
                    snapshot = snapshot.with_runtime_name(name);
                }
            }
        }

        let node = plan.task_mut(task_id)?;
        for (name, value) in requirements.arguments() {
            node.set_argument(name.clone(), value.clone());
        }
        for selected in &resolved.selected_requirements {
            for (name, value) in selected.arguments() {
                if !node.arguments.contains_key(name) {
                    node.set_argument(name.clone(), value.clone());
                }
            }
        }
        apply_argument_defaults(node);
        node.runtime_name = snapshot.runtime_name().map(String::from);
        node.requirements = snapshot;
        Ok(task_id)
    }

    fn instantiate_composition(
        &self,
        plan: &mut Plan,
        composition: Arc<CompositionModel>,
        requirements: &InstanceRequirements,
        context: &DependencyInjection,
    ) -> Result<TaskId> {
        let children = composition.each_child();

        let mut selections: IndexMap<String, ResolvedComponent> = IndexMap::new();
        let mut explicit_selections: IndexMap<String, ComponentModelRef> = IndexMap::new();
        for (name, child) in &children {
            let child_requirements =
                InstanceRequirements::new(child.required_models.iter().cloned());
            let resolved = context.component_model_for(Some(name.as_str()), &child_requirements)?;
            debug!(
                composition = %composition.name,
                child = %name,
                selected = %resolved.model,
                "selected composition child"
            );
            if is_explicitly_selected(context, name, &child.required_models) {
                explicit_selections.insert(name.clone(), resolved.model.clone());
            }
            selections.insert(name.clone(), resolved);
        }

        if let Some(specialization) = matching_specialization(&composition, &explicit_selections) {
            let specialized = Arc::clone(&specialization.specialized);
            if specialized.name != composition.name {
                return self.instantiate_composition(plan, specialized, requirements, context);
            }
        }

        let root = plan.add_task(ComponentModelRef::Composition(Arc::clone(&composition)));
        {
            let node = plan.task_mut(root)?;
            for (name, value) in requirements.arguments() {
                node.set_argument(name.clone(), value.clone());
            }
            node.runtime_name = requirements.runtime_name().map(String::from);
            node.requirements = requirements.clone();
        }

        let mut instantiated: IndexMap<String, InstantiatedChild> = IndexMap::new();
        for (name, child) in &children {
            let resolved = selections
                .get(name)
                .expect("every child was resolved above")
                .clone();
            if child.optional && resolved.model.is_abstract() {
                debug!(
                    composition = %composition.name,
                    child = %name,
                    "dropping optional child, selection stayed abstract"
                );
                continue;
            }

            let child_context = push_selections(context, name).resolve()?;
            let child_requirements =
                InstanceRequirements::new(child.required_models.iter().cloned());
            let task = match &resolved.model {
                ComponentModelRef::Composition(sub) => self.instantiate_composition(
                    plan,
                    Arc::clone(sub),
                    &child_requirements,
                    &child_context,
                )?,
                _ => self.instantiate_leaf(plan, &resolved, &child_requirements)?,
            };
            plan.add_dependency(root, task, name.clone())?;
            instantiated.insert(name.clone(), InstantiatedChild { task, resolved });
        }

        self.wire_declared_connections(plan, &composition, &instantiated)?;
        self.autoconnect(plan, &composition, &instantiated)?;
        self.forward_exports(plan, &composition, root, &instantiated)?;

        Ok(root)
    }

    fn wire_declared_connections(
        &self,
        plan: &mut Plan,
        composition: &CompositionModel,
        instantiated: &IndexMap<String, InstantiatedChild>,
    ) -> Result<()> {
        for connection in composition.each_connection() {
            let (Some(source), Some(sink)) = (
                instantiated.get(&connection.source_child),
                instantiated.get(&connection.sink_child),
            ) else {
                // a dropped optional child takes its connections with it
                continue;
            };
            for pair in &connection.ports {
                let source_port =
                    map_child_port(composition, &connection.source_child, &source.resolved, &pair.source_port)?;
                let sink_port =
                    map_child_port(composition, &connection.sink_child, &sink.resolved, &pair.sink_port)?;
                plan.connect(
                    source.task,
                    source_port,
                    sink.task,
                    sink_port,
                    pair.policy.clone(),
                )?;
            }
        }
        Ok(())
    }

    /// Connect remaining input ports to the unique type-compatible producer
    fn autoconnect(
        &self,
        plan: &mut Plan,
        composition: &CompositionModel,
        instantiated: &IndexMap<String, InstantiatedChild>,
    ) -> Result<()> {
        let types = self.catalog.types();

        let mut outputs: Vec<(String, TaskId, component_models::Port)> = Vec::new();
        for (name, child) in instantiated {
            for port in child.resolved.model.each_port() {
                if port.direction == PortDirection::Output {
                    outputs.push((name.clone(), child.task, port));
                }
            }
        }

        for (name, child) in instantiated {
            for port in child.resolved.model.each_port() {
                if port.direction != PortDirection::Input {
                    continue;
                }
                let already_connected = plan
                    .flow()
                    .incoming(child.task)
                    .iter()
                    .any(|c| c.sink_port == port.name)
                    || plan
                        .flow()
                        .each_forward()
                        .iter()
                        .any(|(_, _, sink, sink_port)| {
                            *sink == child.task && *sink_port == port.name
                        });
                if already_connected {
                    continue;
                }

                let mut candidates: Vec<&(String, TaskId, component_models::Port)> = outputs
                    .iter()
                    .filter(|(_, task, output)| {
                        *task != child.task && types.compatible(&output.data_type, &port.data_type)
                    })
                    .collect();
                if candidates.is_empty() {
                    debug!(
                        composition = %composition.name,
                        child = %name,
                        port = %port.name,
                        "no producer for input port, left unconnected"
                    );
                    continue;
                }

                if candidates.len() > 1 {
                    let by_name: Vec<_> = candidates
                        .iter()
                        .copied()
                        .filter(|(_, _, output)| output.name == port.name)
                        .collect();
                    if !by_name.is_empty() {
                        candidates = by_name;
                    }
                }
                if candidates.len() > 1 {
                    let by_child: Vec<_> = candidates
                        .iter()
                        .copied()
                        .filter(|(producer, _, _)| port.name.contains(producer.as_str()))
                        .collect();
                    if !by_child.is_empty() {
                        candidates = by_child;
                    }
                }

                if candidates.len() > 1 {
                    return Err(Error::AmbiguousAutoConnection {
                        composition: composition.name.clone(),
                        child: name.clone(),
                        port: port.name.clone(),
                        candidates: candidates
                            .iter()
                            .map(|(producer, _, output)| format!("{producer}.{}", output.name))
                            .collect(),
                    });
                }

                let (producer, producer_task, output) = candidates[0];
                debug!(
                    composition = %composition.name,
                    source = %format!("{producer}.{}", output.name),
                    sink = %format!("{name}.{}", port.name),
                    "autoconnected"
                );
                plan.connect(
                    *producer_task,
                    output.name.clone(),
                    child.task,
                    port.name.clone(),
                    ConnectionPolicy::default(),
                )?;
            }
        }
        Ok(())
    }

    fn forward_exports(
        &self,
        plan: &mut Plan,
        composition: &CompositionModel,
        root: TaskId,
        instantiated: &IndexMap<String, InstantiatedChild>,
    ) -> Result<()> {
        for export in composition.each_export() {
            let Some(child) = instantiated.get(&export.child) else {
                continue;
            };
            let mapped = map_child_port(composition, &export.child, &child.resolved, &export.child_port)?;
            match export.direction {
                PortDirection::Output => {
                    plan.add_forward(child.task, mapped, root, export.name.clone())?;
                }
                PortDirection::Input => {
                    plan.add_forward(root, export.name.clone(), child.task, mapped)?;
                }
            }
        }
        Ok(())
    }
}

/// Apply declared argument defaults to unset arguments
fn apply_argument_defaults(node: &mut network_plan::TaskNode) {
    let task_model = match &node.model {
        ComponentModelRef::TaskContext(model) => Some(Arc::clone(model)),
        ComponentModelRef::Proxy(proxy) => proxy.task_model.clone(),
        ComponentModelRef::Composition(_) | ComponentModelRef::Deployment(_) => None,
    };
    let Some(model) = task_model else {
        return;
    };
    for argument in model.each_argument() {
        if let Some(default) = &argument.default {
            if !node.arguments.contains_key(&argument.name) {
                node.set_argument(argument.name.clone(), default.clone());
            }
        }
    }
}

/// Whether the context explicitly selects this child
fn is_explicitly_selected(
    context: &DependencyInjection,
    child_name: &str,
    required_models: &[component_models::ModelRef],
) -> bool {
    if context
        .explicit_selection_for(&SelectionKey::name(child_name))
        .is_some()
    {
        return true;
    }
    required_models.iter().any(|model| {
        context
            .explicit_selection_for(&SelectionKey::for_model(model))
            .is_some()
    })
}

/// Rewrite `child.sub` keys to `sub` when entering `child`; everything else
/// stays behind
fn push_selections(context: &DependencyInjection, child_name: &str) -> DependencyInjection {
    let prefix = format!("{child_name}.");
    let mut pushed = DependencyInjection::new();
    for (key, selection) in context.each_explicit() {
        if let SelectionKey::Name(name) = key {
            if let Some(sub_key) = name.strip_prefix(&prefix) {
                pushed.add_explicit(SelectionKey::name(sub_key), selection.clone());
            }
        }
    }
    pushed
}

/// Translate a declared port name into the selected component's port name
fn map_child_port(
    composition: &CompositionModel,
    child_name: &str,
    resolved: &ResolvedComponent,
    port_name: &str,
) -> Result<String> {
    let mut mapped = port_name.to_string();
    for provided in resolved.selected_services.values() {
        if provided.service.find_port(port_name).is_some() {
            mapped = provided.map_port(port_name).to_string();
            break;
        }
    }
    if resolved.model.find_port(&mapped).is_none() {
        return Err(Error::AmbiguousChildConnection {
            composition: composition.name.clone(),
            child: child_name.to_string(),
            port: port_name.to_string(),
            reason: format!("no port {mapped} on selected model {}", resolved.model),
        });
    }
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{
        ChildConnection, CompositionChild, DataServiceModel, ExportedPort, ModelRef, Port,
        PortPair, ProvidedService, Specialization, TaskContextModel,
    };
    use dependency_injection::Selection;
    use serde_json::json;

    const FRAME: &str = "/base/samples/Frame";

    fn image_source() -> Arc<DataServiceModel> {
        Arc::new(DataServiceModel::new("image_source").with_port(Port::output("images", FRAME)))
    }

    fn image_sink() -> Arc<DataServiceModel> {
        Arc::new(DataServiceModel::new("image_sink").with_port(Port::input("images", FRAME)))
    }

    fn camera_task(service: &Arc<DataServiceModel>) -> Arc<TaskContextModel> {
        Arc::new(
            TaskContextModel::new("camera_driver")
                .with_port(Port::output("frame_output", FRAME))
                .with_provides(
                    ProvidedService::new(Arc::clone(service))
                        .with_port_mapping("images", "frame_output"),
                ),
        )
    }

    fn tracker_task(service: &Arc<DataServiceModel>) -> Arc<TaskContextModel> {
        Arc::new(
            TaskContextModel::new("object_tracker")
                .with_port(Port::input("frames", FRAME))
                .with_provides(
                    ProvidedService::new(Arc::clone(service))
                        .with_port_mapping("images", "frames"),
                ),
        )
    }

    fn tracker_composition(
        source: &Arc<DataServiceModel>,
        sink: &Arc<DataServiceModel>,
    ) -> CompositionModel {
        CompositionModel::new("tracking")
            .with_child(CompositionChild::new(
                "camera",
                vec![ModelRef::Service(Arc::clone(source))],
            ))
            .with_child(CompositionChild::new(
                "tracker",
                vec![ModelRef::Service(Arc::clone(sink))],
            ))
            .with_connection(ChildConnection {
                source_child: "camera".to_string(),
                sink_child: "tracker".to_string(),
                ports: vec![PortPair {
                    source_port: "images".to_string(),
                    sink_port: "images".to_string(),
                    policy: ConnectionPolicy::Buffer { size: 2 },
                }],
            })
    }

    fn selecting_context(
        source: &Arc<DataServiceModel>,
        sink: &Arc<DataServiceModel>,
        camera: &Arc<TaskContextModel>,
        tracker: &Arc<TaskContextModel>,
    ) -> DependencyInjection {
        let mut context = DependencyInjection::new();
        context.add_explicit(
            SelectionKey::Service(Arc::clone(source)),
            Selection::from_task(Arc::clone(camera)),
        );
        context.add_explicit(
            SelectionKey::Service(Arc::clone(sink)),
            Selection::from_task(Arc::clone(tracker)),
        );
        context
    }

    #[test]
    fn test_instantiates_children_and_applies_port_mappings() {
        let source = image_source();
        let sink = image_sink();
        let camera = camera_task(&source);
        let tracker = tracker_task(&sink);
        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);

        let composition = Arc::new(tracker_composition(&source, &sink));
        let context = selecting_context(&source, &sink, &camera, &tracker);
        let requirements = InstanceRequirements::from_model(Arc::clone(&composition));

        let mut plan = Plan::new();
        let root = generator
            .instantiate(&mut plan, &requirements, &context)
            .unwrap();

        // root + two children
        assert_eq!(plan.len(), 3);
        let children = plan.dependencies().children_of(root);
        assert_eq!(children.len(), 2);

        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source_port, "frame_output");
        assert_eq!(connections[0].sink_port, "frames");
        assert_eq!(connections[0].policy, ConnectionPolicy::Buffer { size: 2 });
    }

    #[test]
    fn test_unselected_children_become_proxies() {
        let source = image_source();
        let sink = image_sink();
        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);

        let composition = Arc::new(tracker_composition(&source, &sink));
        let requirements = InstanceRequirements::from_model(Arc::clone(&composition));

        let mut plan = Plan::new();
        let root = generator
            .instantiate(&mut plan, &requirements, &DependencyInjection::new())
            .unwrap();

        let children = plan.dependencies().children_of(root);
        assert_eq!(children.len(), 2);
        for (child, _) in children {
            assert!(plan.task(child).unwrap().is_abstract());
        }
        // proxies expose the service ports, so the declared connection wires
        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source_port, "images");
    }

    #[test]
    fn test_autoconnect_unique_type_match() {
        let producer = Arc::new(
            TaskContextModel::new("pose_estimator").with_port(Port::output("pose", "/base/Pose")),
        );
        let consumer = Arc::new(
            TaskContextModel::new("pose_logger").with_port(Port::input("input", "/base/Pose")),
        );
        let composition = Arc::new(
            CompositionModel::new("logging")
                .with_child(CompositionChild::new(
                    "estimator",
                    vec![ModelRef::from(Arc::clone(&producer))],
                ))
                .with_child(CompositionChild::new(
                    "logger",
                    vec![ModelRef::from(Arc::clone(&consumer))],
                )),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&composition)),
                &DependencyInjection::new(),
            )
            .unwrap();

        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source_port, "pose");
        assert_eq!(connections[0].sink_port, "input");
    }

    #[test]
    fn test_autoconnect_ambiguity_is_an_error() {
        let left = Arc::new(
            TaskContextModel::new("left_estimator").with_port(Port::output("pose", "/base/Pose")),
        );
        let right = Arc::new(
            TaskContextModel::new("right_estimator")
                .with_port(Port::output("estimate", "/base/Pose")),
        );
        let consumer = Arc::new(
            TaskContextModel::new("pose_logger").with_port(Port::input("input", "/base/Pose")),
        );
        let composition = Arc::new(
            CompositionModel::new("logging")
                .with_child(CompositionChild::new(
                    "left",
                    vec![ModelRef::from(Arc::clone(&left))],
                ))
                .with_child(CompositionChild::new(
                    "right",
                    vec![ModelRef::from(Arc::clone(&right))],
                ))
                .with_child(CompositionChild::new(
                    "logger",
                    vec![ModelRef::from(Arc::clone(&consumer))],
                )),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        let result = generator.instantiate(
            &mut plan,
            &InstanceRequirements::from_model(Arc::clone(&composition)),
            &DependencyInjection::new(),
        );
        assert!(matches!(
            result,
            Err(Error::AmbiguousAutoConnection { .. })
        ));
    }

    #[test]
    fn test_autoconnect_prefers_producer_named_in_port() {
        let left = Arc::new(
            TaskContextModel::new("odometry").with_port(Port::output("pose", "/base/Pose")),
        );
        let right = Arc::new(
            TaskContextModel::new("gps").with_port(Port::output("pose", "/base/Pose")),
        );
        let consumer = Arc::new(
            TaskContextModel::new("fusion").with_port(Port::input("gps_pose", "/base/Pose")),
        );
        let composition = Arc::new(
            CompositionModel::new("pose_fusion")
                .with_child(CompositionChild::new(
                    "odometry",
                    vec![ModelRef::from(Arc::clone(&left))],
                ))
                .with_child(CompositionChild::new(
                    "gps",
                    vec![ModelRef::from(Arc::clone(&right))],
                ))
                .with_child(CompositionChild::new(
                    "fusion",
                    vec![ModelRef::from(Arc::clone(&consumer))],
                )),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        let root = generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&composition)),
                &DependencyInjection::new(),
            )
            .unwrap();

        let gps_task = plan
            .dependencies()
            .children_of(root)
            .into_iter()
            .find(|(_, role)| *role == "gps")
            .unwrap()
            .0;
        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source, gps_task);
        assert_eq!(connections[0].sink_port, "gps_pose");
    }

    #[test]
    fn test_optional_child_dropped_when_abstract() {
        let source = image_source();
        let camera = camera_task(&source);
        let logger_service = Arc::new(
            DataServiceModel::new("frame_logger").with_port(Port::input("frames", FRAME)),
        );
        let composition = Arc::new(
            CompositionModel::new("capture")
                .with_child(CompositionChild::new(
                    "camera",
                    vec![ModelRef::Service(Arc::clone(&source))],
                ))
                .with_child(
                    CompositionChild::new(
                        "logger",
                        vec![ModelRef::Service(Arc::clone(&logger_service))],
                    )
                    .as_optional(),
                ),
        );

        let mut context = DependencyInjection::new();
        context.add_explicit(
            SelectionKey::Service(Arc::clone(&source)),
            Selection::from_task(Arc::clone(&camera)),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        let root = generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&composition)),
                &context,
            )
            .unwrap();

        let children = plan.dependencies().children_of(root);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].1, "camera");
    }

    #[test]
    fn test_exports_create_forward_edges() {
        let source = image_source();
        let camera = camera_task(&source);
        let composition = Arc::new(
            CompositionModel::new("capture")
                .with_child(CompositionChild::new(
                    "camera",
                    vec![ModelRef::Service(Arc::clone(&source))],
                ))
                .with_export(ExportedPort {
                    name: "frames".to_string(),
                    direction: PortDirection::Output,
                    data_type: FRAME.to_string(),
                    child: "camera".to_string(),
                    child_port: "images".to_string(),
                }),
        );

        let mut context = DependencyInjection::new();
        context.add_explicit(
            SelectionKey::Service(Arc::clone(&source)),
            Selection::from_task(Arc::clone(&camera)),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        let root = generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&composition)),
                &context,
            )
            .unwrap();

        let forwards = plan.flow().each_forward();
        assert_eq!(forwards.len(), 1);
        let (forward_source, source_port, sink, sink_port) = &forwards[0];
        assert_eq!(*sink, root);
        assert_eq!(sink_port, "frames");
        assert_eq!(source_port, "frame_output");
        assert_ne!(*forward_source, root);
    }

    #[test]
    fn test_specialization_switches_composition_model() {
        let source = image_source();
        let camera = camera_task(&source);

        let specialized = Arc::new(
            CompositionModel::new("capture_with_camera").with_child(CompositionChild::new(
                "camera",
                vec![ModelRef::Service(Arc::clone(&source))],
            )),
        );
        let mut constraints = IndexMap::new();
        constraints.insert(
            "camera".to_string(),
            vec![ModelRef::from(Arc::clone(&camera))],
        );
        let composition = Arc::new(
            CompositionModel::new("capture")
                .with_child(CompositionChild::new(
                    "camera",
                    vec![ModelRef::Service(Arc::clone(&source))],
                ))
                .with_specialization(Specialization {
                    constraints,
                    specialized: Arc::clone(&specialized),
                }),
        );

        let mut context = DependencyInjection::new();
        context.add_explicit(
            SelectionKey::Service(Arc::clone(&source)),
            Selection::from_task(Arc::clone(&camera)),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        let root = generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&composition)),
                &context,
            )
            .unwrap();

        assert_eq!(
            plan.task(root).unwrap().model.name(),
            "capture_with_camera"
        );
    }

    #[test]
    fn test_selection_prefix_reaches_nested_children() {
        let source = image_source();
        let camera = camera_task(&source);

        let inner = Arc::new(
            CompositionModel::new("capture").with_child(CompositionChild::new(
                "camera",
                vec![ModelRef::Service(Arc::clone(&source))],
            )),
        );
        let outer = Arc::new(
            CompositionModel::new("mission").with_child(CompositionChild::new(
                "capture",
                vec![ModelRef::from(Arc::clone(&inner))],
            )),
        );

        let mut context = DependencyInjection::new();
        context.add_explicit(
            SelectionKey::name("capture.camera"),
            Selection::from_task(Arc::clone(&camera)),
        );

        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);
        let mut plan = Plan::new();
        generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&outer)),
                &context,
            )
            .unwrap();

        // outer root, inner root and the selected camera driver
        assert_eq!(plan.len(), 3);
        assert!(plan
            .each_task()
            .any(|task| task.model.name() == "camera_driver"));
    }

    #[test]
    fn test_argument_defaults_applied_at_instantiation() {
        let model = Arc::new(
            TaskContextModel::new("motor_controller")
                .with_argument(component_models::ArgumentDecl::with_default(
                    "rate",
                    json!(100),
                )),
        );
        let catalog = ModelCatalog::new();
        let generator = NetworkGenerator::new(&catalog);

        let mut plan = Plan::new();
        let task = generator
            .instantiate(
                &mut plan,
                &InstanceRequirements::from_model(Arc::clone(&model))
                    .with_argument("device", json!("m0")),
                &DependencyInjection::new(),
            )
            .unwrap();

        let node = plan.task(task).unwrap();
        assert_eq!(node.arguments["rate"], json!(100));
        assert_eq!(node.arguments["device"], json!("m0"));
    }
}
