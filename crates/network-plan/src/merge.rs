//! The merge capability: one task absorbing an equivalent one
//!
//! Merging dispatches over the component families through the model
//! references: a survivor can absorb a victim when its model fulfills the
//! victim's, their arguments agree, and their input connections do not
//! conflict. Proxy victims have their service port names renamed onto the
//! survivor's concrete ports.

use crate::plan::Plan;
use crate::task::TaskId;
use crate::{Error, Result};
use component_models::{ComponentModelRef, ModelRef};
use indexmap::IndexMap;
use tracing::debug;

/// Port renaming applied when `victim`'s edges move onto `survivor`
///
/// Proxy tasks expose service port names; the fulfilling component may map
/// them to differently-named concrete ports.
pub fn merge_port_mappings(
    survivor: &ComponentModelRef,
    victim: &ComponentModelRef,
) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    if let ComponentModelRef::Proxy(proxy) = victim {
        for service in &proxy.services {
            if let Some(provided) = survivor.find_provided_service(service) {
                for port in &service.ports {
                    let mapped = provided.map_port(&port.name);
                    if mapped != port.name {
                        map.insert(port.name.clone(), mapped.to_string());
                    }
                }
            }
        }
    }
    map
}

/// Whether `survivor` can absorb `victim`
///
/// Checks structural compatibility only; lifecycle ordering is the merge
/// solver's concern.
pub fn can_merge(plan: &Plan, survivor: TaskId, victim: TaskId) -> bool {
    if survivor == victim {
        return false;
    }
    let (Ok(survivor_task), Ok(victim_task)) = (plan.task(survivor), plan.task(victim)) else {
        return false;
    };

    // the survivor must promise everything the victim's model promises
    let target = ModelRef::Component(victim_task.model.clone());
    if !survivor_task.model.fulfills(&target) {
        return false;
    }

    // arguments set on both sides must agree
    for (name, value) in &victim_task.arguments {
        if let Some(existing) = survivor_task.arguments.get(name) {
            if existing != value {
                return false;
            }
        }
    }

    // runtime names set on both sides must agree
    if let (Some(left), Some(right)) = (
        survivor_task.runtime_name.as_deref(),
        victim_task.runtime_name.as_deref(),
    ) {
        if left != right {
            return false;
        }
    }

    // an input port may not end up with two different sources or policies
    let port_map = merge_port_mappings(&survivor_task.model, &victim_task.model);
    let survivor_inputs = plan.flow().incoming(survivor);
    for connection in plan.flow().incoming(victim) {
        let mapped_port = port_map
            .get(&connection.sink_port)
            .cloned()
            .unwrap_or_else(|| connection.sink_port.clone());
        for existing in &survivor_inputs {
            if existing.sink_port != mapped_port {
                continue;
            }
            if existing.source != connection.source
                || existing.source_port != connection.source_port
                || existing.policy != connection.policy
            {
                return false;
            }
        }
    }

    true
}

/// Absorb `victim` into `survivor`
///
/// Arguments and the runtime name are combined, then every edge of the
/// victim is rewired onto the survivor and the victim leaves the plan.
/// Callers check [`can_merge`] first; merging a task with itself is an
/// internal invariant violation.
pub fn merge(plan: &mut Plan, survivor: TaskId, victim: TaskId) -> Result<()> {
    if survivor == victim {
        return Err(Error::internal(format!(
            "attempted to merge task {survivor} with itself"
        )));
    }

    let victim_task = plan.task(victim)?;
    let victim_arguments = victim_task.arguments.clone();
    let victim_runtime_name = victim_task.runtime_name.clone();
    let victim_requirements = victim_task.requirements.clone();
    let port_map = merge_port_mappings(&plan.task(survivor)?.model, &victim_task.model);

    {
        let survivor_task = plan.task_mut(survivor)?;
        for (name, value) in victim_arguments {
            survivor_task.arguments.entry(name).or_insert(value);
        }
        if survivor_task.runtime_name.is_none() {
            survivor_task.runtime_name = victim_runtime_name;
        }
        if let Ok(merged) = survivor_task.requirements.merge(&victim_requirements) {
            survivor_task.requirements = merged;
        }
    }

    debug!(survivor = %survivor, victim = %victim, "merging task");
    plan.replace_task(victim, survivor, &port_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{
        ConnectionPolicy, DataServiceModel, Port, ProvidedService, ProxyTaskModel,
        TaskContextModel,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn model(name: &str) -> ComponentModelRef {
        ComponentModelRef::TaskContext(Arc::new(TaskContextModel::new(name)))
    }

    #[test]
    fn test_identical_pending_tasks_can_merge() {
        let mut plan = Plan::new();
        let first = plan.add_task(model("camera_driver"));
        let second = plan.add_task(model("camera_driver"));

        assert!(can_merge(&plan, first, second));
        assert!(can_merge(&plan, second, first));

        merge(&mut plan, first, second).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.contains(first));
    }

    #[test]
    fn test_argument_conflict_blocks_merge() {
        let mut plan = Plan::new();
        let first = plan.add_task(model("camera_driver"));
        let second = plan.add_task(model("camera_driver"));
        plan.task_mut(first).unwrap().set_argument("rate", json!(30));
        plan.task_mut(second).unwrap().set_argument("rate", json!(60));

        assert!(!can_merge(&plan, first, second));
    }

    #[test]
    fn test_conflicting_input_sources_block_merge() {
        let mut plan = Plan::new();
        let source_a = plan.add_task(model("producer_a"));
        let source_b = plan.add_task(model("producer_b"));
        let first = plan.add_task(model("consumer"));
        let second = plan.add_task(model("consumer"));

        plan.connect(source_a, "out", first, "in", ConnectionPolicy::Data)
            .unwrap();
        plan.connect(source_b, "out", second, "in", ConnectionPolicy::Data)
            .unwrap();

        assert!(!can_merge(&plan, first, second));

        // same source, same policy: mergeable
        plan.disconnect(source_b, "out", second, "in");
        plan.connect(source_a, "out", second, "in", ConnectionPolicy::Data)
            .unwrap();
        assert!(can_merge(&plan, first, second));
    }

    #[test]
    fn test_proxy_merge_renames_service_ports() {
        let service = Arc::new(
            DataServiceModel::new("image_source")
                .with_port(Port::output("images", "/base/samples/Frame")),
        );
        let concrete = ComponentModelRef::TaskContext(Arc::new(
            TaskContextModel::new("camera_driver")
                .with_port(Port::output("frame_output", "/base/samples/Frame"))
                .with_provides(
                    ProvidedService::new(Arc::clone(&service))
                        .with_port_mapping("images", "frame_output"),
                ),
        ));
        let proxy = ComponentModelRef::Proxy(Arc::new(
            ProxyTaskModel::synthesize(&[ModelRef::Service(Arc::clone(&service))]).unwrap(),
        ));

        let mut plan = Plan::new();
        let concrete_task = plan.add_task(concrete);
        let proxy_task = plan.add_task(proxy);
        let consumer = plan.add_task(model("consumer"));
        plan.connect(proxy_task, "images", consumer, "in", ConnectionPolicy::Data)
            .unwrap();

        assert!(can_merge(&plan, concrete_task, proxy_task));
        merge(&mut plan, concrete_task, proxy_task).unwrap();

        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source, concrete_task);
        assert_eq!(connections[0].source_port, "frame_output");
    }

    #[test]
    fn test_merge_with_self_is_fatal() {
        let mut plan = Plan::new();
        let task = plan.add_task(model("camera_driver"));
        assert!(matches!(
            merge(&mut plan, task, task),
            Err(Error::Internal(_))
        ));
    }
}
