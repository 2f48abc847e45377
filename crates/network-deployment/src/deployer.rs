//! The deployment pass

use crate::{Error, MissingCandidate, MissingDeployments, Result};
use component_models::{ComponentModelRef, DeploymentBinding, DeploymentGroup};
use indexmap::IndexMap;
use network_plan::{can_merge, merge, Plan, TaskId};
use std::sync::Arc;
use tracing::debug;

/// (process server, deployment model, slot name)
type SlotKey = (String, String, String);

/// Outcome of a successful deployment pass
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    /// Per deployed task, the abstract task it absorbed
    pub deployed: Vec<(TaskId, TaskId)>,
    /// Execution agents created by the pass
    pub agents: Vec<TaskId>,
}

/// Binds the plan's remaining task contexts to deployment slots
pub struct SystemNetworkDeployer<'a> {
    plan: &'a mut Plan,
    default_group: Arc<DeploymentGroup>,
}

impl<'a> SystemNetworkDeployer<'a> {
    /// Create a deployer using `default_group` when no requirement narrows
    /// the choice
    pub fn new(plan: &'a mut Plan, default_group: Arc<DeploymentGroup>) -> Self {
        Self {
            plan,
            default_group,
        }
    }

    /// Associate every non-deployed task context with a deployment slot
    ///
    /// Selection runs first and does not touch the plan; only when every
    /// mandatory task found a free slot are the deployments instantiated and
    /// the tasks merged into them, one task at a time.
    pub fn deploy(&mut self) -> Result<DeploymentReport> {
        let mut used = self.slots_in_use();
        let mut missing = MissingDeployments::default();
        let mut selections: Vec<(TaskId, DeploymentBinding)> = Vec::new();

        let mut ids = self.plan.task_ids();
        ids.sort();
        for id in ids {
            let task = self.plan.task(id)?;
            let deployable = matches!(
                task.model,
                ComponentModelRef::TaskContext(_) | ComponentModelRef::Proxy(_)
            );
            if !deployable || task.has_execution_agent() || task.is_finished() {
                continue;
            }
            // abstract placeholders stay in the plan when unresolvable
            let mandatory = !task.is_abstract();

            let candidates = self.candidates_for(id);
            if candidates.is_empty() {
                if mandatory {
                    debug!(task = %id, "no deployment candidates");
                    missing.tasks.insert(id, Vec::new());
                } else {
                    debug!(task = %id, "abstract placeholder without deployment, left in plan");
                }
                continue;
            }

            let Some(binding) = self.disambiguate(id, &candidates) else {
                debug!(task = %id, candidates = candidates.len(), "deployment selection ambiguous");
                if mandatory {
                    missing
                        .tasks
                        .insert(id, missing_entry(&candidates, &used));
                }
                continue;
            };

            let key = slot_key(&binding);
            if used.get(&key).is_some_and(|users| !users.is_empty()) {
                debug!(task = %id, binding = %binding, "selected slot already taken");
                if mandatory {
                    missing
                        .tasks
                        .insert(id, missing_entry(&candidates, &used));
                }
                continue;
            }
            used.entry(key).or_default().push(id);
            selections.push((id, binding));
        }

        if !missing.is_empty() {
            return Err(Error::MissingDeployments(missing));
        }

        self.apply(selections)
    }

    /// Instantiate the selected slots and merge each task into its deployed
    /// counterpart
    fn apply(&mut self, selections: Vec<(TaskId, DeploymentBinding)>) -> Result<DeploymentReport> {
        let mut agents = self.existing_agents();
        let mut report = DeploymentReport::default();

        for (task_id, binding) in selections {
            let agent_key = (
                binding.process_server.clone(),
                binding.deployment.name.clone(),
            );
            let agent = match agents.get(&agent_key) {
                Some(&agent) => agent,
                None => {
                    let agent = self
                        .plan
                        .add_task(ComponentModelRef::Deployment(Arc::clone(&binding.deployment)));
                    // the agent's runtime name is the process server hosting it
                    self.plan.task_mut(agent)?.runtime_name =
                        Some(binding.process_server.clone());
                    agents.insert(agent_key, agent);
                    report.agents.push(agent);
                    agent
                }
            };

            let slot = binding
                .deployment
                .find_slot(&binding.slot_name)
                .ok_or_else(|| {
                    network_plan::Error::internal(format!(
                        "selected binding {binding} references a slot that does not exist"
                    ))
                })?;
            let deployed = self
                .plan
                .add_task(ComponentModelRef::TaskContext(Arc::clone(&slot.task_model)));
            {
                let node = self.plan.task_mut(deployed)?;
                node.runtime_name = Some(binding.slot_name.clone());
                node.execution_agent = Some(agent);
            }
            self.plan
                .add_dependency(agent, deployed, binding.slot_name.clone())?;

            // single-task merge so the task's connectivity carries over
            if !can_merge(self.plan, deployed, task_id) {
                return Err(Error::Plan(network_plan::Error::internal(format!(
                    "deployed task for {binding} cannot absorb task {task_id}"
                ))));
            }
            merge(self.plan, deployed, task_id)?;
            debug!(task = %task_id, binding = %binding, deployed = %deployed, "deployed");
            report.deployed.push((task_id, deployed));
        }
        Ok(report)
    }

    /// Candidate slots for a task: the first requirement group up the
    /// dependency chain that yields suitable slots, else the default group
    fn candidates_for(&self, id: TaskId) -> Vec<DeploymentBinding> {
        let Ok(task) = self.plan.task(id) else {
            return Vec::new();
        };
        let model = task.model.clone();

        let mut chain = vec![id];
        chain.extend(self.plan.dependencies().ancestors_of(id));
        for ancestor in chain {
            let Ok(ancestor_task) = self.plan.task(ancestor) else {
                continue;
            };
            if let Some(group) = ancestor_task.requirements.deployment_group() {
                let candidates: Vec<DeploymentBinding> = group
                    .find_all_suitable_deployments(&model)
                    .into_iter()
                    .cloned()
                    .collect();
                if !candidates.is_empty() {
                    debug!(task = %id, via = %ancestor, "deployment group found on requirement chain");
                    return candidates;
                }
            }
        }
        self.default_group
            .find_all_suitable_deployments(&model)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Narrow candidates by runtime name, then deployment hints
    fn disambiguate(&self, id: TaskId, candidates: &[DeploymentBinding]) -> Option<DeploymentBinding> {
        let task = self.plan.task(id).ok()?;
        let mut current: Vec<DeploymentBinding> = candidates.to_vec();

        if let Some(name) = &task.runtime_name {
            current.retain(|binding| binding.slot_name == *name);
            if current.is_empty() {
                return None;
            }
            if current.len() == 1 {
                return current.into_iter().next();
            }
        }

        if current.len() > 1 {
            let hints = task.requirements.deployment_hints();
            if !hints.is_empty() {
                let filtered: Vec<DeploymentBinding> = current
                    .iter()
                    .filter(|binding| hints.iter().any(|hint| hint.matches(binding)))
                    .cloned()
                    .collect();
                if !filtered.is_empty() {
                    current = filtered;
                }
            }
        }

        if current.len() == 1 {
            current.into_iter().next()
        } else {
            None
        }
    }

    /// Slots occupied by already-deployed tasks
    fn slots_in_use(&self) -> IndexMap<SlotKey, Vec<TaskId>> {
        let mut used: IndexMap<SlotKey, Vec<TaskId>> = IndexMap::new();
        for task in self.plan.each_task() {
            let (Some(agent), Some(name)) = (task.execution_agent, task.runtime_name.clone())
            else {
                continue;
            };
            let Ok(agent_task) = self.plan.task(agent) else {
                continue;
            };
            if let ComponentModelRef::Deployment(model) = &agent_task.model {
                let server = agent_task.runtime_name.clone().unwrap_or_default();
                used.entry((server, model.name.clone(), name))
                    .or_default()
                    .push(task.id);
            }
        }
        used
    }

    /// Execution agents already in the plan, by (process server, deployment)
    fn existing_agents(&self) -> IndexMap<(String, String), TaskId> {
        let mut agents = IndexMap::new();
        for task in self.plan.each_task() {
            if let ComponentModelRef::Deployment(model) = &task.model {
                let server = task.runtime_name.clone().unwrap_or_default();
                agents.insert((server, model.name.clone()), task.id);
            }
        }
        agents
    }
}

fn slot_key(binding: &DeploymentBinding) -> SlotKey {
    (
        binding.process_server.clone(),
        binding.deployment.name.clone(),
        binding.slot_name.clone(),
    )
}

fn missing_entry(
    candidates: &[DeploymentBinding],
    used: &IndexMap<SlotKey, Vec<TaskId>>,
) -> Vec<MissingCandidate> {
    candidates
        .iter()
        .map(|binding| MissingCandidate {
            binding: binding.clone(),
            users: used.get(&slot_key(binding)).cloned().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{
        ConnectionPolicy, DataServiceModel, DeploymentModel, ModelRef, Port, ProvidedService,
        ProxyTaskModel, TaskContextModel,
    };
    use dependency_injection::{DeploymentHint, InstanceRequirements};

    fn sonar_model() -> Arc<TaskContextModel> {
        Arc::new(TaskContextModel::new("sonar_driver"))
    }

    fn sensor_group(model: &Arc<TaskContextModel>) -> Arc<DeploymentGroup> {
        let deployment = Arc::new(
            DeploymentModel::new("sensors")
                .with_slot("sonar", Arc::clone(model))
                .with_slot("imu", Arc::clone(model)),
        );
        let mut group = DeploymentGroup::new();
        group.use_deployment("main", deployment);
        Arc::new(group)
    }

    #[test]
    fn test_runtime_name_picks_the_slot() {
        let model = sonar_model();
        let group = sensor_group(&model);

        let mut plan = Plan::new();
        let task = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));
        plan.task_mut(task).unwrap().runtime_name = Some("sonar".to_string());

        let report = SystemNetworkDeployer::new(&mut plan, group)
            .deploy()
            .unwrap();
        assert_eq!(report.deployed.len(), 1);
        assert_eq!(report.agents.len(), 1);

        let (_, deployed) = report.deployed[0];
        let node = plan.task(deployed).unwrap();
        assert_eq!(node.runtime_name.as_deref(), Some("sonar"));
        assert!(node.has_execution_agent());
        // the abstract task is gone, agent + deployed task remain
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_ambiguous_selection_is_missing() {
        let model = sonar_model();
        let group = sensor_group(&model);

        let mut plan = Plan::new();
        let task = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));

        let result = SystemNetworkDeployer::new(&mut plan, group).deploy();
        let Err(Error::MissingDeployments(missing)) = result else {
            panic!("expected MissingDeployments");
        };
        assert_eq!(missing.tasks[&task].len(), 2);
        // selection failed before any rewrite
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_hint_disambiguates() {
        let model = sonar_model();
        let group = sensor_group(&model);

        let mut plan = Plan::new();
        let task = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));
        plan.task_mut(task).unwrap().requirements = InstanceRequirements::default()
            .with_deployment_hint(DeploymentHint::SlotName("son.*".to_string()));

        let report = SystemNetworkDeployer::new(&mut plan, group)
            .deploy()
            .unwrap();
        let (_, deployed) = report.deployed[0];
        assert_eq!(
            plan.task(deployed).unwrap().runtime_name.as_deref(),
            Some("sonar")
        );
    }

    #[test]
    fn test_taken_slot_reports_users() {
        let model = sonar_model();
        let deployment = Arc::new(
            DeploymentModel::new("sensors").with_slot("sonar", Arc::clone(&model)),
        );
        let mut group = DeploymentGroup::new();
        group.use_deployment("main", deployment);
        let group = Arc::new(group);

        let mut plan = Plan::new();
        let first = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));
        let second = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));
        plan.task_mut(first).unwrap().set_argument("id", serde_json::json!(1));
        plan.task_mut(second).unwrap().set_argument("id", serde_json::json!(2));

        let result = SystemNetworkDeployer::new(&mut plan, group).deploy();
        let Err(Error::MissingDeployments(missing)) = result else {
            panic!("expected MissingDeployments");
        };
        assert_eq!(missing.tasks[&second][0].users, vec![first]);
    }

    #[test]
    fn test_proxy_resolves_to_providing_slot() {
        let service = Arc::new(
            DataServiceModel::new("image_source")
                .with_port(Port::output("images", "/base/samples/Frame")),
        );
        let camera = Arc::new(
            TaskContextModel::new("camera_driver")
                .with_port(Port::output("frame_output", "/base/samples/Frame"))
                .with_provides(
                    ProvidedService::new(Arc::clone(&service))
                        .with_port_mapping("images", "frame_output"),
                ),
        );
        let deployment = Arc::new(
            DeploymentModel::new("vision").with_slot("front_camera", Arc::clone(&camera)),
        );
        let mut group = DeploymentGroup::new();
        group.use_deployment("main", deployment);
        let group = Arc::new(group);

        let mut plan = Plan::new();
        let proxy = plan.add_task(ComponentModelRef::Proxy(Arc::new(
            ProxyTaskModel::synthesize(&[ModelRef::Service(Arc::clone(&service))]).unwrap(),
        )));
        let consumer = plan.add_task(ComponentModelRef::TaskContext(Arc::new(
            TaskContextModel::new("tracker").with_port(Port::input("frames", "/base/samples/Frame")),
        )));
        plan.connect(proxy, "images", consumer, "frames", ConnectionPolicy::Data)
            .unwrap();

        let report = SystemNetworkDeployer::new(&mut plan, group)
            .deploy()
            .unwrap();
        assert_eq!(report.deployed.len(), 1);

        // the proxy's service port was renamed onto the concrete task
        let connections = plan.flow().each_connection();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source_port, "frame_output");
        assert!(!plan.contains(proxy));
    }

    #[test]
    fn test_slots_of_one_deployment_share_the_agent() {
        let sonar = Arc::new(TaskContextModel::new("sonar_driver"));
        let imu = Arc::new(TaskContextModel::new("imu_driver"));
        let deployment = Arc::new(
            DeploymentModel::new("sensors")
                .with_slot("sonar", Arc::clone(&sonar))
                .with_slot("imu", Arc::clone(&imu)),
        );
        let mut group = DeploymentGroup::new();
        group.use_deployment("main", deployment);
        let group = Arc::new(group);

        let mut plan = Plan::new();
        plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&sonar)));
        plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&imu)));

        let report = SystemNetworkDeployer::new(&mut plan, group)
            .deploy()
            .unwrap();
        assert_eq!(report.deployed.len(), 2);
        assert_eq!(report.agents.len(), 1);

        let agent = report.agents[0];
        for (_, deployed) in &report.deployed {
            assert_eq!(plan.task(*deployed).unwrap().execution_agent, Some(agent));
        }
    }

    #[test]
    fn test_group_inherited_from_parent_requirements() {
        let model = sonar_model();
        let group = sensor_group(&model);

        let mut plan = Plan::new();
        let parent = plan.add_task(ComponentModelRef::Composition(Arc::new(
            component_models::CompositionModel::new("survey"),
        )));
        plan.task_mut(parent).unwrap().requirements =
            InstanceRequirements::default().with_deployment_group(Arc::clone(&group));
        let child = plan.add_task(ComponentModelRef::TaskContext(Arc::clone(&model)));
        plan.task_mut(child).unwrap().runtime_name = Some("imu".to_string());
        plan.add_dependency(parent, child, "driver").unwrap();

        // empty default group: candidates must come from the parent
        let report =
            SystemNetworkDeployer::new(&mut plan, Arc::new(DeploymentGroup::new()))
                .deploy()
                .unwrap();
        assert_eq!(report.deployed.len(), 1);
    }

    #[test]
    fn test_unresolvable_placeholder_is_not_an_error() {
        let service = Arc::new(DataServiceModel::new("laser_source"));
        let mut plan = Plan::new();
        let proxy = plan.add_task(ComponentModelRef::Proxy(Arc::new(
            ProxyTaskModel::synthesize(&[ModelRef::Service(service)]).unwrap(),
        )));

        let report =
            SystemNetworkDeployer::new(&mut plan, Arc::new(DeploymentGroup::new()))
                .deploy()
                .unwrap();
        assert!(report.deployed.is_empty());
        assert!(plan.contains(proxy));
    }
}
