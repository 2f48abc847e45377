//! The plan: exclusive owner of tasks and their graphs

use crate::dependency::DependencyGraph;
use crate::flow::DataFlowGraph;
use crate::task::{TaskId, TaskNode};
use crate::{Error, Result};
use component_models::{ComponentModelRef, ConnectionPolicy};
use indexmap::IndexMap;
use tracing::debug;

/// The task graph rewritten by the planner
///
/// The plan owns its tasks by identity; graphs store task ids, never owning
/// references. Removing or replacing a task transfers or drops its edges.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    tasks: IndexMap<TaskId, TaskNode>,
    flow: DataFlowGraph,
    dependencies: DependencyGraph,
    next_task_id: u32,
}

impl Plan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task of the given model; returns its id
    pub fn add_task(&mut self, model: ComponentModelRef) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        debug!(task = %id, model = %model, "added task");
        self.tasks.insert(id, TaskNode::new(id, model));
        id
    }

    /// Whether `id` is in the plan
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// The task with the given id
    pub fn task(&self, id: TaskId) -> Result<&TaskNode> {
        self.tasks.get(&id).ok_or(Error::UnknownTask(id))
    }

    /// Mutable access to the task with the given id
    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut TaskNode> {
        self.tasks.get_mut(&id).ok_or(Error::UnknownTask(id))
    }

    /// All tasks, in insertion order
    pub fn each_task(&self) -> impl Iterator<Item = &TaskNode> {
        self.tasks.values()
    }

    /// All task ids, in insertion order
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }

    /// Number of tasks in the plan
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The data-flow graph
    pub fn flow(&self) -> &DataFlowGraph {
        &self.flow
    }

    /// The dependency graph
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Connect two task ports
    pub fn connect(
        &mut self,
        source: TaskId,
        source_port: impl Into<String>,
        sink: TaskId,
        sink_port: impl Into<String>,
        policy: ConnectionPolicy,
    ) -> Result<()> {
        self.task(source)?;
        self.task(sink)?;
        self.flow.connect(source, source_port, sink, sink_port, policy);
        Ok(())
    }

    /// Remove a connection
    pub fn disconnect(
        &mut self,
        source: TaskId,
        source_port: &str,
        sink: TaskId,
        sink_port: &str,
    ) -> bool {
        self.flow.disconnect(source, source_port, sink, sink_port)
    }

    /// Add a forward edge for an exported composition port
    pub fn add_forward(
        &mut self,
        source: TaskId,
        source_port: impl Into<String>,
        sink: TaskId,
        sink_port: impl Into<String>,
    ) -> Result<()> {
        self.task(source)?;
        self.task(sink)?;
        self.flow.add_forward(source, source_port, sink, sink_port);
        Ok(())
    }

    /// Add a dependency edge from `parent` to `child`
    pub fn add_dependency(
        &mut self,
        parent: TaskId,
        child: TaskId,
        role: impl Into<String>,
    ) -> Result<()> {
        self.task(parent)?;
        self.task(child)?;
        self.dependencies.add_dependency(parent, child, role);
        Ok(())
    }

    /// Remove a dependency edge
    pub fn remove_dependency(&mut self, parent: TaskId, child: TaskId) -> bool {
        self.dependencies.remove_dependency(parent, child)
    }

    /// Remove a task along with all its edges
    ///
    /// Tasks deployed through the removed task lose their execution agent.
    pub fn remove_task(&mut self, id: TaskId) -> Result<TaskNode> {
        let node = self
            .tasks
            .shift_remove(&id)
            .ok_or(Error::UnknownTask(id))?;
        self.flow.remove_task(id);
        self.dependencies.remove_task(id);
        for task in self.tasks.values_mut() {
            if task.execution_agent == Some(id) {
                task.execution_agent = None;
            }
        }
        debug!(task = %id, "removed task");
        Ok(node)
    }

    /// Replace `replaced` by `survivor`, transferring all edges
    ///
    /// `port_map` renames `replaced`'s port names onto `survivor`'s.
    /// `replaced` is removed from the plan.
    pub fn replace_task(
        &mut self,
        replaced: TaskId,
        survivor: TaskId,
        port_map: &IndexMap<String, String>,
    ) -> Result<()> {
        if replaced == survivor {
            return Err(Error::internal(format!(
                "attempted to replace task {replaced} with itself"
            )));
        }
        self.task(survivor)?;
        self.task(replaced)?;

        self.flow.rewire(replaced, survivor, port_map);
        self.dependencies.rewire(replaced, survivor);
        self.tasks.shift_remove(&replaced);
        for task in self.tasks.values_mut() {
            if task.execution_agent == Some(replaced) {
                task.execution_agent = Some(survivor);
            }
        }
        debug!(replaced = %replaced, survivor = %survivor, "replaced task");
        Ok(())
    }
}
