//! Tasks and their lifecycle

use component_models::ComponentModelRef;
use dependency_injection::InstanceRequirements;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Stable task identifier, assigned monotonically by the plan
///
/// Ordering over task ids is the deterministic tie-break used whenever an
/// algorithm must pick among equally-ranked tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    /// The raw index value
    pub fn index(self) -> u32 {
        self.0
    }

    /// Rebuild an id from its raw index
    ///
    /// Ids are normally handed out by [`crate::Plan::add_task`]; this exists
    /// for graph code and tests that manipulate ids standalone.
    pub fn from_index(index: u32) -> Self {
        TaskId(index)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Execution state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Not started yet
    Pending,
    /// Currently executing
    Running,
    /// Ran to completion
    Finished,
}

/// A task in the plan
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// The task's identifier within its plan
    pub id: TaskId,
    /// The component model this task instantiates
    pub model: ComponentModelRef,
    /// Argument values set so far
    pub arguments: IndexMap<String, Value>,
    /// Execution state
    pub state: ExecutionState,
    /// The deployment task owning this task's runtime, once deployed
    pub execution_agent: Option<TaskId>,
    /// The name the task has (or will have) on its process server
    pub runtime_name: Option<String>,
    /// Stand-in for a task that already exists in the committed plan
    pub transaction_proxy: bool,
    /// The requirements this task was instantiated from
    pub requirements: InstanceRequirements,
}

impl TaskNode {
    pub(crate) fn new(id: TaskId, model: ComponentModelRef) -> Self {
        Self {
            id,
            model,
            arguments: IndexMap::new(),
            state: ExecutionState::Pending,
            execution_agent: None,
            runtime_name: None,
            transaction_proxy: false,
            requirements: InstanceRequirements::default(),
        }
    }

    /// Whether the task is a placeholder that cannot be deployed as-is
    pub fn is_abstract(&self) -> bool {
        self.model.is_abstract()
    }

    /// Whether the task has not started yet
    pub fn is_pending(&self) -> bool {
        self.state == ExecutionState::Pending
    }

    /// Whether the task is currently executing
    pub fn is_running(&self) -> bool {
        self.state == ExecutionState::Running
    }

    /// Whether the task ran to completion
    pub fn is_finished(&self) -> bool {
        self.state == ExecutionState::Finished
    }

    /// Whether the task is bound to a deployment
    pub fn has_execution_agent(&self) -> bool {
        self.execution_agent.is_some()
    }

    /// Set an argument value
    pub fn set_argument(&mut self, name: impl Into<String>, value: Value) {
        self.arguments.insert(name.into(), value);
    }

    /// Whether every required argument of the model is set
    pub fn fully_instantiated(&self) -> bool {
        let task_model = match &self.model {
            ComponentModelRef::TaskContext(model) => Some(model),
            ComponentModelRef::Proxy(proxy) => proxy.task_model.as_ref(),
            ComponentModelRef::Composition(_) | ComponentModelRef::Deployment(_) => None,
        };
        match task_model {
            Some(model) => model
                .each_argument()
                .iter()
                .filter(|argument| argument.required)
                .all(|argument| self.arguments.contains_key(&argument.name)),
            None => true,
        }
    }
}
