//! Transactional plan rewrites
//!
//! A pass stages all of its changes on a working copy of the plan. Tasks
//! imported from the committed plan are marked transaction proxies so the
//! merge solver never removes them. On commit the working copy replaces the
//! committed plan and the delta is reported; dropping the transaction
//! without committing leaves the committed plan untouched.

use crate::flow::ConnectionRecord;
use crate::plan::Plan;
use crate::task::TaskId;
use tracing::debug;

/// The observable outcome of a committed transaction
#[derive(Debug, Clone, Default)]
pub struct PlanDelta {
    /// Tasks added by the pass
    pub added_tasks: Vec<TaskId>,
    /// Tasks removed by the pass (merged away or dropped)
    pub removed_tasks: Vec<TaskId>,
    /// Connections added by the pass
    pub added_connections: Vec<ConnectionRecord>,
    /// Connections removed by the pass
    pub removed_connections: Vec<ConnectionRecord>,
}

impl PlanDelta {
    /// Whether the pass changed nothing
    pub fn is_empty(&self) -> bool {
        self.added_tasks.is_empty()
            && self.removed_tasks.is_empty()
            && self.added_connections.is_empty()
            && self.removed_connections.is_empty()
    }
}

/// A staged rewrite of a plan
pub struct PlanTransaction<'a> {
    base: &'a mut Plan,
    working: Plan,
}

impl<'a> PlanTransaction<'a> {
    /// Stage a transaction on top of `base`
    pub fn new(base: &'a mut Plan) -> Self {
        let mut working = base.clone();
        for id in working.task_ids() {
            if let Ok(task) = working.task_mut(id) {
                task.transaction_proxy = true;
            }
        }
        Self { base, working }
    }

    /// The staged plan
    pub fn plan(&self) -> &Plan {
        &self.working
    }

    /// Mutable access to the staged plan
    pub fn plan_mut(&mut self) -> &mut Plan {
        &mut self.working
    }

    /// Commit the staged changes, replacing the base plan
    pub fn commit(self) -> PlanDelta {
        let mut delta = PlanDelta::default();

        let base_ids: Vec<TaskId> = self.base.task_ids();
        let working_ids: Vec<TaskId> = self.working.task_ids();
        delta.added_tasks = working_ids
            .iter()
            .copied()
            .filter(|id| !self.base.contains(*id))
            .collect();
        delta.removed_tasks = base_ids
            .iter()
            .copied()
            .filter(|id| !self.working.contains(*id))
            .collect();

        let base_connections = self.base.flow().each_connection();
        let working_connections = self.working.flow().each_connection();
        delta.added_connections = working_connections
            .iter()
            .filter(|c| !base_connections.contains(c))
            .cloned()
            .collect();
        delta.removed_connections = base_connections
            .iter()
            .filter(|c| !working_connections.contains(c))
            .cloned()
            .collect();

        let mut committed = self.working;
        for id in committed.task_ids() {
            if let Ok(task) = committed.task_mut(id) {
                task.transaction_proxy = false;
            }
        }
        *self.base = committed;

        debug!(
            added = delta.added_tasks.len(),
            removed = delta.removed_tasks.len(),
            connections_added = delta.added_connections.len(),
            connections_removed = delta.removed_connections.len(),
            "committed plan transaction"
        );
        delta
    }
}
