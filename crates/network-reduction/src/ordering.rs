//! The merge ordering: which of two mergeable tasks should survive

use network_plan::TaskNode;
use std::cmp::Ordering;

/// Strict partial order over merge candidates
///
/// Returns `Greater` when `left` is the better survivor, `Less` when
/// `right` is, `None` when no criterion separates them. Criteria apply
/// lexicographically; the first one with a preference wins:
///
/// 1. prefer the task that is not finished
/// 2. prefer the running task
/// 3. prefer the task already bound to a deployment
/// 4. prefer a real task over a data-service proxy
/// 5. prefer the task with all required arguments set
/// 6. prefer the transaction proxy
pub fn merge_ordering(left: &TaskNode, right: &TaskNode) -> Option<Ordering> {
    let criteria: [(bool, bool); 6] = [
        (!left.is_finished(), !right.is_finished()),
        (left.is_running(), right.is_running()),
        (left.has_execution_agent(), right.has_execution_agent()),
        (!left.model.is_proxy(), !right.model.is_proxy()),
        (left.fully_instantiated(), right.fully_instantiated()),
        (left.transaction_proxy, right.transaction_proxy),
    ];
    for (left_wins, right_wins) in criteria {
        match (left_wins, right_wins) {
            (true, false) => return Some(Ordering::Greater),
            (false, true) => return Some(Ordering::Less),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{ComponentModelRef, DataServiceModel, ModelRef, ProxyTaskModel, TaskContextModel};
    use network_plan::{ExecutionState, Plan};
    use std::sync::Arc;

    fn plan_with_two(model: fn(&str) -> ComponentModelRef) -> (Plan, network_plan::TaskId, network_plan::TaskId) {
        let mut plan = Plan::new();
        let first = plan.add_task(model("task_model"));
        let second = plan.add_task(model("task_model"));
        (plan, first, second)
    }

    fn task_model(name: &str) -> ComponentModelRef {
        ComponentModelRef::TaskContext(Arc::new(TaskContextModel::new(name)))
    }

    #[test]
    fn test_running_task_wins() {
        let (mut plan, first, second) = plan_with_two(task_model);
        plan.task_mut(first).unwrap().state = ExecutionState::Running;

        let left = plan.task(first).unwrap();
        let right = plan.task(second).unwrap();
        assert_eq!(merge_ordering(left, right), Some(Ordering::Greater));
        assert_eq!(merge_ordering(right, left), Some(Ordering::Less));
    }

    #[test]
    fn test_not_finished_outranks_running() {
        let (mut plan, first, second) = plan_with_two(task_model);
        // first is running but finished tasks lose outright
        plan.task_mut(first).unwrap().state = ExecutionState::Finished;
        plan.task_mut(second).unwrap().state = ExecutionState::Pending;

        let left = plan.task(first).unwrap();
        let right = plan.task(second).unwrap();
        assert_eq!(merge_ordering(left, right), Some(Ordering::Less));
    }

    #[test]
    fn test_real_task_beats_proxy() {
        let service = Arc::new(DataServiceModel::new("image_source"));
        let proxy = ComponentModelRef::Proxy(Arc::new(
            ProxyTaskModel::synthesize(&[ModelRef::Service(service)]).unwrap(),
        ));

        let mut plan = Plan::new();
        let real = plan.add_task(task_model("camera_driver"));
        let placeholder = plan.add_task(proxy);

        let left = plan.task(real).unwrap();
        let right = plan.task(placeholder).unwrap();
        assert_eq!(merge_ordering(left, right), Some(Ordering::Greater));
    }

    #[test]
    fn test_equal_tasks_are_incomparable() {
        let (plan, first, second) = plan_with_two(task_model);
        let left = plan.task(first).unwrap();
        let right = plan.task(second).unwrap();
        assert_eq!(merge_ordering(left, right), None);
    }
}
