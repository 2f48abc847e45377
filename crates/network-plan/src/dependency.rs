//! The parent/child dependency graph

use crate::task::TaskId;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// Directed parent → child graph, edges labeled with the child role name
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    children: IndexMap<TaskId, IndexMap<TaskId, String>>,
    parents: IndexMap<TaskId, IndexSet<TaskId>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency edge
    pub fn add_dependency(&mut self, parent: TaskId, child: TaskId, role: impl Into<String>) {
        self.children
            .entry(parent)
            .or_default()
            .insert(child, role.into());
        self.parents.entry(child).or_default().insert(parent);
    }

    /// Remove a dependency edge; returns whether it existed
    pub fn remove_dependency(&mut self, parent: TaskId, child: TaskId) -> bool {
        let removed = self
            .children
            .get_mut(&parent)
            .is_some_and(|children| children.shift_remove(&child).is_some());
        if removed {
            if let Some(parents) = self.parents.get_mut(&child) {
                parents.shift_remove(&parent);
            }
        }
        removed
    }

    /// Children of `parent` with their roles
    pub fn children_of(&self, parent: TaskId) -> Vec<(TaskId, &str)> {
        self.children
            .get(&parent)
            .map(|children| {
                children
                    .iter()
                    .map(|(child, role)| (*child, role.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parents of `child`
    pub fn parents_of(&self, child: TaskId) -> Vec<TaskId> {
        self.parents
            .get(&child)
            .map(|parents| parents.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The role under which `child` hangs below `parent`
    pub fn role_of(&self, parent: TaskId, child: TaskId) -> Option<&str> {
        self.children
            .get(&parent)
            .and_then(|children| children.get(&child))
            .map(String::as_str)
    }

    /// All ancestors of `task` in breadth-first order
    pub fn ancestors_of(&self, task: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut visited: IndexSet<TaskId> = IndexSet::new();
        let mut queue: VecDeque<TaskId> = self.parents_of(task).into();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            queue.extend(self.parents_of(current));
        }
        result
    }

    /// Whether `ancestor` is above `task` in the dependency graph
    pub fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        self.ancestors_of(task).contains(&ancestor)
    }

    /// Drop every edge touching `task`
    pub fn remove_task(&mut self, task: TaskId) {
        if let Some(children) = self.children.shift_remove(&task) {
            for child in children.keys() {
                if let Some(parents) = self.parents.get_mut(child) {
                    parents.shift_remove(&task);
                }
            }
        }
        if let Some(parents) = self.parents.shift_remove(&task) {
            for parent in parents {
                if let Some(children) = self.children.get_mut(&parent) {
                    children.shift_remove(&task);
                }
            }
        }
    }

    /// Move every edge of `from` onto `to`, keeping roles
    ///
    /// Edges between the two tasks collapse and are dropped.
    pub fn rewire(&mut self, from: TaskId, to: TaskId) {
        let children: Vec<(TaskId, String)> = self
            .children
            .get(&from)
            .map(|children| {
                children
                    .iter()
                    .map(|(child, role)| (*child, role.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let parents: Vec<(TaskId, String)> = self
            .parents_of(from)
            .into_iter()
            .map(|parent| {
                let role = self.role_of(parent, from).unwrap_or_default().to_string();
                (parent, role)
            })
            .collect();

        self.remove_task(from);
        for (child, role) in children {
            if child != to {
                self.add_dependency(to, child, role);
            }
        }
        for (parent, role) in parents {
            if parent != to {
                self.add_dependency(parent, to, role);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> TaskId {
        TaskId(index)
    }

    #[test]
    fn test_ancestors_breadth_first() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(id(0), id(1), "left");
        graph.add_dependency(id(0), id(2), "right");
        graph.add_dependency(id(1), id(3), "leaf");
        graph.add_dependency(id(2), id(3), "leaf");

        assert_eq!(graph.ancestors_of(id(3)), vec![id(1), id(2), id(0)]);
        assert!(graph.is_ancestor(id(0), id(3)));
        assert!(!graph.is_ancestor(id(3), id(0)));
    }

    #[test]
    fn test_rewire_moves_edges_and_roles() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(id(0), id(1), "camera");
        graph.add_dependency(id(1), id(2), "driver");

        graph.rewire(id(1), id(3));

        assert_eq!(graph.role_of(id(0), id(3)), Some("camera"));
        assert_eq!(graph.role_of(id(3), id(2)), Some("driver"));
        assert!(graph.parents_of(id(1)).is_empty());
        assert!(graph.children_of(id(1)).is_empty());
    }
}
