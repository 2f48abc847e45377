//! The merge-candidate graph

use indexmap::{IndexMap, IndexSet};
use network_plan::TaskId;

/// Directed graph over in-plan tasks; edge `a → b` means `a` can replace `b`
///
/// The graph stores task identifiers only, never owning references; it is
/// rebuilt for every reduction pass and updated incrementally as merges
/// apply.
#[derive(Debug, Clone, Default)]
pub struct MergeGraph {
    edges: IndexMap<TaskId, IndexSet<TaskId>>,
    reverse: IndexMap<TaskId, IndexSet<TaskId>>,
}

impl MergeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the edge `replacer → target`
    pub fn add_edge(&mut self, replacer: TaskId, target: TaskId) {
        self.edges.entry(replacer).or_default().insert(target);
        self.reverse.entry(target).or_default().insert(replacer);
    }

    /// Remove the edge `replacer → target`; returns whether it existed
    pub fn remove_edge(&mut self, replacer: TaskId, target: TaskId) -> bool {
        let removed = self
            .edges
            .get_mut(&replacer)
            .is_some_and(|targets| targets.shift_remove(&target));
        if removed {
            if let Some(replacers) = self.reverse.get_mut(&target) {
                replacers.shift_remove(&replacer);
            }
        }
        removed
    }

    /// Whether the edge `replacer → target` exists
    pub fn has_edge(&self, replacer: TaskId, target: TaskId) -> bool {
        self.edges
            .get(&replacer)
            .is_some_and(|targets| targets.contains(&target))
    }

    /// Tasks `replacer` can replace, in ascending id order
    pub fn targets_of(&self, replacer: TaskId) -> Vec<TaskId> {
        let mut result: Vec<TaskId> = self
            .edges
            .get(&replacer)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default();
        result.sort();
        result
    }

    /// Tasks that can replace `target`, in ascending id order
    pub fn replacers_of(&self, target: TaskId) -> Vec<TaskId> {
        let mut result: Vec<TaskId> = self
            .reverse
            .get(&target)
            .map(|replacers| replacers.iter().copied().collect())
            .unwrap_or_default();
        result.sort();
        result
    }

    /// All targets with at least one replacer, in ascending id order
    pub fn each_target(&self) -> Vec<TaskId> {
        let mut result: Vec<TaskId> = self
            .reverse
            .iter()
            .filter(|(_, replacers)| !replacers.is_empty())
            .map(|(target, _)| *target)
            .collect();
        result.sort();
        result
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    /// Drop every edge touching `task`
    pub fn remove_task(&mut self, task: TaskId) {
        if let Some(targets) = self.edges.shift_remove(&task) {
            for target in targets {
                if let Some(replacers) = self.reverse.get_mut(&target) {
                    replacers.shift_remove(&task);
                }
            }
        }
        if let Some(replacers) = self.reverse.shift_remove(&task) {
            for replacer in replacers {
                if let Some(targets) = self.edges.get_mut(&replacer) {
                    targets.shift_remove(&task);
                }
            }
        }
    }

    /// Tasks reachable from themselves, in ascending id order
    pub fn tasks_in_cycles(&self) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut nodes: Vec<TaskId> = self.edges.keys().copied().collect();
        nodes.sort();
        for node in nodes {
            if self.reaches(node, node) {
                result.push(node);
            }
        }
        result
    }

    fn reaches(&self, from: TaskId, goal: TaskId) -> bool {
        let mut visited: IndexSet<TaskId> = IndexSet::new();
        let mut stack: Vec<TaskId> = self.targets_of(from);
        while let Some(current) = stack.pop() {
            if current == goal {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.targets_of(current));
            }
        }
        false
    }
}
