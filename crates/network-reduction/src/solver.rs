//! The reduction algorithm

use crate::graph::MergeGraph;
use crate::ordering::merge_ordering;
use crate::Result;
use component_models::ComponentModelRef;
use dependency_injection::DeploymentHint;
use indexmap::IndexSet;
use network_plan::{can_merge, merge, Plan, TaskId};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::debug;

/// Collapses duplicate tasks in a plan
///
/// The solver owns the plan for the duration of the pass; the pass is
/// synchronous and runs to completion.
pub struct MergeSolver<'a> {
    plan: &'a mut Plan,
}

impl<'a> MergeSolver<'a> {
    /// Create a solver over `plan`
    pub fn new(plan: &'a mut Plan) -> Self {
        Self { plan }
    }

    /// Merge semantically-identical tasks until a pass merges nothing
    ///
    /// Returns the applied merges as `(survivor, replaced)` pairs. The outer
    /// loop is a breadth-first sweep: after each reduction the next frontier
    /// is the downstream sinks of merged tasks plus their composition
    /// parents, since merging children may make parents mergeable.
    pub fn merge_identical_tasks(&mut self) -> Result<Vec<(TaskId, TaskId)>> {
        let mut all_merges = Vec::new();
        let mut frontier: IndexSet<TaskId> = {
            let mut ids = self.plan.task_ids();
            ids.sort();
            ids.into_iter().collect()
        };

        while !frontier.is_empty() {
            let merges = self.reduce(&frontier)?;
            if merges.is_empty() {
                break;
            }

            let mut next: IndexSet<TaskId> = IndexSet::new();
            for (survivor, _) in &merges {
                if !self.plan.contains(*survivor) {
                    continue;
                }
                for connection in self.plan.flow().outgoing(*survivor) {
                    next.insert(connection.sink);
                }
                for parent in self.plan.dependencies().parents_of(*survivor) {
                    if let Ok(task) = self.plan.task(parent) {
                        if matches!(task.model, ComponentModelRef::Composition(_)) {
                            next.insert(parent);
                        }
                    }
                }
            }
            next.retain(|id| self.plan.contains(*id));
            next.sort();
            all_merges.extend(merges);
            frontier = next;
        }

        debug!(merges = all_merges.len(), "merge pass finished");
        Ok(all_merges)
    }

    /// One reduction pass over `seeds`, iterated to its fixed point
    fn reduce(&mut self, seeds: &IndexSet<TaskId>) -> Result<Vec<(TaskId, TaskId)>> {
        let mut graph = self.direct_merge_mappings(seeds);
        let mut merged = Vec::new();

        loop {
            self.resolve_two_cycles(&mut graph);

            let mut one_parent: Vec<(TaskId, TaskId)> = Vec::new();
            let mut ambiguous: Vec<TaskId> = Vec::new();
            for target in graph.each_target() {
                let replacers = graph.replacers_of(target);
                match replacers.len() {
                    0 => {}
                    1 => one_parent.push((target, replacers[0])),
                    _ => ambiguous.push(target),
                }
            }
            let cycles = graph.tasks_in_cycles();

            let mut progressed = false;
            for (target, parent) in one_parent {
                if !graph.has_edge(parent, target)
                    || !self.plan.contains(parent)
                    || !self.plan.contains(target)
                {
                    continue;
                }
                if !can_merge(self.plan, parent, target) {
                    debug!(replacer = %parent, target = %target, "candidate no longer valid, pruning");
                    graph.remove_edge(parent, target);
                    continue;
                }
                self.apply_merge(&mut graph, parent, target)?;
                merged.push((parent, target));
                progressed = true;
            }
            if progressed {
                continue;
            }

            if !cycles.is_empty() && self.break_simple_cycles(&mut graph, &cycles) {
                continue;
            }

            let mut progressed = false;
            for target in ambiguous {
                if !self.plan.contains(target) {
                    continue;
                }
                let candidates = graph.replacers_of(target);
                if candidates.len() < 2 {
                    continue;
                }
                let Some(parent) = self.disambiguate(target, &candidates) else {
                    continue;
                };
                if can_merge(self.plan, parent, target) {
                    self.apply_merge(&mut graph, parent, target)?;
                    merged.push((parent, target));
                    progressed = true;
                } else {
                    graph.remove_edge(parent, target);
                }
            }
            if !progressed {
                break;
            }
        }

        Ok(merged)
    }

    /// Build the merge-candidate graph over `seeds`
    fn direct_merge_mappings(&self, seeds: &IndexSet<TaskId>) -> MergeGraph {
        let mut graph = MergeGraph::new();
        let mut tasks: Vec<TaskId> = seeds
            .iter()
            .copied()
            .filter(|id| self.plan.contains(*id))
            .collect();
        tasks.sort();

        for &target in &tasks {
            let Ok(target_task) = self.plan.task(target) else {
                continue;
            };
            // proxies of the committed plan are replacement sources only
            if target_task.transaction_proxy {
                continue;
            }
            // a deployed task that already started cannot be displaced
            if target_task.has_execution_agent() && !target_task.is_pending() {
                continue;
            }
            for &replacer in &tasks {
                if replacer == target {
                    continue;
                }
                let Ok(replacer_task) = self.plan.task(replacer) else {
                    continue;
                };
                if !replacer_task.is_abstract() && target_task.is_abstract() {
                    continue;
                }
                if replacer_task.has_execution_agent() && target_task.has_execution_agent() {
                    continue;
                }
                if matches!(replacer_task.model, ComponentModelRef::Composition(_))
                    && matches!(target_task.model, ComponentModelRef::Composition(_))
                    && !self.same_children(replacer, target)
                {
                    continue;
                }
                if !can_merge(self.plan, replacer, target) {
                    continue;
                }
                debug!(replacer = %replacer, target = %target, "merge candidate");
                graph.add_edge(replacer, target);
            }
        }
        graph
    }

    /// Structural equality of the immediate children of two compositions
    fn same_children(&self, left: TaskId, right: TaskId) -> bool {
        let mut left_children: Vec<(String, TaskId)> = self
            .plan
            .dependencies()
            .children_of(left)
            .into_iter()
            .map(|(child, role)| (role.to_string(), child))
            .collect();
        let mut right_children: Vec<(String, TaskId)> = self
            .plan
            .dependencies()
            .children_of(right)
            .into_iter()
            .map(|(child, role)| (role.to_string(), child))
            .collect();
        left_children.sort();
        right_children.sort();
        left_children == right_children
    }

    /// Resolve two-node cycles through the merge ordering
    fn resolve_two_cycles(&self, graph: &mut MergeGraph) {
        let mut pairs: Vec<(TaskId, TaskId)> = Vec::new();
        for target in graph.each_target() {
            for replacer in graph.replacers_of(target) {
                if replacer < target && graph.has_edge(target, replacer) {
                    pairs.push((replacer, target));
                }
            }
        }
        for (left, right) in pairs {
            let (Ok(left_task), Ok(right_task)) = (self.plan.task(left), self.plan.task(right))
            else {
                continue;
            };
            match merge_ordering(left_task, right_task) {
                Some(Ordering::Greater) => {
                    // left survives, drop the direction replacing it
                    graph.remove_edge(right, left);
                }
                Some(Ordering::Less) => {
                    graph.remove_edge(left, right);
                }
                Some(Ordering::Equal) | None => {}
            }
        }
    }

    /// Remove one within-cycle edge; the caller loops to the fixed point
    fn break_simple_cycles(&self, graph: &mut MergeGraph, cycles: &[TaskId]) -> bool {
        let cycle_set: IndexSet<TaskId> = cycles.iter().copied().collect();
        for &node in cycles {
            for target in graph.targets_of(node) {
                if cycle_set.contains(&target) {
                    debug!(replacer = %node, target = %target, "breaking merge cycle");
                    graph.remove_edge(node, target);
                    return true;
                }
            }
        }
        false
    }

    /// Merge and update the candidate graph
    fn apply_merge(&mut self, graph: &mut MergeGraph, parent: TaskId, target: TaskId) -> Result<()> {
        debug!(survivor = %parent, replaced = %target, "merging");
        merge(self.plan, parent, target)?;
        graph.remove_task(target);
        for child in graph.targets_of(parent) {
            if !can_merge(self.plan, parent, child) {
                debug!(replacer = %parent, target = %child, "post-merge candidate no longer valid, pruning");
                graph.remove_edge(parent, child);
            }
        }
        Ok(())
    }

    /// Pick one replacer among several, or leave the target ambiguous
    fn disambiguate(&self, target: TaskId, candidates: &[TaskId]) -> Option<TaskId> {
        let mut current: Vec<TaskId> = candidates.to_vec();

        // dependency dominance: an ancestor candidate shadows its descendants
        let dominated: IndexSet<TaskId> = current
            .iter()
            .copied()
            .filter(|&candidate| {
                current.iter().any(|&other| {
                    other != candidate && self.plan.dependencies().is_ancestor(other, candidate)
                })
            })
            .collect();
        if !dominated.is_empty() && dominated.len() < current.len() {
            current.retain(|id| !dominated.contains(id));
        }
        if current.len() == 1 {
            debug!(target = %target, chosen = %current[0], "disambiguated by dependency dominance");
            return Some(current[0]);
        }

        // name match against the target's device names
        let (literals, hints) = self.device_names(target);
        if !literals.is_empty() || !hints.is_empty() {
            let named: Vec<TaskId> = current
                .iter()
                .copied()
                .filter(|&candidate| self.candidate_matches_names(candidate, &literals, &hints))
                .collect();
            if !named.is_empty() {
                current = named;
            }
            if current.len() == 1 {
                debug!(target = %target, chosen = %current[0], "disambiguated by name");
                return Some(current[0]);
            }
        }

        // locality: prefer candidates close to the target's flow neighbors
        let neighbors = self.plan.flow().neighbors(target);
        if !neighbors.is_empty() {
            let mut best: Vec<TaskId> = Vec::new();
            let mut best_distance = usize::MAX;
            for &candidate in &current {
                let distance = neighbors
                    .iter()
                    .map(|&neighbor| self.flow_distance(candidate, neighbor))
                    .min()
                    .unwrap_or(usize::MAX);
                match distance.cmp(&best_distance) {
                    Ordering::Less => {
                        best_distance = distance;
                        best = vec![candidate];
                    }
                    Ordering::Equal => best.push(candidate),
                    Ordering::Greater => {}
                }
            }
            if best.len() == 1 && best_distance != usize::MAX {
                debug!(target = %target, chosen = %best[0], "disambiguated by locality");
                return Some(best[0]);
            }
        }

        debug!(target = %target, candidates = candidates.len(), "merge target left ambiguous");
        None
    }

    /// The device names carried by a merge target
    fn device_names(&self, target: TaskId) -> (Vec<String>, Vec<DeploymentHint>) {
        let Ok(task) = self.plan.task(target) else {
            return (Vec::new(), Vec::new());
        };
        let mut literals = Vec::new();
        if let Some(name) = &task.runtime_name {
            literals.push(name.clone());
        }
        let hints: Vec<DeploymentHint> = task
            .requirements
            .deployment_hints()
            .iter()
            .filter(|hint| matches!(hint, DeploymentHint::SlotName(_)))
            .cloned()
            .collect();
        (literals, hints)
    }

    /// Whether a candidate's runtime or deployment name matches the target's
    /// device names
    fn candidate_matches_names(
        &self,
        candidate: TaskId,
        literals: &[String],
        hints: &[DeploymentHint],
    ) -> bool {
        let Ok(task) = self.plan.task(candidate) else {
            return false;
        };
        let mut names: Vec<String> = Vec::new();
        if let Some(name) = &task.runtime_name {
            names.push(name.clone());
        }
        if let Some(agent) = task.execution_agent {
            if let Ok(agent_task) = self.plan.task(agent) {
                if let Some(name) = &agent_task.runtime_name {
                    names.push(name.clone());
                }
            }
        }
        names.iter().any(|name| {
            literals.iter().any(|literal| literal == name)
                || hints.iter().any(|hint| hint.matches_name(name))
        })
    }

    /// Breadth-first distance over the port-connection graph
    fn flow_distance(&self, from: TaskId, to: TaskId) -> usize {
        if from == to {
            return 0;
        }
        let mut visited: IndexSet<TaskId> = IndexSet::new();
        visited.insert(from);
        let mut queue: VecDeque<(TaskId, usize)> = VecDeque::new();
        queue.push_back((from, 0));
        while let Some((current, distance)) = queue.pop_front() {
            for neighbor in self.plan.flow().neighbors(current) {
                if neighbor == to {
                    return distance + 1;
                }
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }
        usize::MAX
    }
}
