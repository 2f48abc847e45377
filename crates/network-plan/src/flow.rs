//! The typed data-flow multigraph

use crate::task::TaskId;
use component_models::ConnectionPolicy;
use indexmap::{IndexMap, IndexSet};

/// One port-to-port connection with its policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Producing task
    pub source: TaskId,
    /// Output port on the producing task
    pub source_port: String,
    /// Consuming task
    pub sink: TaskId,
    /// Input port on the consuming task
    pub sink_port: String,
    /// Transport policy
    pub policy: ConnectionPolicy,
}

/// Directed multigraph of port-to-port connections
///
/// Regular connections carry samples between sibling tasks. Forward edges
/// splice composition interface ports onto the child port actually producing
/// or consuming the stream; they carry no policy of their own.
#[derive(Debug, Clone, Default)]
pub struct DataFlowGraph {
    connections: IndexMap<(TaskId, TaskId), IndexMap<(String, String), ConnectionPolicy>>,
    forwards: IndexMap<(TaskId, TaskId), IndexSet<(String, String)>>,
}

impl DataFlowGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; an existing pair's policy is overwritten
    pub fn connect(
        &mut self,
        source: TaskId,
        source_port: impl Into<String>,
        sink: TaskId,
        sink_port: impl Into<String>,
        policy: ConnectionPolicy,
    ) {
        self.connections
            .entry((source, sink))
            .or_default()
            .insert((source_port.into(), sink_port.into()), policy);
    }

    /// Remove a connection; returns whether it existed
    pub fn disconnect(
        &mut self,
        source: TaskId,
        source_port: &str,
        sink: TaskId,
        sink_port: &str,
    ) -> bool {
        let Some(pairs) = self.connections.get_mut(&(source, sink)) else {
            return false;
        };
        let removed = pairs
            .shift_remove(&(source_port.to_string(), sink_port.to_string()))
            .is_some();
        if pairs.is_empty() {
            self.connections.shift_remove(&(source, sink));
        }
        removed
    }

    /// Add a forward edge splicing `source_port` onto `sink_port`
    pub fn add_forward(
        &mut self,
        source: TaskId,
        source_port: impl Into<String>,
        sink: TaskId,
        sink_port: impl Into<String>,
    ) {
        self.forwards
            .entry((source, sink))
            .or_default()
            .insert((source_port.into(), sink_port.into()));
    }

    /// All connections, in insertion order
    pub fn each_connection(&self) -> Vec<ConnectionRecord> {
        let mut result = Vec::new();
        for ((source, sink), pairs) in &self.connections {
            for ((source_port, sink_port), policy) in pairs {
                result.push(ConnectionRecord {
                    source: *source,
                    source_port: source_port.clone(),
                    sink: *sink,
                    sink_port: sink_port.clone(),
                    policy: policy.clone(),
                });
            }
        }
        result
    }

    /// All forward edges as (source, source port, sink, sink port)
    pub fn each_forward(&self) -> Vec<(TaskId, String, TaskId, String)> {
        let mut result = Vec::new();
        for ((source, sink), pairs) in &self.forwards {
            for (source_port, sink_port) in pairs {
                result.push((*source, source_port.clone(), *sink, sink_port.clone()));
            }
        }
        result
    }

    /// Connections flowing into `task`
    pub fn incoming(&self, task: TaskId) -> Vec<ConnectionRecord> {
        self.each_connection()
            .into_iter()
            .filter(|c| c.sink == task)
            .collect()
    }

    /// Connections flowing out of `task`
    pub fn outgoing(&self, task: TaskId) -> Vec<ConnectionRecord> {
        self.each_connection()
            .into_iter()
            .filter(|c| c.source == task)
            .collect()
    }

    /// Tasks directly connected to `task`, in either direction
    pub fn neighbors(&self, task: TaskId) -> IndexSet<TaskId> {
        let mut result = IndexSet::new();
        for (source, sink) in self.connections.keys() {
            if *source == task {
                result.insert(*sink);
            } else if *sink == task {
                result.insert(*source);
            }
        }
        result
    }

    /// Drop every edge touching `task`
    pub fn remove_task(&mut self, task: TaskId) {
        self.connections
            .retain(|(source, sink), _| *source != task && *sink != task);
        self.forwards
            .retain(|(source, sink), _| *source != task && *sink != task);
    }

    /// Move every edge of `from` onto `to`, renaming `from`'s ports
    ///
    /// `port_map` maps port names of `from` to port names of `to`; unmapped
    /// ports keep their name. Edges between the two tasks collapse and are
    /// dropped.
    pub fn rewire(&mut self, from: TaskId, to: TaskId, port_map: &IndexMap<String, String>) {
        let mapped = |port: &str| -> String {
            port_map
                .get(port)
                .cloned()
                .unwrap_or_else(|| port.to_string())
        };

        let mut connections = IndexMap::new();
        for ((source, sink), pairs) in std::mem::take(&mut self.connections) {
            let new_source = if source == from { to } else { source };
            let new_sink = if sink == from { to } else { sink };
            if (source == from || sink == from) && new_source == new_sink {
                continue;
            }
            let target: &mut IndexMap<(String, String), ConnectionPolicy> =
                connections.entry((new_source, new_sink)).or_default();
            for ((source_port, sink_port), policy) in pairs {
                let source_port = if source == from {
                    mapped(&source_port)
                } else {
                    source_port
                };
                let sink_port = if sink == from {
                    mapped(&sink_port)
                } else {
                    sink_port
                };
                target.insert((source_port, sink_port), policy);
            }
        }
        self.connections = connections;

        let mut forwards = IndexMap::new();
        for ((source, sink), pairs) in std::mem::take(&mut self.forwards) {
            let new_source = if source == from { to } else { source };
            let new_sink = if sink == from { to } else { sink };
            if (source == from || sink == from) && new_source == new_sink {
                continue;
            }
            let target: &mut IndexSet<(String, String)> =
                forwards.entry((new_source, new_sink)).or_default();
            for (source_port, sink_port) in pairs {
                let source_port = if source == from {
                    mapped(&source_port)
                } else {
                    source_port
                };
                let sink_port = if sink == from {
                    mapped(&sink_port)
                } else {
                    sink_port
                };
                target.insert((source_port, sink_port));
            }
        }
        self.forwards = forwards;
    }
}
