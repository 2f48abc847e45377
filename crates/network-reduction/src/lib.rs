//! # Network Reduction
//!
//! The merge solver that collapses semantically-equivalent tasks so only the
//! minimal network remains. Candidate merges form a directed
//! [`MergeGraph`] — an edge `a → b` states that `a` can replace `b` — which
//! the solver reduces iteratively: unambiguous targets merge immediately,
//! two-node cycles resolve through the merge ordering, larger cycles are
//! broken one in-cycle edge at a time, and remaining ambiguities go through
//! dependency-dominance, name and locality disambiguation. An outer
//! breadth-first loop reseeds the solver from the neighborhood of each merge
//! until a pass merges nothing.

mod graph;
mod ordering;
mod solver;

pub use graph::MergeGraph;
pub use ordering::merge_ordering;
pub use solver::MergeSolver;

/// Result type alias for reduction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for network reduction
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Plan error raised while rewriting the graph
    #[error(transparent)]
    Plan(#[from] network_plan::Error),
}
