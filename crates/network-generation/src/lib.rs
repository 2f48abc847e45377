//! # Network Generation
//!
//! Expands compositions into task graphs. Given a composition model, a
//! dependency-injection context and a plan, the [`NetworkGenerator`] selects
//! a component for every child through the context, switches to a
//! specialized composition when the explicit selections match one, wires the
//! declared connections (applying each child's port mappings), autoconnects
//! the remaining input ports by type, and forwards exported ports so that
//! consumers of the composition interface reach the producing child.

mod instantiator;
mod specializations;

pub use instantiator::NetworkGenerator;
pub use specializations::matching_specialization;

/// Result type alias for generation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for composition instantiation
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Autoconnect found several equally-good producers for an input port
    #[error(
        "ambiguous autoconnection in {composition}: input {child}.{port} matches {}",
        candidates.join(", ")
    )]
    AmbiguousAutoConnection {
        /// The composition being instantiated
        composition: String,
        /// The child owning the input port
        child: String,
        /// The unconnected input port
        port: String,
        /// The competing producer ports, as `child.port`
        candidates: Vec<String>,
    },

    /// A declared connection cannot be applied to the selected children
    #[error("invalid child connection in {composition}: {child}.{port}: {reason}")]
    AmbiguousChildConnection {
        /// The composition being instantiated
        composition: String,
        /// The child the connection references
        child: String,
        /// The port the connection references
        port: String,
        /// Why the connection cannot be applied
        reason: String,
    },

    /// Selection error raised while resolving a child
    #[error(transparent)]
    Injection(#[from] dependency_injection::Error),

    /// Plan error raised while building the graph
    #[error(transparent)]
    Plan(#[from] network_plan::Error),
}
