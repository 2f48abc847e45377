//! # Dependency Injection
//!
//! The resolver that turns abstract selections (names, data services,
//! component models) into concrete component models. A
//! [`DependencyInjection`] accumulates explicit selections (`key →
//! selection`) and defaults; [`DependencyInjection::resolve`] collapses
//! recursive selection chains, applies unambiguous defaults and validates
//! every entry. [`InstanceRequirements`] accumulates the constraints of a
//! single network placeholder: required models, arguments, service
//! selections and deployment hints.
//!
//! ## Example
//!
//! ```rust
//! use dependency_injection::{DependencyInjection, Selection, SelectionKey};
//! use component_models::{ModelCatalog, TaskDescriptor};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut catalog = ModelCatalog::new();
//! let camera = catalog.register_task(TaskDescriptor {
//!     name: "camera_driver".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let mut di = DependencyInjection::new();
//! di.add_explicit(
//!     SelectionKey::name("camera"),
//!     Selection::from_task(camera),
//! );
//! let resolved = di.resolve()?;
//! assert!(resolved.explicit_selection_for(&SelectionKey::name("camera")).is_some());
//! # Ok(())
//! # }
//! ```

mod requirements;
mod resolver;
mod selection;

pub use requirements::{DeploymentHint, InstanceRequirements};
pub use resolver::{DefaultResolution, DependencyInjection, ResolvedComponent};
pub use selection::{Selection, SelectionKey};

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for selection and resolution
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A selection pair does not fall in any allowed category
    #[error("invalid selection {key} => {value}: {reason}")]
    InvalidSelection {
        /// The offending key
        key: String,
        /// The offending selection
        value: String,
        /// Why the pair was rejected
        reason: String,
    },

    /// A component provides a required service more than once
    #[error("more than one service of {component} fulfills {service}: {}", candidates.join(", "))]
    AmbiguousService {
        /// The component the service was searched on
        component: String,
        /// The requested service
        service: String,
        /// Names of the matching provisions
        candidates: Vec<String>,
    },

    /// A selection chain loops back on itself
    #[error("recursive selection chain through {0}")]
    RecursiveSelection(String),

    /// Two selected component classes are unrelated by subtyping
    #[error("incompatible component models: {0} and {1}")]
    IncompatibleComponentModels(String, String),

    /// Two explicit selections for the same key cannot be reconciled
    #[error("incompatible selections for {key}: {left} vs {right}")]
    IncompatibleSelections {
        /// The common key
        key: String,
        /// Selection on the receiving side
        left: String,
        /// Selection on the merged side
        right: String,
    },

    /// A name selection does not resolve against the catalog
    #[error("cannot resolve name {0} against the model catalog")]
    NameResolution(String),

    /// Two requirement sets disagree on an argument or runtime name
    #[error("requirement conflict: {0}")]
    RequirementConflict(String),

    /// Catalog-level error raised while resolving models
    #[error(transparent)]
    Model(#[from] component_models::Error),
}
