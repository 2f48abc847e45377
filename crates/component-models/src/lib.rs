//! # Component Models
//!
//! Model catalog for component networks. This crate defines the model-level
//! vocabulary of the planner: task contexts (leaf components with typed ports
//! and arguments), data services (interface-only models), compositions
//! (named children plus connections), deployments (named slots on a process
//! server), and the `fulfills` partial order that relates them.
//!
//! Models are immutable once registered. The [`ModelCatalog`] is an explicit
//! value threaded through the planner; there is no process-wide registry.
//!
//! ## Example
//!
//! ```rust
//! use component_models::{ModelCatalog, TaskDescriptor, PortDescriptor, PortDirection};
//!
//! # fn example() -> component_models::Result<()> {
//! let mut catalog = ModelCatalog::new();
//! catalog.register_task(TaskDescriptor {
//!     name: "camera_driver".to_string(),
//!     ports: vec![PortDescriptor {
//!         name: "frames".to_string(),
//!         direction: PortDirection::Output,
//!         data_type: "/base/samples/Frame".to_string(),
//!     }],
//!     ..Default::default()
//! })?;
//! assert!(catalog.find_task("camera_driver").is_some());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod component;
mod compositions;
mod deployments;
mod ports;
mod services;
mod tasks;

pub use catalog::{
    ArgumentDescriptor, DeploymentDescriptor, ModelCatalog, PortDescriptor, ProvidesDescriptor,
    ServiceDescriptor, SlotDescriptor, TaskDescriptor,
};
pub use component::{
    most_specific_component, verify_model_set_consistency, ComponentModelRef, ModelRef,
    ProxyTaskModel,
};
pub use compositions::{
    ChildConnection, CompositionChild, CompositionModel, ConnectionPolicy, ExportedPort, PortPair,
    Specialization,
};
pub use deployments::{DeploymentBinding, DeploymentGroup, DeploymentModel, DeploymentSlot};
pub use ports::{Port, PortDirection, TypeRegistry};
pub use services::DataServiceModel;
pub use tasks::{ArgumentDecl, ProvidedService, TaskContextModel};

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for model registration and lookup
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A model with the same name is already registered
    #[error("model already registered: {0}")]
    DuplicateModel(String),

    /// A descriptor referenced a model that is not in the catalog
    #[error("unknown model referenced by descriptor: {0}")]
    UnknownModel(String),

    /// A set of required models cannot be fulfilled by a single component
    #[error("incompatible component models: {0} and {1} are unrelated by subtyping")]
    InconsistentModelSet(String, String),

    /// A descriptor is structurally invalid
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl Error {
    /// Create an invalid-descriptor error
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor(message.into())
    }
}
