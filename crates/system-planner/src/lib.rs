//! # System Planner
//!
//! The facade over the network transformation pipeline. A
//! [`SystemNetworkPlanner`] takes declarative requirements, instantiates
//! them against a model catalog under a dependency-injection context,
//! collapses the redundant parts of the resulting task graph, and binds the
//! remaining tasks to deployment slots — all inside one plan transaction
//! that commits only when every stage succeeded.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use system_planner::SystemNetworkPlanner;
//! use component_models::{
//!     DeploymentDescriptor, DeploymentGroup, ModelCatalog, SlotDescriptor, TaskDescriptor,
//! };
//! use dependency_injection::{DependencyInjection, InstanceRequirements};
//! use network_plan::Plan;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut catalog = ModelCatalog::new();
//! let camera = catalog.register_task(TaskDescriptor {
//!     name: "camera_driver".to_string(),
//!     ..Default::default()
//! })?;
//! let deployment = catalog.register_deployment(DeploymentDescriptor {
//!     name: "vision".to_string(),
//!     slots: vec![SlotDescriptor {
//!         name: "front_camera".to_string(),
//!         task_model: "camera_driver".to_string(),
//!     }],
//! })?;
//! let mut deployments = DeploymentGroup::new();
//! deployments.use_deployment("main", deployment);
//!
//! let planner = SystemNetworkPlanner::new(&catalog)
//!     .with_default_deployments(Arc::new(deployments));
//! let mut plan = Plan::new();
//! let outcome = planner.apply_requirements(
//!     &mut plan,
//!     &[InstanceRequirements::from_model(camera)],
//!     &DependencyInjection::new(),
//! )?;
//! assert_eq!(outcome.deployment.deployed.len(), 1);
//! # Ok(())
//! # }
//! ```

mod planner;

pub use planner::{PlanOutcome, SystemNetworkPlanner};

// The public surface of the pipeline crates, re-exported for convenience.
pub use component_models::{
    ComponentModelRef, DeploymentBinding, DeploymentGroup, DeploymentModel, ModelCatalog,
    ModelRef,
};
pub use dependency_injection::{
    DependencyInjection, DeploymentHint, InstanceRequirements, Selection, SelectionKey,
};
pub use network_deployment::{DeploymentReport, MissingDeployments, SystemNetworkDeployer};
pub use network_generation::NetworkGenerator;
pub use network_plan::{Plan, PlanDelta, PlanTransaction, TaskId};
pub use network_reduction::MergeSolver;

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the planning pipeline
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Model registration or lookup error
    #[error("model error: {0}")]
    Model(#[from] component_models::Error),

    /// Selection resolution error
    #[error("selection error: {0}")]
    Injection(#[from] dependency_injection::Error),

    /// Composition instantiation error
    #[error("instantiation error: {0}")]
    Generation(#[from] network_generation::Error),

    /// Merge solver error
    #[error("reduction error: {0}")]
    Reduction(#[from] network_reduction::Error),

    /// Deployment error
    #[error("deployment error: {0}")]
    Deployment(#[from] network_deployment::Error),

    /// Plan rewrite error
    #[error("plan error: {0}")]
    Plan(#[from] network_plan::Error),
}
