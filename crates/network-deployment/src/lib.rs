//! # Network Deployment
//!
//! The deployer that binds every remaining task context to a concrete
//! deployment slot on a process server. Candidate slots come from the
//! deployment groups attached to the task's requirements (walking up the
//! dependency graph) or from a default group; ambiguity resolves through the
//! requested runtime name, then deployment hints. Each selected slot is
//! instantiated into an execution agent plus a deployed task, and the
//! abstract task merges into the deployed one — one task at a time, so that
//! per-task connectivity survives the rewrite.
//!
//! [`MissingDeployments`] is the one externally-meaningful planning error:
//! it carries, per task, every candidate slot and the tasks already using
//! it.

mod deployer;

pub use deployer::{DeploymentReport, SystemNetworkDeployer};

use indexmap::IndexMap;
use network_plan::TaskId;

/// Result type alias for deployment operations
pub type Result<T> = std::result::Result<T, Error>;

/// A candidate slot reported for a task that could not be deployed
#[derive(Debug, Clone)]
pub struct MissingCandidate {
    /// The candidate slot
    pub binding: component_models::DeploymentBinding,
    /// Tasks already occupying the slot
    pub users: Vec<TaskId>,
}

/// Diagnostic payload of a failed deployment pass
#[derive(Debug, Clone, Default)]
pub struct MissingDeployments {
    /// Per task, the candidate slots considered and their current users
    pub tasks: IndexMap<TaskId, Vec<MissingCandidate>>,
}

impl MissingDeployments {
    /// Whether every task found a deployment
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Display for MissingDeployments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} task(s) could not be deployed:", self.tasks.len())?;
        for (task, candidates) in &self.tasks {
            if candidates.is_empty() {
                writeln!(f, "  {task}: no candidate slot")?;
                continue;
            }
            writeln!(f, "  {task}:")?;
            for candidate in candidates {
                if candidate.users.is_empty() {
                    writeln!(f, "    candidate {}", candidate.binding)?;
                } else {
                    let users: Vec<String> =
                        candidate.users.iter().map(TaskId::to_string).collect();
                    writeln!(
                        f,
                        "    candidate {} (in use by {})",
                        candidate.binding,
                        users.join(", ")
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Error types for network deployment
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Some tasks could not be bound to a deployment slot
    #[error("{0}")]
    MissingDeployments(MissingDeployments),

    /// Plan error raised while applying deployments
    #[error(transparent)]
    Plan(#[from] network_plan::Error),
}
