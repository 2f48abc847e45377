//! The pipeline facade

use crate::Result;
use component_models::{DeploymentGroup, ModelCatalog};
use dependency_injection::{DependencyInjection, InstanceRequirements};
use network_deployment::{DeploymentReport, SystemNetworkDeployer};
use network_generation::NetworkGenerator;
use network_plan::{Plan, PlanDelta, PlanTransaction, TaskId};
use network_reduction::MergeSolver;
use std::sync::Arc;
use tracing::info;

/// What one planning pass did to the plan
#[derive(Debug)]
pub struct PlanOutcome {
    /// One task per requirement, after merges collapsed duplicates
    pub roots: Vec<TaskId>,
    /// Merges applied by the solver, as `(survivor, replaced)` pairs
    pub merges: Vec<(TaskId, TaskId)>,
    /// Deployments instantiated for the remaining tasks
    pub deployment: DeploymentReport,
    /// The committed difference, for downstream consumers
    pub delta: PlanDelta,
}

/// Runs instantiation, reduction and deployment as one transaction
pub struct SystemNetworkPlanner<'a> {
    catalog: &'a ModelCatalog,
    default_deployments: Arc<DeploymentGroup>,
}

impl<'a> SystemNetworkPlanner<'a> {
    /// Create a planner over `catalog` with no default deployments
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self {
            catalog,
            default_deployments: Arc::new(DeploymentGroup::new()),
        }
    }

    /// Use `group` for tasks whose requirements carry no deployment group
    pub fn with_default_deployments(mut self, group: Arc<DeploymentGroup>) -> Self {
        self.default_deployments = group;
        self
    }

    /// Apply `requirements` to `plan` under `context`
    ///
    /// All three passes run on a staged copy; the plan is only rewritten
    /// when the whole pipeline succeeds, and the committed delta is
    /// returned. On error the plan is untouched.
    pub fn apply_requirements(
        &self,
        plan: &mut Plan,
        requirements: &[InstanceRequirements],
        context: &DependencyInjection,
    ) -> Result<PlanOutcome> {
        let mut transaction = PlanTransaction::new(plan);
        let generator = NetworkGenerator::new(self.catalog);

        let mut roots = Vec::new();
        for requirement in requirements {
            let root = generator.instantiate(transaction.plan_mut(), requirement, context)?;
            roots.push(root);
        }
        info!(requirements = requirements.len(), "network generated");

        let merges = MergeSolver::new(transaction.plan_mut()).merge_identical_tasks()?;
        info!(merges = merges.len(), "network reduced");

        let deployment = SystemNetworkDeployer::new(
            transaction.plan_mut(),
            Arc::clone(&self.default_deployments),
        )
        .deploy()?;
        info!(
            deployed = deployment.deployed.len(),
            agents = deployment.agents.len(),
            "network deployed"
        );

        let replacements: Vec<(TaskId, TaskId)> = merges
            .iter()
            .copied()
            .chain(
                deployment
                    .deployed
                    .iter()
                    .map(|(replaced, deployed)| (*deployed, *replaced)),
            )
            .collect();
        let roots = roots
            .into_iter()
            .map(|root| resolve_replacement(root, &replacements))
            .collect();

        let delta = transaction.commit();
        Ok(PlanOutcome {
            roots,
            merges,
            deployment,
            delta,
        })
    }
}

/// Follow `(survivor, replaced)` chains to the task that absorbed `task`
fn resolve_replacement(task: TaskId, replacements: &[(TaskId, TaskId)]) -> TaskId {
    let mut current = task;
    loop {
        let Some((survivor, _)) = replacements
            .iter()
            .find(|(_, replaced)| *replaced == current)
        else {
            return current;
        };
        current = *survivor;
    }
}
