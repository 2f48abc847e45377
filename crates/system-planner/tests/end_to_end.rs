//! End-to-end scenarios over the full pipeline

use component_models::{
    ChildConnection, CompositionChild, CompositionModel, ConnectionPolicy, DataServiceModel,
    DeploymentGroup, DeploymentModel, ModelCatalog, ModelRef, Port, PortPair, ProvidedService,
    TaskContextModel,
};
use dependency_injection::{DependencyInjection, InstanceRequirements, Selection, SelectionKey};
use network_plan::Plan;
use std::sync::Arc;
use system_planner::{Error, SystemNetworkPlanner};

const FRAME: &str = "/base/samples/Frame";

struct Fixture {
    catalog: ModelCatalog,
    source: Arc<DataServiceModel>,
    sink: Arc<DataServiceModel>,
    camera: Arc<TaskContextModel>,
    tracker: Arc<TaskContextModel>,
    composition: Arc<CompositionModel>,
    deployments: Arc<DeploymentGroup>,
}

fn fixture() -> Fixture {
    let mut catalog = ModelCatalog::new();
    let source = catalog
        .add_service_model(Arc::new(
            DataServiceModel::new("image_source").with_port(Port::output("images", FRAME)),
        ))
        .unwrap();
    let sink = catalog
        .add_service_model(Arc::new(
            DataServiceModel::new("image_sink").with_port(Port::input("images", FRAME)),
        ))
        .unwrap();
    let camera = catalog
        .add_task_model(Arc::new(
            TaskContextModel::new("camera_driver")
                .with_port(Port::output("frame_output", FRAME))
                .with_provides(
                    ProvidedService::new(Arc::clone(&source))
                        .with_port_mapping("images", "frame_output"),
                ),
        ))
        .unwrap();
    let tracker = catalog
        .add_task_model(Arc::new(
            TaskContextModel::new("object_tracker")
                .with_port(Port::input("frames", FRAME))
                .with_provides(
                    ProvidedService::new(Arc::clone(&sink))
                        .with_port_mapping("images", "frames"),
                ),
        ))
        .unwrap();
    let composition = catalog
        .register_composition(
            CompositionModel::new("tracking")
                .with_child(CompositionChild::new(
                    "camera",
                    vec![ModelRef::Service(Arc::clone(&source))],
                ))
                .with_child(CompositionChild::new(
                    "tracker",
                    vec![ModelRef::Service(Arc::clone(&sink))],
                ))
                .with_connection(ChildConnection {
                    source_child: "camera".to_string(),
                    sink_child: "tracker".to_string(),
                    ports: vec![PortPair {
                        source_port: "images".to_string(),
                        sink_port: "images".to_string(),
                        policy: ConnectionPolicy::Data,
                    }],
                }),
        )
        .unwrap();

    let deployment = Arc::new(
        DeploymentModel::new("vision")
            .with_slot("front_camera", Arc::clone(&camera))
            .with_slot("tracker", Arc::clone(&tracker)),
    );
    let mut deployments = DeploymentGroup::new();
    deployments.use_deployment("main", deployment);

    Fixture {
        catalog,
        source,
        sink,
        camera,
        tracker,
        composition,
        deployments: Arc::new(deployments),
    }
}

fn selecting_context(fixture: &Fixture) -> DependencyInjection {
    let mut context = DependencyInjection::new();
    context.add_explicit(
        SelectionKey::Service(Arc::clone(&fixture.source)),
        Selection::from_task(Arc::clone(&fixture.camera)),
    );
    context.add_explicit(
        SelectionKey::Service(Arc::clone(&fixture.sink)),
        Selection::from_task(Arc::clone(&fixture.tracker)),
    );
    context
}

#[test]
fn test_single_requirement_is_instantiated_and_deployed() {
    let fixture = fixture();
    let planner = SystemNetworkPlanner::new(&fixture.catalog)
        .with_default_deployments(Arc::clone(&fixture.deployments));

    let mut plan = Plan::new();
    let outcome = planner
        .apply_requirements(
            &mut plan,
            &[InstanceRequirements::from_model(Arc::clone(
                &fixture.composition,
            ))],
            &selecting_context(&fixture),
        )
        .unwrap();

    // composition root + deployed camera + deployed tracker + agent
    assert_eq!(plan.len(), 4);
    assert_eq!(outcome.deployment.deployed.len(), 2);
    assert_eq!(outcome.deployment.agents.len(), 1);
    assert_eq!(outcome.delta.added_tasks.len(), 4);
    assert!(outcome.delta.removed_tasks.is_empty());

    // the declared connection survived deployment, with mapped ports
    let connections = plan.flow().each_connection();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].source_port, "frame_output");
    assert_eq!(connections[0].sink_port, "frames");

    // every non-abstract task context ended up bound
    for task in plan.each_task() {
        if matches!(task.model, system_planner::ComponentModelRef::TaskContext(_)) {
            assert!(task.has_execution_agent(), "{} is unbound", task.id);
        }
    }
}

#[test]
fn test_identical_requirements_collapse_before_deployment() {
    let fixture = fixture();
    let planner = SystemNetworkPlanner::new(&fixture.catalog)
        .with_default_deployments(Arc::clone(&fixture.deployments));

    let requirement = InstanceRequirements::from_model(Arc::clone(&fixture.composition));
    let mut plan = Plan::new();
    let outcome = planner
        .apply_requirements(
            &mut plan,
            &[requirement.clone(), requirement],
            &selecting_context(&fixture),
        )
        .unwrap();

    // the duplicate network merged away before deployment
    assert_eq!(plan.len(), 4);
    assert!(!outcome.merges.is_empty());
    assert_eq!(outcome.roots[0], outcome.roots[1]);
    // only one slot per role was consumed
    assert_eq!(outcome.deployment.deployed.len(), 2);
}

#[test]
fn test_missing_deployment_leaves_plan_untouched() {
    let fixture = fixture();
    // no deployments registered at all
    let planner = SystemNetworkPlanner::new(&fixture.catalog);

    let mut plan = Plan::new();
    let result = planner.apply_requirements(
        &mut plan,
        &[InstanceRequirements::from_model(Arc::clone(
            &fixture.composition,
        ))],
        &selecting_context(&fixture),
    );

    match result {
        Err(Error::Deployment(network_deployment::Error::MissingDeployments(missing))) => {
            assert_eq!(missing.tasks.len(), 2);
        }
        other => panic!("expected MissingDeployments, got {other:?}"),
    }
    assert!(plan.is_empty());
}

#[test]
fn test_unselected_children_deploy_through_proxies() {
    let fixture = fixture();
    let planner = SystemNetworkPlanner::new(&fixture.catalog)
        .with_default_deployments(Arc::clone(&fixture.deployments));

    // no explicit selections: children stay abstract until the deployer
    // resolves the proxies against the slot models
    let mut plan = Plan::new();
    let outcome = planner
        .apply_requirements(
            &mut plan,
            &[InstanceRequirements::from_model(Arc::clone(
                &fixture.composition,
            ))],
            &DependencyInjection::new(),
        )
        .unwrap();

    assert_eq!(outcome.deployment.deployed.len(), 2);
    let connections = plan.flow().each_connection();
    assert_eq!(connections.len(), 1);
    // the proxy's abstract service ports were renamed onto the slots' tasks
    assert_eq!(connections[0].source_port, "frame_output");
    assert_eq!(connections[0].sink_port, "frames");
}

#[test]
fn test_incremental_requirements_reuse_the_committed_network() {
    let fixture = fixture();
    let planner = SystemNetworkPlanner::new(&fixture.catalog)
        .with_default_deployments(Arc::clone(&fixture.deployments));
    let context = selecting_context(&fixture);
    let requirement = InstanceRequirements::from_model(Arc::clone(&fixture.composition));

    let mut plan = Plan::new();
    planner
        .apply_requirements(&mut plan, &[requirement.clone()], &context)
        .unwrap();
    let first_len = plan.len();

    // the same requirement again: everything merges into the committed tasks
    let outcome = planner
        .apply_requirements(&mut plan, &[requirement], &context)
        .unwrap();
    assert_eq!(plan.len(), first_len);
    assert!(outcome.delta.added_tasks.is_empty());
    assert!(outcome.deployment.deployed.is_empty());
}
