//! Deadlocks, unavailable agents, timeouts, and partial failure.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;

use conductor::orchestration::{ExecutorRegistry, Halt};
use conductor::{
    AgentId, AgentRegistry, Config, Orchestrator, Plan, TaskKind,
};

use crate::fixtures::{fast_config, manual_task, orchestrator_with, FailMatching, StubExecutor};

/// Scenario: "screenshot" with no screen-capable agent
/// Given a registry whose only agent handles file operations
/// When a screenshot request is submitted
/// Then the report has one failed task with an agent-unavailable reason
#[tokio::test]
async fn test_screenshot_without_capable_agent() {
    let registry = Arc::new(AgentRegistry::new());
    registry
        .register(AgentId::new("files-only"), [TaskKind::FileOps])
        .await
        .unwrap();
    let mut executors = ExecutorRegistry::new();
    executors.register_many(TaskKind::ALL, Arc::new(StubExecutor::instant()));
    let orchestrator =
        Orchestrator::with_config(registry, Arc::new(executors), fast_config());

    let report = orchestrator
        .submit_request("screenshot", &Map::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed.len(), 1);
    assert!(report.completed.is_empty());
    let outcome = report.outcomes.values().next().unwrap();
    assert_eq!(outcome.error.as_deref(), Some("no agent available"));
}

/// A dependency cycle fails exactly the cyclic subset; unrelated tasks
/// in the same plan still run.
#[tokio::test]
async fn test_cycle_fails_exactly_the_cyclic_subset() {
    let (orchestrator, _registry) = orchestrator_with(2, Arc::new(StubExecutor::instant())).await;

    let mut plan = Plan::new("cycle with bystander");
    let a = plan.add_task(manual_task(TaskKind::FileOps, "a"));
    let b = plan.add_task(manual_task(TaskKind::FileOps, "b"));
    let bystander = plan.add_task(manual_task(TaskKind::Terminal, "independent"));
    plan.add_dependency(&a, &b).unwrap();
    plan.add_dependency(&b, &a).unwrap();

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.halt, Some(Halt::DependencyDeadlock));
    assert_eq!(report.completed, vec![bystander]);
    assert_eq!(report.failed, vec![a, b]);
    assert_eq!(
        report.outcomes[&a].error.as_deref(),
        Some("dependency deadlock")
    );
    assert_eq!(
        report.outcomes[&b].error.as_deref(),
        Some("dependency deadlock")
    );
}

/// A failing head of a chain cascades distinct reasons downstream.
#[tokio::test]
async fn test_chain_head_failure_cascades() {
    let (orchestrator, _registry) =
        orchestrator_with(1, Arc::new(FailMatching { needle: "head" })).await;

    let mut plan = Plan::new("doomed chain");
    let head = plan.add_task(manual_task(TaskKind::FileOps, "head step"));
    let mid = plan.add_task(manual_task(TaskKind::FileOps, "mid step"));
    let tail = plan.add_task(manual_task(TaskKind::FileOps, "tail step"));
    plan.add_dependency(&head, &mid).unwrap();
    plan.add_dependency(&mid, &tail).unwrap();

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.failed, vec![head, mid, tail]);
    assert!(report.outcomes[&head]
        .error
        .as_deref()
        .unwrap()
        .contains("refused"));
    assert_eq!(
        report.outcomes[&mid].error.as_deref(),
        Some(format!("dependency {} failed", head).as_str())
    );
    assert_eq!(
        report.outcomes[&tail].error.as_deref(),
        Some(format!("dependency {} failed", mid).as_str())
    );
    // The loop halted through settlement, not deadlock or timeout.
    assert!(report.halt.is_none());
}

/// A plan can succeed with some task failures as long as more than half
/// complete.
#[tokio::test]
async fn test_partial_failure_above_half_is_success() {
    let (orchestrator, _registry) =
        orchestrator_with(3, Arc::new(FailMatching { needle: "flaky" })).await;

    let mut plan = Plan::new("two good, one flaky");
    plan.add_task(manual_task(TaskKind::FileOps, "solid one"));
    plan.add_task(manual_task(TaskKind::FileOps, "solid two"));
    let flaky = plan.add_task(manual_task(TaskKind::FileOps, "flaky one"));

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed, vec![flaky]);
    assert!((report.success_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!(report.success);
}

/// The plan deadline fails every non-terminal task and returns promptly.
#[tokio::test]
async fn test_plan_timeout_reports_promptly() {
    let registry = Arc::new(AgentRegistry::new());
    registry
        .register(AgentId::new("worker"), TaskKind::ALL)
        .await
        .unwrap();
    let mut executors = ExecutorRegistry::new();
    executors.register_many(
        TaskKind::ALL,
        Arc::new(StubExecutor::slow(Duration::from_secs(30))),
    );
    let config = Config {
        plan_timeout_secs: 1,
        poll_interval_ms: 10,
        assignment_retry_limit: 2,
        recency_window_secs: 60,
        ..Config::default()
    };
    let orchestrator = Orchestrator::with_config(Arc::clone(&registry), Arc::new(executors), config);

    let mut plan = Plan::new("stalls");
    let stuck = plan.add_task(manual_task(TaskKind::Terminal, "hang"));
    let behind = plan.add_task(manual_task(TaskKind::Terminal, "after hang"));
    plan.add_dependency(&stuck, &behind).unwrap();

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.halt, Some(Halt::Timeout));
    assert_eq!(report.failed.len(), 2);
    assert_eq!(
        report.outcomes[&stuck].error.as_deref(),
        Some("plan timed out")
    );
    // The executor sleeps for 30s; the report must come back around the
    // 1s deadline instead.
    assert!(report.duration_seconds < 5.0);

    // The agent slot was reclaimed despite the abandoned call.
    let snapshot = registry.snapshot().await;
    assert!(!snapshot[0].occupied);
}

/// An empty request is the only way submit_request can fail.
#[tokio::test]
async fn test_empty_request_rejected_at_build_time() {
    let (orchestrator, _registry) = orchestrator_with(1, Arc::new(StubExecutor::instant())).await;

    let result = orchestrator.submit_request("   ", &Map::new()).await;
    assert!(result.is_err());
}
