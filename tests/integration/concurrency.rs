//! Parallel dispatch and shared-registry behavior.

use std::sync::Arc;
use std::time::Duration;

use conductor::orchestration::{Executor, ExecutorRegistry};
use conductor::{AgentId, AgentRegistry, Config, Orchestrator, Plan, TaskKind};

use crate::fixtures::{manual_task, orchestrator_with, register_agents, ConcurrencyProbe};

/// Scenario: two independent tasks, two agents
/// Given a plan with tasks A and B (no dependencies) and two agents
/// When the plan executes
/// Then both dispatch in the same readiness cycle and both complete
#[tokio::test]
async fn test_independent_tasks_dispatch_together() {
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(50)));
    let (orchestrator, _registry) =
        orchestrator_with(2, Arc::clone(&probe) as Arc<dyn Executor>).await;

    let mut plan = Plan::new("a and b");
    plan.add_task(manual_task(TaskKind::FileOps, "task a"));
    plan.add_task(manual_task(TaskKind::FileOps, "task b"));

    let report = orchestrator.execute(plan).await;

    assert!(report.success);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.completed.len(), 2);
    assert_eq!(probe.peak(), 2);
}

/// Single-task occupancy: one agent never runs two tasks at once, even
/// when both are ready.
#[tokio::test]
async fn test_one_agent_serializes_ready_tasks() {
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(20)));
    let (orchestrator, _registry) =
        orchestrator_with(1, Arc::clone(&probe) as Arc<dyn Executor>).await;

    let mut plan = Plan::new("both ready, one agent");
    plan.add_task(manual_task(TaskKind::FileOps, "task a"));
    plan.add_task(manual_task(TaskKind::FileOps, "task b"));

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.completed.len(), 2);
    assert_eq!(probe.peak(), 1);
}

/// Two plans can execute concurrently against one shared registry
/// without double-assigning any agent.
#[tokio::test]
async fn test_concurrent_plans_share_one_registry() {
    let registry = Arc::new(AgentRegistry::new());
    register_agents(&registry, 2).await;

    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(20)));
    let mut executors = ExecutorRegistry::new();
    executors.register_many(TaskKind::ALL, Arc::clone(&probe) as Arc<dyn Executor>);
    let executors = Arc::new(executors);

    // Both plans contend for two agents; the losing plan's tasks must be
    // able to retry until slots free up.
    let config = Config {
        plan_timeout_secs: 5,
        poll_interval_ms: 1,
        assignment_retry_limit: 500,
        recency_window_secs: 60,
        ..Config::default()
    };
    let orchestrator = Arc::new(Orchestrator::with_config(
        Arc::clone(&registry),
        executors,
        config,
    ));

    let mut plan_one = Plan::new("plan one");
    plan_one.add_task(manual_task(TaskKind::FileOps, "one a"));
    plan_one.add_task(manual_task(TaskKind::FileOps, "one b"));

    let mut plan_two = Plan::new("plan two");
    plan_two.add_task(manual_task(TaskKind::Terminal, "two a"));
    plan_two.add_task(manual_task(TaskKind::Terminal, "two b"));

    let (report_one, report_two) =
        tokio::join!(orchestrator.execute(plan_one), orchestrator.execute(plan_two));

    assert_eq!(report_one.completed.len(), 2);
    assert_eq!(report_two.completed.len(), 2);
    // Two agents total, so no more than two tasks ever ran at once.
    assert!(probe.peak() <= 2);
    assert_eq!(orchestrator.plans_executed().await, 2);
}

/// An agent registered mid-run becomes eligible on the next readiness
/// cycle.
#[tokio::test]
async fn test_agent_registered_during_execution_is_picked_up() {
    let registry = Arc::new(AgentRegistry::new());
    let mut executors = ExecutorRegistry::new();
    executors.register_many(
        TaskKind::ALL,
        Arc::new(ConcurrencyProbe::new(Duration::ZERO)) as Arc<dyn Executor>,
    );
    let config = Config {
        plan_timeout_secs: 5,
        poll_interval_ms: 5,
        // Generous bound so the task survives until the agent appears.
        assignment_retry_limit: 500,
        recency_window_secs: 60,
        ..Config::default()
    };
    let orchestrator = Orchestrator::with_config(Arc::clone(&registry), Arc::new(executors), config);

    let mut plan = Plan::new("waits for an agent");
    plan.add_task(manual_task(TaskKind::Browser, "needs browser"));

    let late_registry = Arc::clone(&registry);
    let registration = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        late_registry
            .register(AgentId::new("late-arrival"), [TaskKind::Browser])
            .await
            .unwrap();
    });

    let report = orchestrator.execute(plan).await;
    registration.await.unwrap();

    assert!(report.success);
    assert_eq!(report.completed.len(), 1);
}

/// The dispatch cap bounds per-cycle fan-out even when more agents are
/// available.
#[tokio::test]
async fn test_dispatch_cap_limits_batch_width() {
    let registry = Arc::new(AgentRegistry::new());
    register_agents(&registry, 6).await;

    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(20)));
    let mut executors = ExecutorRegistry::new();
    executors.register_many(TaskKind::ALL, Arc::clone(&probe) as Arc<dyn Executor>);

    let config = Config {
        plan_timeout_secs: 5,
        poll_interval_ms: 1,
        max_parallel_tasks: 2,
        ..Config::default()
    };
    let orchestrator = Orchestrator::with_config(registry, Arc::new(executors), config);

    let mut plan = Plan::new("six independent");
    for i in 0..6 {
        plan.add_task(manual_task(TaskKind::FileOps, &format!("task {}", i)));
    }

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.completed.len(), 6);
    assert!(probe.peak() <= 2);
}

/// Sibling isolation under fan-out: a slow sibling does not delay the
/// failure accounting of a fast one, and vice versa.
#[tokio::test]
async fn test_batch_waits_for_all_members() {
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(30)));
    let (orchestrator, registry) =
        orchestrator_with(3, Arc::clone(&probe) as Arc<dyn Executor>).await;

    let mut plan = Plan::new("three independent");
    plan.add_task(manual_task(TaskKind::FileOps, "a"));
    plan.add_task(manual_task(TaskKind::FileOps, "b"));
    plan.add_task(manual_task(TaskKind::FileOps, "c"));

    let report = orchestrator.execute(plan).await;

    assert_eq!(report.completed.len(), 3);
    assert_eq!(probe.peak(), 3);

    // All agents are free again after the batch.
    let snapshot = registry.snapshot().await;
    assert!(snapshot.iter().all(|agent| !agent.occupied));
}
