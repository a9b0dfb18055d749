//! Test fixtures for integration tests.
//!
//! Provides stub executors with controllable behavior and helpers for
//! assembling an orchestrator over a fresh registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::sleep;

use conductor::orchestration::{ExecOutcome, Executor, ExecutorRegistry};
use conductor::{AgentId, AgentRegistry, Config, Orchestrator, Task, TaskKind, TaskPriority};

/// Scheduling configuration tuned for fast tests.
pub fn fast_config() -> Config {
    Config {
        plan_timeout_secs: 5,
        poll_interval_ms: 1,
        assignment_retry_limit: 2,
        recency_window_secs: 60,
        ..Config::default()
    }
}

/// A task for hand-built plans.
pub fn manual_task(kind: TaskKind, description: &str) -> Task {
    Task::new(kind, TaskPriority::Medium, description, 1.0)
}

/// Register `count` agents declaring every capability.
pub async fn register_agents(registry: &AgentRegistry, count: usize) {
    for i in 0..count {
        registry
            .register(AgentId::new(format!("agent-{}", i + 1)), TaskKind::ALL)
            .await
            .expect("registration should succeed");
    }
}

/// Build an orchestrator over a fresh registry with `agent_count`
/// all-capability agents and the given executor bound to every kind.
pub async fn orchestrator_with(
    agent_count: usize,
    executor: Arc<dyn Executor>,
) -> (Orchestrator, Arc<AgentRegistry>) {
    let registry = Arc::new(AgentRegistry::new());
    register_agents(&registry, agent_count).await;

    let mut executors = ExecutorRegistry::new();
    executors.register_many(TaskKind::ALL, executor);

    let orchestrator =
        Orchestrator::with_config(Arc::clone(&registry), Arc::new(executors), fast_config());
    (orchestrator, registry)
}

/// Executor that always succeeds after an optional delay.
pub struct StubExecutor {
    delay: Duration,
}

impl StubExecutor {
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Executor for StubExecutor {
    async fn execute(&self, description: &str, _params: &Map<String, Value>) -> ExecOutcome {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        ExecOutcome::ok(serde_json::json!({ "done": description }))
    }
}

/// Executor that fails any task whose description contains the needle.
pub struct FailMatching {
    pub needle: &'static str,
}

#[async_trait]
impl Executor for FailMatching {
    async fn execute(&self, description: &str, _params: &Map<String, Value>) -> ExecOutcome {
        if description.contains(self.needle) {
            ExecOutcome::err(format!("refused: {}", description))
        } else {
            ExecOutcome::ok(Value::Null)
        }
    }
}

/// Executor that tracks its peak number of concurrent invocations.
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Self {
        Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            hold,
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for ConcurrencyProbe {
    async fn execute(&self, _description: &str, _params: &Map<String, Value>) -> ExecOutcome {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        ExecOutcome::ok(Value::Null)
    }
}
