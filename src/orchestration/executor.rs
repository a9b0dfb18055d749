//! External executor and observability contracts.
//!
//! Executors are the out-of-scope collaborators that actually perform a
//! task's work (shell, files, browser, screen analysis). The
//! orchestrator consumes them through the [`Executor`] trait and resolves
//! them by task kind from an [`ExecutorRegistry`], so adding an executor
//! kind never touches orchestration code.

use crate::core::plan::PlanId;
use crate::core::task::{TaskId, TaskKind, TaskStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of one executor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Whether the work succeeded.
    pub success: bool,
    /// Result payload; shape is executor-specific.
    #[serde(default)]
    pub data: Value,
    /// Error description when `success` is false.
    pub error_message: Option<String>,
    /// Self-reported duration in seconds. Zero when the executor does
    /// not measure; the orchestrator falls back to its own wall clock.
    pub duration_seconds: f64,
}

impl ExecOutcome {
    /// A successful outcome carrying a result payload.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error_message: None,
            duration_seconds: 0.0,
        }
    }

    /// A failed outcome with an error message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error_message: Some(message.into()),
            duration_seconds: 0.0,
        }
    }

    /// Attach a self-reported duration.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }
}

/// An external capability that performs a task's work.
///
/// Implementations receive the task description and its opaque parameter
/// map (which carries any caller-supplied context unmodified). They
/// report failure through the returned outcome; a panic inside an
/// executor is contained by the orchestrator and converted into a failed
/// task, never propagated.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, description: &str, params: &Map<String, Value>) -> ExecOutcome;
}

/// Capability-keyed executor registry.
///
/// Maps each task kind to the executor that handles it. One executor
/// instance may be registered under several kinds.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor for one kind, replacing any previous one.
    pub fn register(&mut self, kind: TaskKind, executor: Arc<dyn Executor>) {
        self.executors.insert(kind, executor);
    }

    /// Register one executor under several kinds.
    pub fn register_many(
        &mut self,
        kinds: impl IntoIterator<Item = TaskKind>,
        executor: Arc<dyn Executor>,
    ) {
        for kind in kinds {
            self.executors.insert(kind, Arc::clone(&executor));
        }
    }

    /// Resolve the executor for a kind.
    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn Executor>> {
        self.executors.get(&kind).cloned()
    }

    /// Kinds with a registered executor, sorted by name.
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<TaskKind> = self.executors.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

/// Events emitted on task and plan terminal transitions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum OrchestratorEvent {
    /// A task reached a terminal state.
    Task {
        plan_id: PlanId,
        task_id: TaskId,
        kind: TaskKind,
        status: TaskStatus,
        duration_seconds: f64,
        error: Option<String>,
    },
    /// A plan finished executing.
    Plan {
        plan_id: PlanId,
        success: bool,
        completed: usize,
        failed: usize,
        duration_seconds: f64,
    },
}

/// Optional observability sink.
///
/// The orchestrator emits an event on every task terminal transition and
/// on plan completion. Sinks must not block; absence of a sink never
/// affects scheduling.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: OrchestratorEvent);
}

/// Sink adapter that forwards events into a tokio mpsc channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: OrchestratorEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }
}

/// Deterministic stand-in executor that succeeds and echoes its input.
///
/// Used by the CLI demo and as a baseline in tests; real deployments
/// register executors backed by actual capabilities.
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, description: &str, params: &Map<String, Value>) -> ExecOutcome {
        ExecOutcome::ok(serde_json::json!({
            "echo": description,
            "params": Value::Object(params.clone()),
        }))
    }
}
