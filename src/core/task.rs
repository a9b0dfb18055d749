//! Task data model for the execution plan.
//!
//! Tasks are the atomic units of work assigned to agents. Each task
//! tracks its kind, priority, dependencies, status, assignment, and
//! terminal result.

use crate::orchestration::registry::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task.
///
/// Issued monotonically process-wide, so identifiers double as creation
/// order. Displays in the short `task-NNNNNN` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Issue the next unique task identifier.
    pub fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an identifier from a raw counter value.
    ///
    /// Intended for deserialized data and tests; identifiers created this
    /// way are not registered with the issuing counter.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{:06}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("task-").unwrap_or(s);
        Ok(Self(digits.parse()?))
    }
}

/// Category of work a task represents.
///
/// Kinds drive executor resolution and agent capability matching. Each
/// kind carries a base duration estimate and a complexity weight used by
/// the classifier and plan scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Screen or content analysis.
    Analysis,
    /// Writing code, functions, or scripts.
    CodeGen,
    /// Creating, editing, or moving files.
    FileOps,
    /// Shell command execution.
    Terminal,
    /// Browser navigation and interaction.
    Browser,
    /// Planning and strategy work.
    Planning,
    /// Verification, validation, and debugging.
    Testing,
    /// Performance and efficiency work.
    Optimization,
}

impl TaskKind {
    /// All kinds, in declaration order.
    pub const ALL: [TaskKind; 8] = [
        TaskKind::Analysis,
        TaskKind::CodeGen,
        TaskKind::FileOps,
        TaskKind::Terminal,
        TaskKind::Browser,
        TaskKind::Planning,
        TaskKind::Testing,
        TaskKind::Optimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Analysis => "analysis",
            TaskKind::CodeGen => "code_gen",
            TaskKind::FileOps => "file_ops",
            TaskKind::Terminal => "terminal",
            TaskKind::Browser => "browser",
            TaskKind::Planning => "planning",
            TaskKind::Testing => "testing",
            TaskKind::Optimization => "optimization",
        }
    }

    /// Base duration estimate in seconds for a task of this kind.
    pub fn base_duration(&self) -> f64 {
        match self {
            TaskKind::Analysis => 2.0,
            TaskKind::CodeGen => 5.0,
            TaskKind::FileOps => 1.0,
            TaskKind::Terminal => 3.0,
            TaskKind::Browser => 4.0,
            TaskKind::Planning => 3.0,
            TaskKind::Testing => 6.0,
            TaskKind::Optimization => 8.0,
        }
    }

    /// Relative complexity weight of this kind, used in plan scoring.
    pub fn complexity_weight(&self) -> f64 {
        match self {
            TaskKind::Analysis => 0.8,
            TaskKind::CodeGen => 1.2,
            TaskKind::FileOps => 0.6,
            TaskKind::Terminal => 0.7,
            TaskKind::Browser => 1.0,
            TaskKind::Planning => 1.5,
            TaskKind::Testing => 1.1,
            TaskKind::Optimization => 1.8,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task priority, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a task reached the Failed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FailureReason {
    /// The task sits on a dependency cycle among unready tasks.
    DependencyDeadlock,
    /// A dependency reached terminal failure, so the task can never run.
    DependencyFailed {
        /// The failed dependency.
        dependency: TaskId,
    },
    /// No capable, unoccupied agent was found within the retry bound.
    AgentUnavailable,
    /// The executor reported failure or panicked.
    Executor {
        /// Error message from the executor.
        message: String,
    },
    /// The plan deadline elapsed before the task finished.
    PlanTimeout,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::DependencyDeadlock => write!(f, "dependency deadlock"),
            FailureReason::DependencyFailed { dependency } => {
                write!(f, "dependency {} failed", dependency)
            }
            FailureReason::AgentUnavailable => write!(f, "no agent available"),
            FailureReason::Executor { message } => write!(f, "executor error: {}", message),
            FailureReason::PlanTimeout => write!(f, "plan timed out"),
        }
    }
}

/// Task status in its lifecycle.
///
/// Tasks progress `Pending -> Running -> {Completed, Failed}`. The two
/// terminal states are final; transition accessors on [`Task`] refuse to
/// leave them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Task created but not yet started.
    #[default]
    Pending,
    /// Task is currently being executed by an agent.
    Running,
    /// Task completed successfully.
    Completed,
    /// Task failed terminally.
    Failed {
        /// Why the task failed.
        reason: FailureReason,
    },
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// A single schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Category of work.
    pub kind: TaskKind,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Free-text description of what the task should accomplish.
    pub description: String,
    /// Opaque parameter map forwarded to the executor.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Estimated duration in seconds, derived at creation.
    pub estimated_duration: f64,
    /// Tasks that must complete before this one can start, in order.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Current execution status.
    pub status: TaskStatus,
    /// Agent assigned to this task, set on the transition to Running.
    pub assigned_agent: Option<AgentId>,
    /// Result payload, set on the transition to Completed.
    pub result: Option<Value>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task started execution.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with a freshly issued identifier.
    pub fn new(
        kind: TaskKind,
        priority: TaskPriority,
        description: &str,
        estimated_duration: f64,
    ) -> Self {
        Self {
            id: TaskId::next(),
            kind,
            priority,
            description: description.to_string(),
            params: Map::new(),
            estimated_duration,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Attach an opaque parameter map.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Start the task under the given agent.
    ///
    /// Transitions Pending -> Running and records the start time and
    /// assignment. Has no effect unless the task is Pending; returns
    /// whether the transition applied.
    pub fn start(&mut self, agent: AgentId) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.assigned_agent = Some(agent);
        self.started_at = Some(Utc::now());
        true
    }

    /// Mark the task as successfully completed with a result payload.
    ///
    /// Transitions Running -> Completed. Has no effect unless the task is
    /// Running; returns whether the transition applied.
    pub fn complete(&mut self, result: Value) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        true
    }

    /// Mark the task as terminally failed.
    ///
    /// Allowed from Pending (scheduling failures) and Running (executor
    /// failures). Has no effect on terminal tasks; returns whether the
    /// transition applied.
    pub fn fail(&mut self, reason: FailureReason) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = TaskStatus::Failed { reason };
        self.completed_at = Some(Utc::now());
        true
    }

    /// Check if the task is in a terminal state (Completed or Failed).
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed { .. }
        )
    }

    /// Check if the task completed successfully.
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Check if the task is waiting to be scheduled.
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// The failure reason, if the task failed.
    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            TaskStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}
