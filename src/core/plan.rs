//! Execution plan: a dependency graph of tasks plus scheduling metadata.
//!
//! A Plan is built once from a user request, mutated only by the
//! orchestrator as task statuses change, and becomes effectively
//! read-only once every task reaches a terminal state.

use crate::core::task::{Task, TaskId, TaskKind, TaskPriority, TaskStatus};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent, NodeFiltered};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PLAN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a plan.
///
/// Issued monotonically process-wide. Displays as `plan-NNNNNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(u64);

impl PlanId {
    /// Issue the next unique plan identifier.
    pub fn next() -> Self {
        Self(NEXT_PLAN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an identifier from a raw counter value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plan-{:06}", self.0)
    }
}

impl std::str::FromStr for PlanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("plan-").unwrap_or(s);
        Ok(Self(digits.parse()?))
    }
}

/// Aggregate status of a plan, derived from its task statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// No task has started yet.
    Pending,
    /// At least one task has made progress and some are not terminal.
    Running,
    /// Every task completed successfully.
    Completed,
    /// Every task is terminal and at least one failed.
    Failed,
}

/// A dependency graph of tasks derived from one user request.
///
/// Tasks are nodes in a petgraph `DiGraph`; an edge `a -> b` means `a`
/// must complete before `b` can start. Dependencies referencing ids not
/// in the plan are rejected when added, so execution never encounters a
/// dangling edge. Multi-task cycles are representable (and rejected
/// nowhere at build time beyond self-loops): the orchestrator detects
/// them at execution time and fails the implicated tasks.
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// The originating request text.
    pub request: String,
    /// Weighted complexity score, set by the plan builder.
    pub complexity: f64,
    /// Groups of tasks with no dependencies among themselves, precomputed
    /// as a scheduling hint. Only groups with more than one member are
    /// recorded.
    pub parallel_groups: Vec<Vec<TaskId>>,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// The underlying directed graph.
    graph: DiGraph<Task, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
    /// Task ids in insertion order.
    order: Vec<TaskId>,
}

impl Plan {
    /// Create a new empty plan for the given request text.
    pub fn new(request: &str) -> Self {
        Self {
            id: PlanId::next(),
            request: request.to_string(),
            complexity: 0.0,
            parallel_groups: Vec::new(),
            created_at: Utc::now(),
            graph: DiGraph::new(),
            task_index: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a task to the plan, returning its id.
    ///
    /// Adding a task whose id is already present is a no-op.
    pub fn add_task(&mut self, task: Task) -> TaskId {
        let id = task.id;
        if self.task_index.contains_key(&id) {
            return id;
        }
        let index = self.graph.add_node(task);
        self.task_index.insert(id, index);
        self.order.push(id);
        id
    }

    /// Record that `dependency` must complete before `task` can start.
    ///
    /// # Errors
    ///
    /// Returns an error if either id is not in the plan, or if the two
    /// ids are equal. Cycles spanning several tasks are not rejected
    /// here; they are detected during execution.
    pub fn add_dependency(&mut self, dependency: &TaskId, task: &TaskId) -> Result<()> {
        if dependency == task {
            return Err(Error::SelfDependency { task: *task });
        }
        let dep_index = *self
            .task_index
            .get(dependency)
            .ok_or(Error::UnknownDependency {
                task: *task,
                dependency: *dependency,
            })?;
        let task_index = *self.task_index.get(task).ok_or(Error::TaskNotFound { id: *task })?;

        self.graph.add_edge(dep_index, task_index, ());
        if let Some(node) = self.graph.node_weight_mut(task_index) {
            node.dependencies.push(*dependency);
        }
        Ok(())
    }

    /// Get a reference to a task by its id.
    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get a mutable reference to a task by its id.
    pub fn get_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        if let Some(&index) = self.task_index.get(id) {
            self.graph.node_weight_mut(index)
        } else {
            None
        }
    }

    /// Check if the plan contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Task ids in insertion order.
    pub fn task_ids(&self) -> &[TaskId] {
        &self.order
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.get_task(id))
    }

    /// Number of tasks in the plan.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges in the plan.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Sum of the tasks' estimated durations in seconds.
    pub fn total_estimated_duration(&self) -> f64 {
        self.tasks().map(|t| t.estimated_duration).sum()
    }

    // ========== Scheduling Queries ==========

    /// Pending tasks whose every dependency is Completed, in insertion
    /// order.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.order
            .iter()
            .filter_map(|id| {
                let &index = self.task_index.get(id)?;
                let task = self.graph.node_weight(index)?;
                if !task.is_pending() {
                    return None;
                }
                let deps_met = self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .all(|dep_index| {
                        self.graph
                            .node_weight(dep_index)
                            .map(|dep| dep.is_completed())
                            .unwrap_or(false)
                    });
                deps_met.then_some(*id)
            })
            .collect()
    }

    /// Pending tasks one of whose dependencies has terminally failed,
    /// paired with the first failed dependency. These can never become
    /// ready.
    pub fn doomed_tasks(&self) -> Vec<(TaskId, TaskId)> {
        self.order
            .iter()
            .filter_map(|id| {
                let task = self.get_task(id)?;
                if !task.is_pending() {
                    return None;
                }
                let failed_dep = task.dependencies.iter().find(|dep| {
                    self.get_task(dep)
                        .map(|d| matches!(d.status, TaskStatus::Failed { .. }))
                        .unwrap_or(false)
                })?;
                Some((*id, *failed_dep))
            })
            .collect()
    }

    /// Tasks lying on a dependency cycle within the pending subset.
    ///
    /// Runs a depth-first search restricted to Pending tasks, tracking
    /// the on-stack path; every back edge marks the stack segment from
    /// its target onward as cyclic. The result is sorted by id. Empty if
    /// the pending subgraph is acyclic.
    pub fn cyclic_tasks(&self) -> Vec<TaskId> {
        let pending: HashSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .node_weight(index)
                    .map(|t| t.is_pending())
                    .unwrap_or(false)
            })
            .collect();

        let filtered = NodeFiltered::from_fn(&self.graph, |index| pending.contains(&index));
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut cyclic: HashSet<NodeIndex> = HashSet::new();

        depth_first_search(&filtered, pending.iter().copied(), |event| {
            match event {
                DfsEvent::Discover(index, _) => stack.push(index),
                DfsEvent::Finish(_, _) => {
                    stack.pop();
                }
                DfsEvent::BackEdge(_, target) => {
                    if let Some(pos) = stack.iter().position(|&n| n == target) {
                        cyclic.extend(stack[pos..].iter().copied());
                    }
                }
                _ => {}
            }
            Control::<()>::Continue
        });

        let mut ids: Vec<TaskId> = cyclic
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index).map(|t| t.id))
            .collect();
        ids.sort();
        ids
    }

    // ========== Aggregate Status ==========

    /// Number of tasks not yet in a terminal state.
    pub fn unfinished_count(&self) -> usize {
        self.tasks().filter(|t| !t.is_finished()).count()
    }

    /// Check if every task has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.tasks().all(|t| t.is_finished())
    }

    /// Fraction of tasks in a terminal state, in `0.0..=1.0`.
    pub fn completion(&self) -> f64 {
        let total = self.task_count();
        if total == 0 {
            return 1.0;
        }
        let finished = self.tasks().filter(|t| t.is_finished()).count();
        finished as f64 / total as f64
    }

    /// Aggregate status derived from the task statuses.
    pub fn status(&self) -> PlanStatus {
        if self.tasks().all(|t| t.is_completed()) {
            return PlanStatus::Completed;
        }
        if self.is_settled() {
            return PlanStatus::Failed;
        }
        if self.tasks().all(|t| t.is_pending()) {
            return PlanStatus::Pending;
        }
        PlanStatus::Running
    }

    /// Serializable snapshot of the plan for reporting and display.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            id: self.id,
            request: self.request.clone(),
            complexity: self.complexity,
            estimated_duration: self.total_estimated_duration(),
            parallel_groups: self.parallel_groups.clone(),
            tasks: self
                .tasks()
                .map(|t| TaskBrief {
                    id: t.id,
                    kind: t.kind,
                    priority: t.priority,
                    description: t.description.clone(),
                    estimated_duration: t.estimated_duration,
                    dependencies: t.dependencies.clone(),
                    status: t.status.clone(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("id", &self.id)
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .field("complexity", &self.complexity)
            .finish()
    }
}

/// Serializable view of a single task inside a [`PlanSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBrief {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub description: String,
    pub estimated_duration: f64,
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
}

/// Serializable snapshot of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub id: PlanId,
    pub request: String,
    pub complexity: f64,
    pub estimated_duration: f64,
    pub parallel_groups: Vec<Vec<TaskId>>,
    pub tasks: Vec<TaskBrief>,
}
