//! Agent registry: executor handles, occupancy, and selection scoring.
//!
//! The registry tracks known executors (agents): identity, declared
//! capabilities, current assignment, and rolling performance metrics.
//! Selection and occupancy both happen under the registry's write lock,
//! so an agent can never be handed to two tasks at once, even when
//! several plans execute concurrently against one shared registry.

use crate::core::task::{Task, TaskId, TaskKind, TaskPriority};
use crate::error::{Error, Result};
use crate::{clog, clog_trace};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Scoring weight applied to an agent's success rate.
const SUCCESS_RATE_WEIGHT: f64 = 50.0;
/// Scoring penalty per queued task.
const QUEUE_PENALTY: f64 = 5.0;
/// Scoring bonus for declaring the task's kind.
const CAPABILITY_BONUS: f64 = 30.0;
/// Scoring bonus for high and critical priority tasks.
const PRIORITY_BONUS: f64 = 20.0;
/// Scoring bonus for agents active within the recency window.
const RECENCY_BONUS: f64 = 10.0;

/// Default recency window for the activity bonus.
const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(60);

/// Caller-supplied agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Rolling performance metrics for one agent.
///
/// Updated only on terminal task transitions attributed to the agent,
/// using incremental means so no per-task history is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Fraction of attributed tasks that completed successfully.
    pub success_rate: f64,
    /// Mean duration in seconds across attributed tasks.
    pub average_duration: f64,
    /// Number of attributed terminal tasks.
    pub completed_tasks: u64,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        // New agents start with a perfect record so they are not
        // starved before their first assignment.
        Self {
            success_rate: 1.0,
            average_duration: 0.0,
            completed_tasks: 0,
        }
    }
}

impl AgentMetrics {
    /// Fold one terminal outcome into the rolling means.
    pub fn record(&mut self, success: bool, duration_seconds: f64) {
        let total = self.completed_tasks + 1;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate =
            (self.success_rate * self.completed_tasks as f64 + outcome) / total as f64;
        self.average_duration =
            (self.average_duration * self.completed_tasks as f64 + duration_seconds) / total as f64;
        self.completed_tasks = total;
    }

    /// Derived efficiency: success discounted by average duration.
    pub fn efficiency(&self) -> f64 {
        self.success_rate / (1.0 + self.average_duration)
    }
}

/// One registered agent.
struct AgentEntry {
    id: AgentId,
    capabilities: HashSet<TaskKind>,
    /// The task currently in flight, if any. Exclusive: an agent with a
    /// task here (or queued below) is not selectable.
    current_task: Option<TaskId>,
    /// Tasks assigned but not yet started.
    queue: VecDeque<TaskId>,
    metrics: AgentMetrics,
    last_active: DateTime<Utc>,
}

impl AgentEntry {
    fn is_occupied(&self) -> bool {
        self.current_task.is_some() || !self.queue.is_empty()
    }
}

/// Serializable view of one agent for status output.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub capabilities: Vec<TaskKind>,
    pub occupied: bool,
    pub queued: usize,
    pub metrics: AgentMetrics,
    pub efficiency: f64,
    pub last_active: DateTime<Utc>,
}

struct RegistryInner {
    /// Agents in registration order; order is the selection tie-break.
    agents: Vec<AgentEntry>,
    index: HashMap<AgentId, usize>,
}

/// Registry of known agents shared by all plan executions.
pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
    recency_window: chrono::Duration,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::with_recency_window(DEFAULT_RECENCY_WINDOW)
    }

    /// Create a registry with a custom recency-bonus window.
    pub fn with_recency_window(window: Duration) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                agents: Vec::new(),
                index: HashMap::new(),
            }),
            recency_window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Register an agent with its declared capabilities.
    ///
    /// Callable before or during operation; a newly registered agent
    /// becomes eligible on the next readiness cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is already registered.
    pub async fn register(
        &self,
        id: AgentId,
        capabilities: impl IntoIterator<Item = TaskKind>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(&id) {
            return Err(Error::DuplicateAgent { id });
        }
        let entry = AgentEntry {
            id: id.clone(),
            capabilities: capabilities.into_iter().collect(),
            current_task: None,
            queue: VecDeque::new(),
            metrics: AgentMetrics::default(),
            last_active: Utc::now(),
        };
        let capability_count = entry.capabilities.len();
        let slot = inner.agents.len();
        inner.agents.push(entry);
        inner.index.insert(id.clone(), slot);
        clog!("registered agent {} ({} capabilities)", id, capability_count);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.agents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.agents.is_empty()
    }

    /// Pick the best capable, unoccupied agent for the task and assign
    /// the task to its waiting queue in the same critical section.
    ///
    /// Returns `None` when no candidate qualifies; that is a scheduling
    /// signal, not an error. The caller retries on a later cycle.
    pub async fn select_and_occupy(&self, task: &Task) -> Option<AgentId> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let mut best: Option<usize> = None;
        let mut best_score = f64::NEG_INFINITY;
        for (slot, entry) in inner.agents.iter().enumerate() {
            if entry.is_occupied() || !entry.capabilities.contains(&task.kind) {
                continue;
            }
            let score = self.score(entry, task, now);
            clog_trace!("agent {} scored {:.1} for {}", entry.id, score, task.id);
            // Strictly greater: ties keep the earliest registration.
            if score > best_score {
                best_score = score;
                best = Some(slot);
            }
        }

        let slot = best?;
        let entry = &mut inner.agents[slot];
        entry.queue.push_back(task.id);
        Some(entry.id.clone())
    }

    fn score(&self, entry: &AgentEntry, task: &Task, now: DateTime<Utc>) -> f64 {
        let mut score = entry.metrics.success_rate * SUCCESS_RATE_WEIGHT;
        score -= entry.queue.len() as f64 * QUEUE_PENALTY;
        if entry.capabilities.contains(&task.kind) {
            score += CAPABILITY_BONUS;
        }
        if task.priority >= TaskPriority::High {
            score += PRIORITY_BONUS;
        }
        if now.signed_duration_since(entry.last_active) <= self.recency_window {
            score += RECENCY_BONUS;
        }
        score
    }

    /// Move an assigned task from the agent's waiting queue into its
    /// in-flight slot.
    pub async fn begin(&self, id: &AgentId, task: TaskId) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = lookup_mut(&mut inner, id) {
            entry.queue.retain(|queued| *queued != task);
            entry.current_task = Some(task);
        }
    }

    /// Release the agent from a task and fold the outcome into its
    /// metrics. Frees the occupancy slot whether the task had started or
    /// was still queued.
    pub async fn release(&self, id: &AgentId, task: TaskId, success: bool, duration_seconds: f64) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = lookup_mut(&mut inner, id) {
            if entry.current_task == Some(task) {
                entry.current_task = None;
            }
            entry.queue.retain(|queued| *queued != task);
            entry.metrics.record(success, duration_seconds);
            entry.last_active = Utc::now();
        }
    }

    /// Snapshot of every agent, in registration order.
    pub async fn snapshot(&self) -> Vec<AgentSnapshot> {
        let inner = self.inner.read().await;
        inner
            .agents
            .iter()
            .map(|entry| {
                let mut capabilities: Vec<TaskKind> = entry.capabilities.iter().copied().collect();
                capabilities.sort_by_key(|k| k.as_str());
                AgentSnapshot {
                    id: entry.id.clone(),
                    capabilities,
                    occupied: entry.is_occupied(),
                    queued: entry.queue.len(),
                    metrics: entry.metrics.clone(),
                    efficiency: entry.metrics.efficiency(),
                    last_active: entry.last_active,
                }
            })
            .collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_mut<'a>(inner: &'a mut RegistryInner, id: &AgentId) -> Option<&'a mut AgentEntry> {
    let slot = *inner.index.get(id)?;
    inner.agents.get_mut(slot)
}
