//! Plan execution engine.
//!
//! The Orchestrator drives a [`Plan`] to completion with a readiness
//! loop: compute the ready set, select an agent for each ready task,
//! dispatch the assigned batch concurrently, fold completions, repeat.
//! Failure containment is per task: an executor error or panic fails
//! its own task and nothing else. Only a dependency deadlock or the plan
//! deadline halts the loop early, and even then `execute` returns a
//! report rather than an error.

use crate::config::Config;
use crate::core::plan::{Plan, PlanId, PlanSummary};
use crate::core::task::{FailureReason, TaskId};
use crate::error::Result;
use crate::orchestration::executor::{
    EventSink, ExecOutcome, ExecutorRegistry, OrchestratorEvent,
};
use crate::orchestration::registry::{AgentId, AgentRegistry, AgentSnapshot};
use crate::routing::classifier::RoutingStats;
use crate::routing::planner::PlanBuilder;
use crate::{clog, clog_debug, clog_warn};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

/// Unique identifier for an orchestrator instance.
///
/// Distinguishes coordinators in logs and status output when several
/// run in one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrchestratorId(pub Uuid);

impl OrchestratorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for OrchestratorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrchestratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a plan's driving loop stopped before every task was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Halt {
    /// A dependency cycle was found among the unready tasks.
    DependencyDeadlock,
    /// The plan deadline elapsed.
    Timeout,
}

/// Per-task result inside an [`ExecutionReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub duration_seconds: f64,
}

/// Aggregate outcome of one plan execution.
///
/// `success` means more than half of the tasks completed; callers must
/// inspect `outcomes` for exact per-task results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub plan_id: PlanId,
    pub success: bool,
    pub success_rate: f64,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub outcomes: BTreeMap<TaskId, TaskOutcome>,
    pub duration_seconds: f64,
    /// Present when the driving loop stopped early.
    pub halt: Option<Halt>,
}

/// Archived plan: its build-time summary plus the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub summary: PlanSummary,
    pub report: ExecutionReport,
}

/// Snapshot of an orchestrator and its registry for status output.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub id: OrchestratorId,
    pub agents: Vec<AgentSnapshot>,
    pub plans_executed: usize,
    pub routing: RoutingStats,
}

/// Drives plans to completion against a shared agent registry.
///
/// The orchestrator is an explicit value owned by the caller; there is
/// no ambient global instance. Several orchestrators (or several
/// concurrent `execute` calls on one) may share one [`AgentRegistry`];
/// occupancy is serialized inside the registry.
pub struct Orchestrator {
    id: OrchestratorId,
    registry: Arc<AgentRegistry>,
    executors: Arc<ExecutorRegistry>,
    builder: PlanBuilder,
    config: Config,
    sink: Option<Arc<dyn EventSink>>,
    records: RwLock<HashMap<PlanId, PlanRecord>>,
}

impl Orchestrator {
    /// Create an orchestrator with default configuration.
    pub fn new(registry: Arc<AgentRegistry>, executors: Arc<ExecutorRegistry>) -> Self {
        Self::with_config(registry, executors, Config::default())
    }

    /// Create an orchestrator with explicit scheduling configuration.
    pub fn with_config(
        registry: Arc<AgentRegistry>,
        executors: Arc<ExecutorRegistry>,
        config: Config,
    ) -> Self {
        Self {
            id: OrchestratorId::new(),
            registry,
            executors,
            builder: PlanBuilder::new(),
            config,
            sink: None,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an observability sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> OrchestratorId {
        self.id
    }

    /// The registry this orchestrator schedules against.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Build a plan for the request and drive it to completion.
    ///
    /// Synchronous from the caller's perspective; the context map is
    /// forwarded unmodified to executors via the tasks' parameter maps.
    ///
    /// # Errors
    ///
    /// Only plan construction can fail (empty request); execution itself
    /// always produces a report.
    pub async fn submit_request(
        &self,
        text: &str,
        context: &Map<String, Value>,
    ) -> Result<ExecutionReport> {
        let plan = self.builder.build_plan_with_context(text, context)?;
        Ok(self.execute(plan).await)
    }

    /// Drive a plan to completion and report the aggregate outcome.
    ///
    /// Never panics outward and never returns an error: every task ends
    /// in a terminal state (or is failed at the deadline) and the call
    /// always yields a report.
    pub async fn execute(&self, mut plan: Plan) -> ExecutionReport {
        let started = Instant::now();
        let deadline = started + self.config.plan_timeout();
        let mut outcomes: BTreeMap<TaskId, TaskOutcome> = BTreeMap::new();
        let mut retries: HashMap<TaskId, u32> = HashMap::new();
        let mut halt: Option<Halt> = None;

        clog!(
            "orchestrator {} executing {} ({} task(s))",
            self.id.short(),
            plan.id,
            plan.task_count()
        );

        loop {
            // Tasks behind a failed dependency can never become ready;
            // fail them now instead of stalling to the deadline.
            self.cascade_failures(&mut plan, &mut outcomes);

            if plan.is_settled() {
                break;
            }

            if Instant::now() >= deadline {
                self.expire(&mut plan, &mut outcomes);
                halt = Some(Halt::Timeout);
                break;
            }

            let mut ready = plan.ready_tasks();
            if ready.is_empty() {
                let cyclic = plan.cyclic_tasks();
                if !cyclic.is_empty() {
                    clog_warn!(
                        "{}: dependency deadlock across {} task(s)",
                        plan.id,
                        cyclic.len()
                    );
                    for task_id in cyclic {
                        self.fail_task(
                            &mut plan,
                            task_id,
                            FailureReason::DependencyDeadlock,
                            &mut outcomes,
                        );
                    }
                    self.cascade_failures(&mut plan, &mut outcomes);
                    halt = Some(Halt::DependencyDeadlock);
                    break;
                }
                // Nothing ready yet; wait briefly, bounded by the deadline.
                self.backoff(deadline).await;
                continue;
            }

            // Overflow beyond the dispatch cap stays pending and is
            // picked up by a later cycle without touching retry counts.
            let cap = self.config.max_parallel_tasks;
            if cap > 0 && ready.len() > cap {
                ready.truncate(cap);
            }

            // Select an agent for each ready task. No agent is not an
            // error: the task stays pending and is retried next cycle,
            // up to the retry bound.
            let mut batch: Vec<(TaskId, AgentId)> = Vec::new();
            for task_id in ready {
                let Some(task) = plan.get_task(&task_id) else {
                    continue;
                };
                match self.registry.select_and_occupy(task).await {
                    Some(agent_id) => batch.push((task_id, agent_id)),
                    None => {
                        let attempts = retries.entry(task_id).or_insert(0);
                        *attempts += 1;
                        if *attempts > self.config.assignment_retry_limit {
                            clog_warn!(
                                "{}: no agent for {} after {} attempt(s)",
                                plan.id,
                                task_id,
                                attempts
                            );
                            self.fail_task(
                                &mut plan,
                                task_id,
                                FailureReason::AgentUnavailable,
                                &mut outcomes,
                            );
                        } else {
                            clog_debug!(
                                "{}: {} waiting for an agent (attempt {})",
                                plan.id,
                                task_id,
                                attempts
                            );
                        }
                    }
                }
            }

            if batch.is_empty() {
                self.backoff(deadline).await;
                continue;
            }

            let deadline_hit = self
                .dispatch_batch(&mut plan, batch, deadline, &mut outcomes)
                .await;
            if deadline_hit {
                self.expire(&mut plan, &mut outcomes);
                halt = Some(Halt::Timeout);
                break;
            }
        }

        self.finish(plan, started, halt, outcomes).await
    }

    /// Fail every pending task sitting behind a terminally failed
    /// dependency, transitively.
    fn cascade_failures(&self, plan: &mut Plan, outcomes: &mut BTreeMap<TaskId, TaskOutcome>) {
        loop {
            let doomed = plan.doomed_tasks();
            if doomed.is_empty() {
                break;
            }
            for (task_id, dependency) in doomed {
                self.fail_task(
                    plan,
                    task_id,
                    FailureReason::DependencyFailed { dependency },
                    outcomes,
                );
            }
        }
    }

    /// Dispatch an assigned batch concurrently and wait for it, bounded
    /// by the plan deadline. Returns true if the deadline cut the batch
    /// short.
    async fn dispatch_batch(
        &self,
        plan: &mut Plan,
        batch: Vec<(TaskId, AgentId)>,
        deadline: Instant,
        outcomes: &mut BTreeMap<TaskId, TaskOutcome>,
    ) -> bool {
        let mut handles: Vec<JoinHandle<(ExecOutcome, f64)>> = Vec::new();
        let mut dispatched: Vec<(TaskId, AgentId)> = Vec::new();

        for (task_id, agent_id) in batch {
            let Some(kind) = plan.get_task(&task_id).map(|task| task.kind) else {
                continue;
            };
            match self.executors.get(kind) {
                None => {
                    // The agent declared the capability but nothing is
                    // bound to execute it.
                    self.registry.release(&agent_id, task_id, false, 0.0).await;
                    self.fail_task(
                        plan,
                        task_id,
                        FailureReason::Executor {
                            message: format!("no executor registered for kind {}", kind),
                        },
                        outcomes,
                    );
                }
                Some(executor) => {
                    let Some((description, params)) =
                        plan.get_task_mut(&task_id).map(|task| {
                            task.start(agent_id.clone());
                            (task.description.clone(), task.params.clone())
                        })
                    else {
                        continue;
                    };
                    self.registry.begin(&agent_id, task_id).await;
                    clog_debug!("{}: {} running on {}", plan.id, task_id, agent_id);

                    // Spawned so a panicking executor surfaces as a
                    // JoinError instead of unwinding through execute.
                    handles.push(tokio::spawn(async move {
                        let clock = Instant::now();
                        let outcome = executor.execute(&description, &params).await;
                        let measured = clock.elapsed().as_secs_f64();
                        (outcome, measured)
                    }));
                    dispatched.push((task_id, agent_id));
                }
            }
        }

        if dispatched.is_empty() {
            return false;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, join_all(handles)).await {
            Ok(results) => {
                for ((task_id, agent_id), result) in dispatched.into_iter().zip(results) {
                    match result {
                        Ok((outcome, measured)) => {
                            self.fold_outcome(plan, task_id, agent_id, outcome, measured, outcomes)
                                .await;
                        }
                        Err(join_error) => {
                            self.registry.release(&agent_id, task_id, false, 0.0).await;
                            self.fail_task(
                                plan,
                                task_id,
                                FailureReason::Executor {
                                    message: format!("executor panicked: {}", join_error),
                                },
                                outcomes,
                            );
                        }
                    }
                }
                false
            }
            Err(_) => {
                // The in-flight executor calls keep running detached;
                // their agents are released so the slots are reclaimable.
                clog_warn!("{}: batch abandoned at plan deadline", plan.id);
                for (task_id, agent_id) in dispatched {
                    self.registry.release(&agent_id, task_id, false, 0.0).await;
                    self.fail_task(plan, task_id, FailureReason::PlanTimeout, outcomes);
                }
                true
            }
        }
    }

    /// Fold one executor outcome into the plan, registry, and report.
    async fn fold_outcome(
        &self,
        plan: &mut Plan,
        task_id: TaskId,
        agent_id: AgentId,
        outcome: ExecOutcome,
        measured_seconds: f64,
        outcomes: &mut BTreeMap<TaskId, TaskOutcome>,
    ) {
        let duration = if outcome.duration_seconds > 0.0 {
            outcome.duration_seconds
        } else {
            measured_seconds
        };

        if outcome.success {
            if let Some(task) = plan.get_task_mut(&task_id) {
                task.complete(outcome.data.clone());
            }
            self.registry.release(&agent_id, task_id, true, duration).await;
            outcomes.insert(
                task_id,
                TaskOutcome {
                    success: true,
                    data: Some(outcome.data),
                    error: None,
                    duration_seconds: duration,
                },
            );
            clog_debug!("{}: {} completed in {:.2}s", plan.id, task_id, duration);
            self.emit_task(plan, task_id, duration, None);
        } else {
            let message = outcome
                .error_message
                .unwrap_or_else(|| "executor reported failure".to_string());
            if let Some(task) = plan.get_task_mut(&task_id) {
                task.fail(FailureReason::Executor {
                    message: message.clone(),
                });
            }
            self.registry
                .release(&agent_id, task_id, false, duration)
                .await;
            outcomes.insert(
                task_id,
                TaskOutcome {
                    success: false,
                    data: None,
                    error: Some(message.clone()),
                    duration_seconds: duration,
                },
            );
            clog_warn!("{}: {} failed: {}", plan.id, task_id, message);
            self.emit_task(plan, task_id, duration, Some(message));
        }
    }

    /// Fail a task that never produced an executor outcome (scheduling
    /// failures, deadline, cascades).
    fn fail_task(
        &self,
        plan: &mut Plan,
        task_id: TaskId,
        reason: FailureReason,
        outcomes: &mut BTreeMap<TaskId, TaskOutcome>,
    ) {
        let transitioned = plan
            .get_task_mut(&task_id)
            .map(|task| task.fail(reason.clone()))
            .unwrap_or(false);
        if !transitioned {
            return;
        }

        let error = reason.to_string();
        outcomes.insert(
            task_id,
            TaskOutcome {
                success: false,
                data: None,
                error: Some(error.clone()),
                duration_seconds: 0.0,
            },
        );
        clog_debug!("{}: {} failed: {}", plan.id, task_id, error);
        self.emit_task(plan, task_id, 0.0, Some(error));
    }

    /// Fail every non-terminal task at the plan deadline.
    fn expire(&self, plan: &mut Plan, outcomes: &mut BTreeMap<TaskId, TaskOutcome>) {
        let remaining: Vec<TaskId> = plan
            .tasks()
            .filter(|task| !task.is_finished())
            .map(|task| task.id)
            .collect();
        for task_id in remaining {
            self.fail_task(plan, task_id, FailureReason::PlanTimeout, outcomes);
        }
    }

    /// Sleep one poll interval, clipped to the plan deadline.
    async fn backoff(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = remaining.min(self.config.poll_interval());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    fn emit_task(
        &self,
        plan: &Plan,
        task_id: TaskId,
        duration_seconds: f64,
        error: Option<String>,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Some(task) = plan.get_task(&task_id) else {
            return;
        };
        sink.on_event(OrchestratorEvent::Task {
            plan_id: plan.id,
            task_id,
            kind: task.kind,
            status: task.status.clone(),
            duration_seconds,
            error,
        });
    }

    /// Assemble the report, emit the plan event, and archive the run.
    async fn finish(
        &self,
        plan: Plan,
        started: Instant,
        halt: Option<Halt>,
        outcomes: BTreeMap<TaskId, TaskOutcome>,
    ) -> ExecutionReport {
        let completed: Vec<TaskId> = plan
            .tasks()
            .filter(|task| task.is_completed())
            .map(|task| task.id)
            .collect();
        let failed: Vec<TaskId> = plan
            .tasks()
            .filter(|task| task.failure().is_some())
            .map(|task| task.id)
            .collect();

        let total = plan.task_count();
        let success_rate = if total == 0 {
            0.0
        } else {
            completed.len() as f64 / total as f64
        };
        let duration_seconds = started.elapsed().as_secs_f64();

        let report = ExecutionReport {
            plan_id: plan.id,
            success: success_rate > 0.5,
            success_rate,
            completed,
            failed,
            outcomes,
            duration_seconds,
            halt,
        };

        clog!(
            "{} finished: {}/{} completed, success_rate {:.2}, {:.2}s",
            plan.id,
            report.completed.len(),
            total,
            report.success_rate,
            duration_seconds
        );

        if let Some(sink) = &self.sink {
            sink.on_event(OrchestratorEvent::Plan {
                plan_id: plan.id,
                success: report.success,
                completed: report.completed.len(),
                failed: report.failed.len(),
                duration_seconds,
            });
        }

        let record = PlanRecord {
            summary: plan.summary(),
            report: report.clone(),
        };
        self.records.write().await.insert(plan.id, record);

        report
    }

    /// Look up an archived plan by id.
    pub async fn plan_status(&self, id: &PlanId) -> Option<PlanRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Number of plans this orchestrator has executed.
    pub async fn plans_executed(&self) -> usize {
        self.records.read().await.len()
    }

    /// Aggregate snapshot of the orchestrator and its registry.
    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            id: self.id,
            agents: self.registry.snapshot().await,
            plans_executed: self.plans_executed().await,
            routing: self.builder.classifier().stats(),
        }
    }
}
