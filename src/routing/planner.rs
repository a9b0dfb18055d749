//! Plan construction from classified request fragments.
//!
//! The `PlanBuilder` turns a free-text request into an executable
//! [`Plan`]: it decomposes compound requests, classifies each fragment
//! independently, chains decomposed fragments with sequential
//! dependencies, and derives the plan's complexity score and
//! parallel-eligible groups.

use crate::clog_debug;
use crate::core::plan::Plan;
use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::routing::classifier::Classifier;
use crate::routing::decomposer::Decomposer;
use serde_json::{Map, Value};

/// Complexity score weight per task in the plan.
const TASK_COUNT_WEIGHT: f64 = 0.2;
/// Complexity score weight per dependency edge.
const DEPENDENCY_WEIGHT: f64 = 0.1;
/// Complexity score weight per estimated second of work.
const DURATION_WEIGHT: f64 = 0.05;
/// Complexity score weight applied to each task kind's own weight.
const KIND_WEIGHT: f64 = 0.1;

/// Builds plans from request text.
pub struct PlanBuilder {
    classifier: Classifier,
    decomposer: Decomposer,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            classifier: Classifier::new(),
            decomposer: Decomposer::new(),
        }
    }

    /// The classifier used for fragment classification.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Build a plan for the request with no executor context.
    pub fn build_plan(&self, request: &str) -> Result<Plan> {
        self.build_plan_with_context(request, &Map::new())
    }

    /// Build a plan for the request.
    ///
    /// The context map is copied into every task's parameter map, which
    /// is how it reaches executors unmodified. Decomposed fragments are
    /// chained so that fragment *i* depends on fragment *i - 1*.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyRequest`] when the request is blank.
    pub fn build_plan_with_context(
        &self,
        request: &str,
        context: &Map<String, Value>,
    ) -> Result<Plan> {
        if request.trim().is_empty() {
            return Err(Error::EmptyRequest);
        }

        let fragments = self.decomposer.decompose(request);
        let mut plan = Plan::new(request);
        let mut previous: Option<TaskId> = None;

        for fragment in &fragments {
            let classification = self.classifier.classify(fragment);
            let task = Task::new(
                classification.kind,
                classification.priority,
                fragment,
                classification.estimated_duration,
            )
            .with_params(context.clone());
            let id = plan.add_task(task);

            if let Some(previous_id) = previous {
                plan.add_dependency(&previous_id, &id)?;
            }
            previous = Some(id);
        }

        plan.complexity = complexity_score(&plan);
        plan.parallel_groups = parallel_groups(&plan);

        clog_debug!(
            "built {}: {} task(s), {} dependencies, complexity {:.2}",
            plan.id,
            plan.task_count(),
            plan.dependency_count(),
            plan.complexity
        );
        Ok(plan)
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted complexity heuristic over task count, dependency count,
/// aggregate duration, and per-kind weights.
fn complexity_score(plan: &Plan) -> f64 {
    let dependency_count: usize = plan.tasks().map(|t| t.dependencies.len()).sum();
    let kind_weight: f64 = plan.tasks().map(|t| t.kind.complexity_weight()).sum();

    plan.task_count() as f64 * TASK_COUNT_WEIGHT
        + dependency_count as f64 * DEPENDENCY_WEIGHT
        + plan.total_estimated_duration() * DURATION_WEIGHT
        + kind_weight * KIND_WEIGHT
}

/// Tasks with no dependencies can be dispatched together. A single
/// independent task is not reported as a group.
fn parallel_groups(plan: &Plan) -> Vec<Vec<TaskId>> {
    let independent: Vec<TaskId> = plan
        .tasks()
        .filter(|t| t.dependencies.is_empty())
        .map(|t| t.id)
        .collect();

    if independent.len() > 1 {
        vec![independent]
    } else {
        Vec::new()
    }
}
