//! Request-to-report flows on the happy path.

use std::sync::Arc;

use serde_json::Map;

use conductor::routing::{Classifier, Decomposer, PlanBuilder};
use conductor::{TaskKind, TaskStatus};

use crate::fixtures::{orchestrator_with, StubExecutor};

/// Scenario: "create a file and then read it"
/// Given a compound file request and two capable agents
/// When the request is submitted
/// Then two sequential file tasks both complete
#[tokio::test]
async fn test_compound_file_request_end_to_end() {
    let (orchestrator, _registry) = orchestrator_with(2, Arc::new(StubExecutor::instant())).await;

    let report = orchestrator
        .submit_request("create a file and then read it", &Map::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.completed.len(), 2);
    assert!(report.failed.is_empty());
    assert!(report.halt.is_none());

    let record = orchestrator.plan_status(&report.plan_id).await.unwrap();
    let tasks = &record.summary.tasks;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].kind, TaskKind::FileOps);
    assert_eq!(tasks[1].kind, TaskKind::FileOps);
    assert_eq!(tasks[1].dependencies, vec![tasks[0].id]);
    assert!(record.summary.parallel_groups.is_empty());
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}

/// PlanBuilder: a three-fragment request yields a strict chain.
#[test]
fn test_three_fragment_chain_dependencies() {
    let builder = PlanBuilder::new();
    let plan = builder
        .build_plan("install the tool then run the tests finally report results")
        .unwrap();

    let ids = plan.task_ids().to_vec();
    assert_eq!(ids.len(), 3);
    assert!(plan.get_task(&ids[0]).unwrap().dependencies.is_empty());
    assert_eq!(plan.get_task(&ids[1]).unwrap().dependencies, vec![ids[0]]);
    assert_eq!(plan.get_task(&ids[2]).unwrap().dependencies, vec![ids[1]]);
    assert!(plan.parallel_groups.is_empty());
}

/// Decomposer round trip: non-compound text passes through unchanged.
#[test]
fn test_decomposer_round_trip() {
    let decomposer = Decomposer::new();

    let single = decomposer.decompose("summarize the document");
    assert_eq!(single, vec!["summarize the document".to_string()]);

    let text = "create a file and then read it";
    let fragments = decomposer.decompose(text);
    assert!(fragments.len() >= 2);
    for fragment in &fragments {
        assert!(!fragment.is_empty());
        assert_eq!(fragment.trim(), fragment);
        assert!(text.contains(fragment.as_str()));
    }
}

/// Classifier determinism across repeated calls.
#[test]
fn test_classifier_repeatable() {
    let classifier = Classifier::new();
    let inputs = [
        "screenshot",
        "create a file and then read it",
        "optimize the build pipeline",
        "unclassifiable gibberish",
    ];
    for input in inputs {
        let first = classifier.classify(input);
        for _ in 0..5 {
            assert_eq!(classifier.classify(input), first);
        }
    }
}

/// Context maps flow through to executors unmodified.
#[tokio::test]
async fn test_context_pass_through() {
    let (orchestrator, _registry) =
        orchestrator_with(1, Arc::new(conductor::orchestration::EchoExecutor)).await;

    let mut context = Map::new();
    context.insert("request_id".to_string(), serde_json::json!(991));

    let report = orchestrator
        .submit_request("create a file", &context)
        .await
        .unwrap();
    assert!(report.success);

    // The echo executor reflects the parameter map it received.
    let outcome = report.outcomes.values().next().unwrap();
    let data = outcome.data.as_ref().unwrap();
    assert_eq!(data["params"]["request_id"], 991);
}

/// Every task in an acyclic plan ends terminal, and the report accounts
/// for all of them.
#[tokio::test]
async fn test_acyclic_plan_terminates_with_all_tasks_terminal() {
    let (orchestrator, _registry) = orchestrator_with(2, Arc::new(StubExecutor::instant())).await;

    let report = orchestrator
        .submit_request(
            "analyze the screen and then implement a parser and then run the tests",
            &Map::new(),
        )
        .await
        .unwrap();

    let record = orchestrator.plan_status(&report.plan_id).await.unwrap();
    let total = record.summary.tasks.len();
    assert_eq!(report.completed.len() + report.failed.len(), total);
    assert_eq!(report.outcomes.len(), total);
}
