//! conductor: request decomposition and multi-agent task orchestration.
//!
//! A free-text work request flows through the crate in four steps:
//! classification ([`routing::Classifier`]), decomposition
//! ([`routing::Decomposer`]), plan building ([`routing::PlanBuilder`]),
//! and execution ([`orchestration::Orchestrator`]), which schedules
//! ready tasks onto capable agents from an
//! [`orchestration::AgentRegistry`] and aggregates the outcome into an
//! [`orchestration::ExecutionReport`] even when some tasks fail.

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod routing;

pub use crate::core::plan::{Plan, PlanId, PlanStatus, PlanSummary};
pub use crate::core::task::{FailureReason, Task, TaskId, TaskKind, TaskPriority, TaskStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use orchestration::orchestrator::{ExecutionReport, Halt, Orchestrator};
pub use orchestration::registry::{AgentId, AgentRegistry};
pub use routing::PlanBuilder;
