//! Request analysis: classification, decomposition, and plan building.

pub mod classifier;
pub mod decomposer;
pub mod planner;

pub use classifier::{Classification, Classifier, RoutingStats};
pub use decomposer::Decomposer;
pub use planner::PlanBuilder;
