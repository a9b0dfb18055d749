//! Integration test suite for conductor.
//!
//! These tests exercise the full pipeline from request text to
//! execution report: decomposition, classification, plan building,
//! agent selection, concurrent dispatch, and failure aggregation.
//!
//! # Test Categories
//!
//! - `pipeline`: request-to-report flows on the happy path
//! - `failure_paths`: deadlocks, unavailable agents, timeouts, partial failure
//! - `concurrency`: parallel dispatch and shared-registry behavior
//!
//! # CI Compatibility
//!
//! All executors are in-process stubs; no external capability is
//! invoked, so the suite is safe to run anywhere.

mod fixtures;

mod concurrency;
mod failure_paths;
mod pipeline;
