//! Shared types for pathcap.
//!
//! This crate contains:
//! - **Data models**: telemetry samples, capacity estimates, sites, circuits, policy stacks
//! - **Estimator**: percentile-trimmed mean capacity per direction
//! - **Classifier**: per-circuit threshold check and per-site policy choice
//! - **Query**: path-capacity metrics request body and response shape

pub mod classifier;
pub mod estimator;
pub mod models;
pub mod query;
