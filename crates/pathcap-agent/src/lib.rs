//! pathcap agent library.
//!
//! Re-exports configuration, the collaborator traits, the controller client
//! and the run loop so they can be driven by integration tests with in-memory
//! collaborators.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod run;
pub mod sources;
