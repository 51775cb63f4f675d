//! agentpipe library.
//!
//! Exposes the approval gate, the agent driver and the run flow so the
//! binaries and the integration tests share one implementation.

pub mod approval;
pub mod audit;
pub mod cli;
pub mod config;
pub mod driver;
pub mod utils;
