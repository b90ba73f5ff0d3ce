//! Tandem command-line driver
//!
//! Loads the scheduler configuration and runs the built-in workloads behind
//! the `tandem` binary.

pub mod config;
pub mod scenarios;

pub use config::CliConfig;
pub use scenarios::{Report, Scenario};
