//! flowgraph CLI library
//!
//! Command definitions and command implementations, exposed for tests.

/// Analyze command: resolve, expand and render one workflow
pub mod analyze;
/// Command-line interface definitions and argument parsing
pub mod cli;
/// CLI error type carrying an exit code
pub mod error;
/// Exit codes used by the CLI application
pub mod exit_codes;
/// Graph command: show the resolved call graph
pub mod graph;
/// List command: show discovered workflows
pub mod list;
