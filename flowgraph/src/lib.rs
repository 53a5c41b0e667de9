//! # flowgraph
//!
//! Call graph resolution and execution path expansion for workflows written as
//! Mermaid state diagrams.
//!
//! ## Features
//!
//! - **Workflow Index**: Locate and parse workflow definitions on demand, with
//!   per-file import tracking
//! - **Call Graph Resolver**: Three-tier child workflow resolution with cycle
//!   detection and depth bounding
//! - **Path Enumeration**: Deterministic branch combinations for each workflow
//! - **Path Expansion**: Reference, inline and subgraph expansion across the call
//!   graph with a path-count ceiling
//! - **Rendering**: Mermaid and JSON output of the expanded paths
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgraph::{Config, ExpansionMode, WorkflowAnalyzer, WorkflowName};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default()
//!     .with_search_root("./workflows")
//!     .with_mode(ExpansionMode::Inline);
//!
//! let analyzer = WorkflowAnalyzer::new(config)?;
//! let report = analyzer.analyze(&WorkflowName::new("deploy"))?;
//!
//! println!("{}", report.diagram);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Call graph construction and child workflow resolution
pub mod callgraph;

/// Shared utilities (environment loading, deadlines)
pub mod common;

/// Configuration loading from defaults, environment and YAML
pub mod config;

/// Directory traversal utilities
pub mod directory_utils;

/// Error types used throughout the library
pub mod error;

/// Per-workflow path enumeration and cross-workflow expansion
pub mod paths;

/// Diagram and JSON rendering of expanded paths
pub mod render;

/// Workflow definitions, parsing and the workflow index
pub mod workflow;

mod analyzer;

#[cfg(test)]
mod test_helpers;

pub use analyzer::{AnalysisReport, WorkflowAnalyzer};
pub use callgraph::{
    CallEdge, CallGraphBuilder, CallGraphNode, EdgeTarget, GraphError, NodeId, ResolutionTier,
    WorkflowCallGraph,
};
pub use config::{Config, MissingChildPolicy};
pub use common::{Deadline, DeadlineExceeded};
pub use error::{ErrorChainExt, ErrorContext, FlowgraphError, Result};
pub use paths::{
    check_path_ceiling, expand, path_count, ChildStatus, ExpandedPath, ExpansionError,
    ExpansionMode, LocalPath, LocalPathEnumerator, LocalPathTable, NestedRegion, PathExpander,
    PathId, PathSegment, TransitionKind, TransitionMarker,
};
pub use render::{JsonRenderer, MermaidRenderer, PathRenderer, RenderError, RenderFormat};
pub use workflow::{
    ChildCallFact, IndexOptions, ReferenceKind, WorkflowDefinition, WorkflowIndex, WorkflowName,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AnalysisReport, Config, ExpandedPath, ExpansionMode, FlowgraphError, Result,
        WorkflowAnalyzer, WorkflowCallGraph, WorkflowIndex, WorkflowName,
    };
}
