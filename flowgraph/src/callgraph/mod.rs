//! Call graph construction
//!
//! [`CallGraphBuilder`] walks a root workflow depth first, resolving each child call
//! through the tiers in [`resolver`] and recording the result in an arena-backed
//! [`WorkflowCallGraph`].

mod builder;
pub mod resolver;
mod types;

pub use builder::CallGraphBuilder;
pub use resolver::{
    resolve_child, GraphError, GraphResult, Resolution, ResolutionContext, ResolutionTier,
    RESOLUTION_TIERS,
};
pub use types::{CallEdge, CallGraphNode, EdgeTarget, NodeId, WorkflowCallGraph};
