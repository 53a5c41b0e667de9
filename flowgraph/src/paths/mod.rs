//! Path enumeration and expansion
//!
//! [`LocalPathEnumerator`] produces the branch combinations of a single workflow;
//! [`PathExpander`] combines them across the call graph.

mod expander;
mod local;
mod types;

pub use expander::{
    check_path_ceiling, expand, path_count, ExpansionError, ExpansionResult, PathExpander,
};
pub use local::{
    local_path_count, BranchDecision, LocalPath, LocalPathEnumerator, LocalPathTable,
};
pub use types::{
    ChildStatus, ExpandedPath, ExpansionMode, NestedRegion, PathId, PathSegment, TransitionKind,
    TransitionMarker,
};
