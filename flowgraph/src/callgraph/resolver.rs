//! Three-tier child workflow resolution
//!
//! Each tier is a plain function over a [`ResolutionContext`]; [`RESOLUTION_TIERS`]
//! lists them in the order they are tried and the first hit wins.

use crate::common::{Deadline, DeadlineExceeded};
use crate::workflow::{
    ChildCallFact, IndexError, SourceFile, WorkflowDefinition, WorkflowIndex, WorkflowName,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building a call graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// No resolution tier found the child workflow
    #[error("Child workflow '{attempted_name}' called by '{referenced_by}' at line {line} was not found (searched {} location(s))", .searched_locations.len())]
    ChildWorkflowNotFound {
        /// Name as referenced at the call site
        attempted_name: WorkflowName,
        /// The calling workflow
        referenced_by: WorkflowName,
        /// Line of the call
        line: usize,
        /// Every location the tiers examined, in order
        searched_locations: Vec<PathBuf>,
    },

    /// A workflow is its own ancestor
    #[error("Circular workflow dependency: {}", format_chain(.full_chain))]
    CircularWorkflow {
        /// Root-to-repeat chain; the repeated workflow appears at both ends of the cycle
        full_chain: Vec<WorkflowName>,
    },

    /// Locating or parsing a workflow failed
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The analysis deadline passed before a filesystem search
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

fn format_chain(chain: &[WorkflowName]) -> String {
    chain
        .iter()
        .map(WorkflowName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Which strategy resolved a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// Defined in the caller's own file
    SameScope,
    /// Bound by one of the caller's imports
    ImportTracked,
    /// Found by searching the search root
    FilesystemSearch,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SameScope => "same-scope",
            Self::ImportTracked => "import",
            Self::FilesystemSearch => "filesystem search",
        };
        f.write_str(label)
    }
}

/// Everything a tier may consult while resolving a call from one parent
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// The workflow index
    pub index: &'a WorkflowIndex,
    /// The parent's source file
    pub scope: &'a SourceFile,
    /// Overall analysis deadline
    pub deadline: &'a Deadline,
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolved definition
    pub definition: Arc<WorkflowDefinition>,
    /// The tier that found it
    pub tier: ResolutionTier,
}

type TierFn = fn(
    &ResolutionContext<'_>,
    &WorkflowName,
    &mut Vec<PathBuf>,
) -> GraphResult<Option<Arc<WorkflowDefinition>>>;

/// Resolution strategies in the order they are tried
pub const RESOLUTION_TIERS: [(ResolutionTier, TierFn); 3] = [
    (ResolutionTier::SameScope, resolve_same_scope),
    (ResolutionTier::ImportTracked, resolve_import),
    (ResolutionTier::FilesystemSearch, resolve_by_search),
];

/// Tier 1: a workflow of the same name in the caller's file
pub fn resolve_same_scope(
    ctx: &ResolutionContext<'_>,
    name: &WorkflowName,
    searched: &mut Vec<PathBuf>,
) -> GraphResult<Option<Arc<WorkflowDefinition>>> {
    searched.push(ctx.scope.path.clone());
    Ok(ctx.scope.find(name))
}

/// Tier 2: the caller's import bindings
///
/// An import whose alias is the referenced name resolves to the workflow of that name
/// in the target file, or to the target's only workflow. Failing that, the other
/// imported files are checked for a workflow of that name. A missing import target is
/// a miss, not an error.
pub fn resolve_import(
    ctx: &ResolutionContext<'_>,
    name: &WorkflowName,
    searched: &mut Vec<PathBuf>,
) -> GraphResult<Option<Arc<WorkflowDefinition>>> {
    if let Some(target) = ctx.scope.import_path(name.as_str()) {
        if let Some(file) = load_import(ctx.index, target, searched)? {
            if let Some(found) = file.find(name).or_else(|| file.sole()) {
                return Ok(Some(found));
            }
        }
    }

    for (alias, target) in &ctx.scope.imports {
        if alias == name.as_str() {
            continue;
        }
        if let Some(file) = load_import(ctx.index, target, searched)? {
            if let Some(found) = file.find(name) {
                return Ok(Some(found));
            }
        }
    }

    Ok(None)
}

fn load_import(
    index: &WorkflowIndex,
    target: &Path,
    searched: &mut Vec<PathBuf>,
) -> GraphResult<Option<Arc<SourceFile>>> {
    searched.push(target.to_path_buf());
    match index.load_file(target) {
        Ok(file) => Ok(Some(file)),
        Err(IndexError::Read { path, source }) => {
            tracing::warn!("Import target {} could not be read: {}", path.display(), source);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Tier 3: the index cache, then a bounded search of the search root
pub fn resolve_by_search(
    ctx: &ResolutionContext<'_>,
    name: &WorkflowName,
    searched: &mut Vec<PathBuf>,
) -> GraphResult<Option<Arc<WorkflowDefinition>>> {
    if let Some(cached) = ctx.index.cached(name) {
        tracing::debug!("'{}' already indexed from {}", name, cached.location);
        return Ok(Some(cached));
    }

    ctx.deadline.check("filesystem search")?;
    Ok(ctx.index.search(name, searched)?)
}

/// Resolve one call by trying every tier in order
pub fn resolve_child(
    ctx: &ResolutionContext<'_>,
    call: &ChildCallFact,
    referenced_by: &WorkflowName,
) -> GraphResult<Resolution> {
    let mut searched = Vec::new();

    for (tier, resolve) in RESOLUTION_TIERS.iter() {
        if let Some(definition) = resolve(ctx, &call.child, &mut searched)? {
            tracing::debug!(
                "Resolved '{}' from '{}' via {} tier",
                call.child,
                referenced_by,
                tier
            );
            return Ok(Resolution {
                definition,
                tier: *tier,
            });
        }
        tracing::trace!("'{}' missed the {} tier", call.child, tier);
    }

    Err(GraphError::ChildWorkflowNotFound {
        attempted_name: call.child.clone(),
        referenced_by: referenced_by.clone(),
        line: call.line,
        searched_locations: searched,
    })
}
