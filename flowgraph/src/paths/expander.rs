//! Cross-workflow path expansion
//!
//! Combines the root's local paths with its children's according to an
//! [`ExpansionMode`]. The path count is computed and checked against the ceiling
//! before any expanded path is built.

use crate::callgraph::{CallEdge, EdgeTarget, NodeId, WorkflowCallGraph};
use crate::common::{Deadline, DeadlineExceeded};
use crate::paths::local::local_path_count;
use crate::paths::{
    ChildStatus, ExpandedPath, ExpansionMode, LocalPath, LocalPathTable, NestedRegion, PathId,
    PathSegment, TransitionKind, TransitionMarker,
};
use crate::workflow::WorkflowName;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised during path expansion
#[derive(Debug, Error)]
pub enum ExpansionError {
    /// The path count exceeds the configured ceiling
    #[error("Path explosion: expansion would produce {computed_total} paths, limit is {limit}")]
    PathExplosion {
        /// The computed path count (saturating)
        computed_total: u128,
        /// The configured ceiling
        limit: u64,
    },

    /// A workflow the mode needs has no local paths in the table
    #[error("No local paths were enumerated for workflow '{0}'")]
    MissingLocalPaths(WorkflowName),

    /// The analysis deadline passed before expansion
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

/// Result type for expansion operations
pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// The inline expansion of one node: its own segment, then its children's
#[derive(Debug, Clone)]
struct Fragment {
    id: String,
    segments: Vec<PathSegment>,
    transitions: Vec<TransitionMarker>,
}

fn edge_status(edge: &CallEdge) -> ChildStatus {
    match edge.target {
        EdgeTarget::Resolved(_) => ChildStatus::Resolved,
        EdgeTarget::Unexpanded => ChildStatus::Unexpanded,
        EdgeTarget::Unresolved { .. } => ChildStatus::Unresolved,
    }
}

/// Expands a call graph into end-to-end paths
#[derive(Debug)]
pub struct PathExpander<'a> {
    graph: &'a WorkflowCallGraph,
    local_paths: &'a LocalPathTable,
    max_paths: u64,
    deadline: Deadline,
}

impl<'a> PathExpander<'a> {
    /// Create an expander with a path-count ceiling
    pub fn new(graph: &'a WorkflowCallGraph, local_paths: &'a LocalPathTable, max_paths: u64) -> Self {
        Self {
            graph,
            local_paths,
            max_paths,
            deadline: Deadline::none(),
        }
    }

    /// Check `deadline` before materializing
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Number of paths `mode` would produce, saturating at `u128::MAX`
    pub fn count(&self, mode: ExpansionMode) -> u128 {
        path_count(self.graph, mode)
    }

    /// Expand every path for `mode`
    ///
    /// Paths are ordered root path first, then child combinations with the first
    /// call site varying slowest. Nothing is built when the count exceeds the ceiling.
    pub fn expand(&self, mode: ExpansionMode) -> ExpansionResult<Vec<ExpandedPath>> {
        check_path_ceiling(self.graph, mode, self.max_paths)?;
        self.deadline.check("path expansion")?;

        let paths = match mode {
            ExpansionMode::Reference => self.expand_flat(false)?,
            ExpansionMode::Subgraph => self.expand_flat(true)?,
            ExpansionMode::Inline => {
                let mut memo = HashMap::new();
                self.fragments(self.graph.root_id(), &mut memo)?
                    .iter()
                    .map(|fragment| ExpandedPath {
                        id: PathId::new(fragment.id.clone()),
                        segments: fragment.segments.clone(),
                        transitions: fragment.transitions.clone(),
                    })
                    .collect()
            }
        };

        tracing::info!("Expanded {} path(s) in {} mode", paths.len(), mode);
        Ok(paths)
    }

    fn paths_of(&self, workflow: &WorkflowName) -> ExpansionResult<&'a [LocalPath]> {
        self.local_paths
            .get(workflow)
            .ok_or_else(|| ExpansionError::MissingLocalPaths(workflow.clone()))
    }

    /// Reference and subgraph modes: one path per root local path
    fn expand_flat(&self, nested: bool) -> ExpansionResult<Vec<ExpandedPath>> {
        let root = self.graph.root();
        let local = self.paths_of(root.name())?;

        let transitions: Vec<TransitionMarker> = root
            .edges
            .iter()
            .map(|edge| {
                let kind = match edge.target {
                    EdgeTarget::Resolved(child) if nested => TransitionKind::Subgraph {
                        region: self.region(edge, Some(child)),
                    },
                    _ => TransitionKind::Reference {
                        status: edge_status(edge),
                    },
                };
                TransitionMarker {
                    position: root.definition.position_of_line(edge.call.line),
                    parent_segment: 0,
                    parent: root.name().clone(),
                    child: edge.call.child.clone(),
                    call_site: edge.call.call_site.clone(),
                    kind,
                }
            })
            .collect();

        Ok(local
            .iter()
            .map(|path| ExpandedPath {
                id: PathId::new(path.id()),
                segments: vec![PathSegment {
                    workflow: root.name().clone(),
                    local_path: path.clone(),
                }],
                transitions: transitions.clone(),
            })
            .collect())
    }

    fn region(&self, edge: &CallEdge, target: Option<NodeId>) -> NestedRegion {
        let status = edge_status(edge);
        match target {
            Some(id) => {
                let node = self.graph.node(id);
                NestedRegion {
                    workflow: node.name().clone(),
                    call_site: edge.call.call_site.clone(),
                    status,
                    local_path_count: Some(
                        u64::try_from(local_path_count(&node.definition)).unwrap_or(u64::MAX),
                    ),
                    decision_states: node
                        .definition
                        .decisions
                        .iter()
                        .map(|d| d.state.clone())
                        .collect(),
                    children: node
                        .edges
                        .iter()
                        .map(|child| self.region(child, child.resolved()))
                        .collect(),
                }
            }
            None => NestedRegion {
                workflow: edge.call.child.clone(),
                call_site: edge.call.call_site.clone(),
                status,
                local_path_count: None,
                decision_states: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    /// Inline fragments of a node, memoized per node
    fn fragments(
        &self,
        id: NodeId,
        memo: &mut HashMap<NodeId, Rc<Vec<Fragment>>>,
    ) -> ExpansionResult<Rc<Vec<Fragment>>> {
        if let Some(done) = memo.get(&id) {
            return Ok(Rc::clone(done));
        }

        let node = self.graph.node(id);
        let local = self.paths_of(node.name())?;

        let mut child_fragments: Vec<Rc<Vec<Fragment>>> = Vec::new();
        for child in node.children() {
            child_fragments.push(self.fragments(child, memo)?);
        }

        let mut result = Vec::new();
        for path in local {
            let mut choice = vec![0usize; child_fragments.len()];
            loop {
                result.push(self.combine(node.id, path, &child_fragments, &choice));
                if !advance(&mut choice, &child_fragments) {
                    break;
                }
            }
        }

        let result = Rc::new(result);
        memo.insert(id, Rc::clone(&result));
        Ok(result)
    }

    /// One fragment: the node's local path followed by the chosen child fragments
    fn combine(
        &self,
        id: NodeId,
        path: &LocalPath,
        child_fragments: &[Rc<Vec<Fragment>>],
        choice: &[usize],
    ) -> Fragment {
        let node = self.graph.node(id);
        let mut segments = vec![PathSegment {
            workflow: node.name().clone(),
            local_path: path.clone(),
        }];
        let mut transitions = Vec::new();
        let mut nested = Vec::new();
        let mut resolved_index = 0;

        for edge in &node.edges {
            let position = node.definition.position_of_line(edge.call.line);
            let marker = |kind| TransitionMarker {
                position,
                parent_segment: 0,
                parent: node.name().clone(),
                child: edge.call.child.clone(),
                call_site: edge.call.call_site.clone(),
                kind,
            };

            if edge.resolved().is_none() {
                transitions.push(marker(TransitionKind::Reference {
                    status: edge_status(edge),
                }));
                continue;
            }

            let fragment = &child_fragments[resolved_index][choice[resolved_index]];
            resolved_index += 1;

            let offset = segments.len();
            transitions.push(marker(TransitionKind::Inline {
                first_segment: offset,
                segment_count: fragment.segments.len(),
            }));
            transitions.extend(
                fragment
                    .transitions
                    .iter()
                    .cloned()
                    .map(|child_marker| child_marker.shift(offset)),
            );
            segments.extend(fragment.segments.iter().cloned());
            nested.push(fragment.id.as_str());
        }

        let id = if nested.is_empty() {
            path.id()
        } else {
            format!("{}{{{}}}", path.id(), nested.join(","))
        };

        Fragment {
            id,
            segments,
            transitions,
        }
    }
}

/// Odometer step over child fragment choices, last call site fastest
fn advance(choice: &mut [usize], child_fragments: &[Rc<Vec<Fragment>>]) -> bool {
    for slot in (0..choice.len()).rev() {
        choice[slot] += 1;
        if choice[slot] < child_fragments[slot].len() {
            return true;
        }
        choice[slot] = 0;
    }
    false
}

/// Number of paths `mode` would produce for `graph`, saturating at `u128::MAX`
///
/// Needs only the workflow definitions, so it can run before any local path exists.
pub fn path_count(graph: &WorkflowCallGraph, mode: ExpansionMode) -> u128 {
    match mode {
        ExpansionMode::Reference | ExpansionMode::Subgraph => {
            local_path_count(&graph.root().definition)
        }
        ExpansionMode::Inline => inline_count(graph, graph.root_id(), &mut HashMap::new()),
    }
}

fn inline_count(graph: &WorkflowCallGraph, id: NodeId, memo: &mut HashMap<NodeId, u128>) -> u128 {
    if let Some(&count) = memo.get(&id) {
        return count;
    }
    let node = graph.node(id);
    let count = node
        .children()
        .fold(local_path_count(&node.definition), |total, child| {
            total.saturating_mul(inline_count(graph, child, memo))
        });
    memo.insert(id, count);
    count
}

/// Fail with [`ExpansionError::PathExplosion`] when `mode` would exceed `max_paths`
pub fn check_path_ceiling(
    graph: &WorkflowCallGraph,
    mode: ExpansionMode,
    max_paths: u64,
) -> ExpansionResult<u128> {
    let total = path_count(graph, mode);
    if total > u128::from(max_paths) {
        tracing::warn!(
            "{} expansion of '{}' would produce {} paths (limit {})",
            mode,
            graph.root().name(),
            total,
            max_paths
        );
        return Err(ExpansionError::PathExplosion {
            computed_total: total,
            limit: max_paths,
        });
    }
    Ok(total)
}

/// Expand `graph` in one call: count, check the ceiling, materialize
pub fn expand(
    graph: &WorkflowCallGraph,
    local_paths: &LocalPathTable,
    mode: ExpansionMode,
    max_paths: u64,
) -> ExpansionResult<Vec<ExpandedPath>> {
    PathExpander::new(graph, local_paths, max_paths).expand(mode)
}
