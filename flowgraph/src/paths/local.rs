//! Per-workflow local path enumeration
//!
//! A workflow with `n` binary decisions has exactly `2^n` local paths. Paths are
//! numbered by binary counting over the decisions in source order: the first decision
//! is the most significant bit and a clear bit means the `true` branch, so ordinal 0
//! takes every `true` branch and the last ordinal takes every `false` branch.

use crate::callgraph::WorkflowCallGraph;
use crate::paths::expander::check_path_ceiling;
use crate::paths::{ExpansionError, ExpansionMode, ExpansionResult};
use crate::workflow::{StateId, WorkflowDefinition, WorkflowName};
use serde::Serialize;
use std::collections::HashMap;

/// The branch taken at one decision point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BranchDecision {
    /// The deciding state
    pub state: StateId,
    /// `true` for the first outgoing transition
    pub taken: bool,
}

/// One execution through a single workflow, ignoring its children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocalPath {
    /// The workflow this path runs through
    pub workflow: WorkflowName,
    /// Position in the enumeration order
    pub ordinal: u64,
    /// One entry per decision point, in source order
    pub decisions: Vec<BranchDecision>,
}

impl LocalPath {
    /// Identifier such as `deploy[TF]`
    pub fn id(&self) -> String {
        let branches: String = self
            .decisions
            .iter()
            .map(|d| if d.taken { 'T' } else { 'F' })
            .collect();
        format!("{}[{}]", self.workflow, branches)
    }
}

/// Number of local paths of `definition`, saturating at `u128::MAX`
pub fn local_path_count(definition: &WorkflowDefinition) -> u128 {
    let n = definition.decision_count();
    if n >= 128 {
        u128::MAX
    } else {
        1u128 << n
    }
}

/// Enumerates local paths, refusing workflows whose count exceeds a ceiling
#[derive(Debug, Clone, Copy)]
pub struct LocalPathEnumerator {
    limit: u64,
}

impl LocalPathEnumerator {
    /// Create an enumerator with a per-workflow ceiling
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    /// All local paths of `definition` in enumeration order
    ///
    /// The count is checked against the ceiling before anything is allocated.
    pub fn enumerate(&self, definition: &WorkflowDefinition) -> ExpansionResult<Vec<LocalPath>> {
        let count = local_path_count(definition);
        if count > u128::from(self.limit) {
            return Err(ExpansionError::PathExplosion {
                computed_total: count,
                limit: self.limit,
            });
        }

        let n = definition.decision_count();
        // count <= limit <= u64::MAX
        let paths = (0..count as u64)
            .map(|ordinal| LocalPath {
                workflow: definition.name.clone(),
                ordinal,
                decisions: definition
                    .decisions
                    .iter()
                    .enumerate()
                    .map(|(i, decision)| BranchDecision {
                        state: decision.state.clone(),
                        taken: (ordinal >> (n - 1 - i)) & 1 == 0,
                    })
                    .collect(),
            })
            .collect();

        Ok(paths)
    }
}

/// Local paths per workflow for one analysis run
#[derive(Debug, Clone, Default)]
pub struct LocalPathTable {
    paths: HashMap<WorkflowName, Vec<LocalPath>>,
}

impl LocalPathTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate the workflows `mode` needs: every node for inline expansion, only the
    /// root otherwise
    ///
    /// The total for `mode` is checked first, so an oversized product is reported as
    /// the whole product rather than as the first oversized workflow.
    pub fn for_graph(
        graph: &WorkflowCallGraph,
        mode: ExpansionMode,
        limit: u64,
    ) -> ExpansionResult<Self> {
        check_path_ceiling(graph, mode, limit)?;
        let enumerator = LocalPathEnumerator::new(limit);
        let mut table = Self::new();

        let nodes = if mode.walks_children() {
            graph.nodes()
        } else {
            std::slice::from_ref(graph.root())
        };

        for node in nodes {
            let paths = enumerator.enumerate(&node.definition)?;
            table.insert(node.name().clone(), paths);
        }
        Ok(table)
    }

    /// Add or replace the paths of one workflow
    pub fn insert(&mut self, workflow: WorkflowName, paths: Vec<LocalPath>) {
        self.paths.insert(workflow, paths);
    }

    /// Paths of a workflow
    pub fn get(&self, workflow: &WorkflowName) -> Option<&[LocalPath]> {
        self.paths.get(workflow).map(Vec::as_slice)
    }

    /// Number of workflows in the table
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
