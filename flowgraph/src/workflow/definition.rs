//! Parsed workflow definitions and the facts extracted from them

use crate::workflow::StateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur when creating workflow-related types
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Workflow name cannot be empty or whitespace only
    #[error("Workflow name cannot be empty or whitespace only")]
    EmptyWorkflowName,
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Unique identifier for workflows
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowName(String);

impl WorkflowName {
    /// Create a new workflow name
    ///
    /// # Panics
    /// Panics if the name is empty or whitespace only. For non-panicking creation,
    /// use `try_new` instead.
    pub fn new(name: impl Into<String>) -> Self {
        Self::try_new(name).expect("Workflow name cannot be empty or whitespace only")
    }

    /// Create a new workflow name, returning an error for invalid input
    pub fn try_new(name: impl Into<String>) -> WorkflowResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::EmptyWorkflowName);
        }
        Ok(Self(name.trim().to_string()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkflowName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a child workflow was named at the call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// A bare identifier: `Run workflow build`
    Identifier,
    /// A quoted string: `Run workflow "build"`
    StringLiteral,
}

/// Stable identity of one call site
///
/// Derived only from the child name and the line, so unchanged source always yields
/// the same identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSiteId(String);

impl CallSiteId {
    /// Derive the identity of a call to `child` on `line`
    pub fn derive(child: &WorkflowName, line: usize) -> Self {
        Self(format!("{}@L{}", child, line))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// "This workflow calls that child" at a given source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCallFact {
    /// Child workflow name as referenced
    pub child: WorkflowName,
    /// Identifier or string literal
    pub kind: ReferenceKind,
    /// 1-based source line of the call
    pub line: usize,
    /// State whose action performs the call
    pub state: StateId,
    /// Deterministic call-site identity
    pub call_site: CallSiteId,
}

impl ChildCallFact {
    /// Create a fact, deriving its call-site identity
    pub fn new(child: WorkflowName, kind: ReferenceKind, line: usize, state: StateId) -> Self {
        let call_site = CallSiteId::derive(&child, line);
        Self {
            child,
            kind,
            line,
            state,
            call_site,
        }
    }
}

/// A binary branch inside a workflow body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPoint {
    /// The branching state
    pub state: StateId,
    /// Line of the state's first appearance
    pub line: usize,
    /// Target of the first outgoing transition
    pub true_branch: Option<StateId>,
    /// Target of the second outgoing transition, when there is one
    pub false_branch: Option<StateId>,
}

/// Where a definition came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Originating file
    pub path: PathBuf,
    /// 1-based line where the definition starts
    pub line: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// One parsed workflow, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name, unique within its file
    pub name: WorkflowName,
    /// Human readable description
    pub description: String,
    /// Originating file location
    pub location: SourceLocation,
    /// Decision points in source order
    pub decisions: Vec<DecisionPoint>,
    /// Child calls in source order
    pub calls: Vec<ChildCallFact>,
}

impl WorkflowDefinition {
    /// Number of binary decision points
    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    /// Step in a local path at which something on `line` happens
    ///
    /// This is the number of decisions whose line precedes `line`.
    pub fn position_of_line(&self, line: usize) -> usize {
        self.decisions.iter().filter(|d| d.line < line).count()
    }
}

/// A parsed source file: its workflows and its import bindings
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    /// Path the file was loaded from
    pub path: PathBuf,
    /// Import alias to target file, paths already joined to the file's directory
    pub imports: BTreeMap<String, PathBuf>,
    /// Workflows in file order
    pub workflows: Vec<Arc<WorkflowDefinition>>,
}

impl SourceFile {
    /// Find a workflow defined in this file
    pub fn find(&self, name: &WorkflowName) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.iter().find(|w| &w.name == name).cloned()
    }

    /// The workflow of a single-workflow file
    pub fn sole(&self) -> Option<Arc<WorkflowDefinition>> {
        match self.workflows.as_slice() {
            [only] => Some(Arc::clone(only)),
            _ => None,
        }
    }

    /// Target file bound to `alias`
    pub fn import_path(&self, alias: &str) -> Option<&Path> {
        self.imports.get(alias).map(PathBuf::as_path)
    }
}
