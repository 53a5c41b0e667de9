//! Shared fixtures for unit tests
//!
//! Workflows are generated as markdown sources so tests exercise the same parsing
//! path as real files.

use crate::callgraph::{CallGraphBuilder, WorkflowCallGraph};
use crate::config::MissingChildPolicy;
use crate::workflow::{
    ChildCallFact, DecisionPoint, IndexOptions, ReferenceKind, SourceLocation, StateId,
    WorkflowDefinition, WorkflowIndex, WorkflowName,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Markdown source for a workflow with `decisions` choice states followed by one
/// state per entry of `calls`, each running that child workflow.
pub fn workflow_source(name: &str, decisions: usize, calls: &[&str]) -> String {
    let mut diagram = vec!["stateDiagram-v2".to_string()];
    let mut previous = "[*]".to_string();

    for i in 1..=decisions {
        diagram.push(format!("    state D{i} <<choice>>"));
        diagram.push(format!("    {previous} --> D{i}"));
        diagram.push(format!("    D{i} --> Y{i}"));
        diagram.push(format!("    D{i} --> N{i}"));
        diagram.push(format!("    Y{i} --> J{i}"));
        diagram.push(format!("    N{i} --> J{i}"));
        previous = format!("J{i}");
    }
    for i in 1..=calls.len() {
        diagram.push(format!("    {previous} --> C{i}"));
        previous = format!("C{i}");
    }
    diagram.push(format!("    {previous} --> [*]"));

    let actions: Vec<String> = calls
        .iter()
        .enumerate()
        .map(|(i, child)| format!("- C{}: Run workflow \"{}\"", i + 1, child))
        .collect();

    format!(
        "---\nname: {name}\ndescription: Test workflow {name}\n---\n\n```mermaid\n{}\n```\n\n## Actions\n\n{}\n",
        diagram.join("\n"),
        actions.join("\n")
    )
}

/// In-memory definition with decisions on lines 1..=n and calls after them
pub fn definition(name: &str, decisions: usize, calls: &[&str]) -> WorkflowDefinition {
    WorkflowDefinition {
        name: WorkflowName::new(name),
        description: String::new(),
        location: SourceLocation {
            path: PathBuf::from(format!("{name}.md")),
            line: 1,
        },
        decisions: (1..=decisions)
            .map(|line| DecisionPoint {
                state: StateId::new(format!("D{line}")),
                line,
                true_branch: None,
                false_branch: None,
            })
            .collect(),
        calls: calls
            .iter()
            .enumerate()
            .map(|(i, child)| {
                ChildCallFact::new(
                    WorkflowName::new(*child),
                    ReferenceKind::StringLiteral,
                    decisions + i + 1,
                    StateId::new(format!("C{}", i + 1)),
                )
            })
            .collect(),
    }
}

/// A temporary directory of workflow files
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dirs");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    /// Write `<name>.md` generated by [`workflow_source`]
    pub fn workflow(&self, name: &str, decisions: usize, calls: &[&str]) -> PathBuf {
        self.write(&format!("{name}.md"), &workflow_source(name, decisions, calls))
    }

    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            search_root: self.dir.path().to_path_buf(),
            ..IndexOptions::default()
        }
    }

    pub fn index(&self) -> WorkflowIndex {
        WorkflowIndex::new(self.options())
    }

    /// Build the call graph of `root` with the given depth ceiling
    pub fn graph(&self, root: &str, max_depth: usize) -> WorkflowCallGraph {
        let index = self.index();
        CallGraphBuilder::new(&index, max_depth, MissingChildPolicy::Fail)
            .build_graph(&WorkflowName::new(root))
            .expect("build call graph")
    }
}
