//! End-to-end analysis of one root workflow
//!
//! Runs index, resolver, enumerator, expander and renderer in order. Nothing
//! partial is returned: the first failing stage ends the run.

use crate::callgraph::{CallGraphBuilder, WorkflowCallGraph};
use crate::common::Deadline;
use crate::config::Config;
use crate::error::Result;
use crate::paths::{ExpandedPath, ExpansionMode, LocalPathTable, PathExpander};
use crate::render::{PathRenderer, RenderFormat};
use crate::workflow::{IndexOptions, WorkflowIndex, WorkflowName};

/// Everything one analysis produced
#[derive(Debug)]
pub struct AnalysisReport {
    /// The resolved call graph
    pub graph: WorkflowCallGraph,
    /// Local paths of the workflows the mode needed
    pub local_paths: LocalPathTable,
    /// Expanded end-to-end paths, in deterministic order
    pub paths: Vec<ExpandedPath>,
    /// The rendered diagram
    pub diagram: String,
    /// Mode the paths were expanded in
    pub mode: ExpansionMode,
}

/// Analyzes workflows under one search root
///
/// The index is kept between calls, so analyzing several roots parses shared
/// files once.
pub struct WorkflowAnalyzer {
    config: Config,
    index: WorkflowIndex,
    renderer: Box<dyn PathRenderer>,
}

impl std::fmt::Debug for WorkflowAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowAnalyzer")
            .field("config", &self.config)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl WorkflowAnalyzer {
    /// Create an analyzer rendering Mermaid, after validating `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let index = WorkflowIndex::new(IndexOptions::from(&config));
        Ok(Self {
            config,
            index,
            renderer: RenderFormat::Mermaid.renderer(),
        })
    }

    /// Replace the renderer
    pub fn with_renderer(mut self, renderer: Box<dyn PathRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// The configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The workflow index backing resolution
    pub fn index(&self) -> &WorkflowIndex {
        &self.index
    }

    /// Resolve the call graph of `root` without expanding paths
    pub fn build_graph(&self, root: &WorkflowName) -> Result<WorkflowCallGraph> {
        let deadline = Deadline::from_budget(self.config.deadline);
        self.graph_with_deadline(root, deadline)
    }

    fn graph_with_deadline(&self, root: &WorkflowName, deadline: Deadline) -> Result<WorkflowCallGraph> {
        let graph = CallGraphBuilder::new(&self.index, self.config.max_depth, self.config.on_missing_child)
            .with_deadline(deadline)
            .build_graph(root)?;
        Ok(graph)
    }

    /// Analyze `root`: resolve, enumerate, expand and render
    pub fn analyze(&self, root: &WorkflowName) -> Result<AnalysisReport> {
        let deadline = Deadline::from_budget(self.config.deadline);
        let mode = self.config.mode;
        tracing::info!("Analyzing '{}' in {} mode", root, mode);

        let graph = self.graph_with_deadline(root, deadline)?;
        deadline.check("local path enumeration")?;

        let local_paths = LocalPathTable::for_graph(&graph, mode, self.config.max_paths)?;
        tracing::debug!("Enumerated local paths for {} workflow(s)", local_paths.len());

        let paths = PathExpander::new(&graph, &local_paths, self.config.max_paths)
            .with_deadline(deadline)
            .expand(mode)?;

        deadline.check("rendering")?;
        let diagram = self.renderer.render(&graph, &paths, mode)?;

        tracing::info!(
            "Analysis of '{}' finished: {} node(s), {} path(s) in {:?}",
            root,
            graph.node_count(),
            paths.len(),
            deadline.elapsed()
        );

        Ok(AnalysisReport {
            graph,
            local_paths,
            paths,
            diagram,
            mode,
        })
    }
}
