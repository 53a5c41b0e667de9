//! Rendering of expanded paths
//!
//! A [`PathRenderer`] turns the final path set into a diagram artifact. Two are
//! provided: [`MermaidRenderer`] draws each path as a composite state of a
//! `stateDiagram-v2`, [`JsonRenderer`] emits the graph and paths as JSON.

use crate::callgraph::WorkflowCallGraph;
use crate::config::ConfigError;
use crate::paths::{ChildStatus, ExpandedPath, ExpansionMode, NestedRegion, TransitionKind, TransitionMarker};
use crate::workflow::WorkflowName;
use serde::Serialize;
use std::fmt::{self, Write};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    /// JSON serialization failed
    #[error("Failed to serialize paths as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the diagram text failed
    #[error("Failed to write diagram: {0}")]
    Fmt(#[from] fmt::Error),
}

/// Turns expanded paths into a diagram string
pub trait PathRenderer: Send + Sync {
    /// Render `paths` produced from `graph` in `mode`
    fn render(
        &self,
        graph: &WorkflowCallGraph,
        paths: &[ExpandedPath],
        mode: ExpansionMode,
    ) -> Result<String, RenderError>;
}

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// Mermaid `stateDiagram-v2`
    #[default]
    Mermaid,
    /// Pretty-printed JSON
    Json,
}

impl RenderFormat {
    /// A renderer for this format
    pub fn renderer(self) -> Box<dyn PathRenderer> {
        match self {
            Self::Mermaid => Box::new(MermaidRenderer),
            Self::Json => Box::new(JsonRenderer),
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mermaid => write!(f, "mermaid"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for RenderFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mermaid" => Ok(Self::Mermaid),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                field: "format".to_string(),
                value: s.to_string(),
                hint: "Expected one of: mermaid, json".to_string(),
            }),
        }
    }
}

/// Mermaid `stateDiagram-v2` output, one composite state per path
#[derive(Debug, Default, Clone, Copy)]
pub struct MermaidRenderer;

impl PathRenderer for MermaidRenderer {
    fn render(
        &self,
        graph: &WorkflowCallGraph,
        paths: &[ExpandedPath],
        mode: ExpansionMode,
    ) -> Result<String, RenderError> {
        let mut diagram = String::from("stateDiagram-v2\n");
        writeln!(
            diagram,
            "    %% {}: {} path(s), {} mode, depth {} of {}",
            graph.root().name(),
            paths.len(),
            mode,
            graph.max_depth_reached(),
            graph.max_depth()
        )?;

        for (index, path) in paths.iter().enumerate() {
            let mut writer = DiagramWriter {
                out: &mut diagram,
                prefix: format!("p{index}"),
                counter: 0,
            };
            writer.path(path)?;
        }

        Ok(diagram)
    }
}

fn label(text: &str) -> String {
    text.replace('"', "'")
}

fn status_label(status: ChildStatus) -> &'static str {
    match status {
        ChildStatus::Resolved => "reference",
        ChildStatus::Unexpanded => "unexpanded: depth limit",
        ChildStatus::Unresolved => "unresolved: not found",
    }
}

struct DiagramWriter<'a> {
    out: &'a mut String,
    prefix: String,
    counter: usize,
}

impl DiagramWriter<'_> {
    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}_{}", self.prefix, self.counter)
    }

    fn path(&mut self, path: &ExpandedPath) -> fmt::Result {
        let id = self.prefix.clone();
        writeln!(self.out, "    state \"{}\" as {} {{", label(path.id.as_str()), id)?;
        self.segment(path, 0, 2)?;
        writeln!(self.out, "    }}")
    }

    /// The chain of one segment: its decisions with calls interleaved by position
    fn segment(&mut self, path: &ExpandedPath, index: usize, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        let decisions = &path.segments[index].local_path.decisions;
        let markers: Vec<&TransitionMarker> = path.transitions_from(index).collect();
        let mut previous = "[*]".to_string();

        for step in 0..=decisions.len() {
            for marker in markers.iter().filter(|m| m.position == step) {
                let id = self.call(path, marker, depth)?;
                writeln!(self.out, "{pad}{previous} --> {id}")?;
                previous = id;
            }
            if let Some(decision) = decisions.get(step) {
                let id = self.next_id();
                writeln!(
                    self.out,
                    "{pad}state \"{}: {}\" as {}",
                    label(decision.state.as_str()),
                    decision.taken,
                    id
                )?;
                writeln!(self.out, "{pad}{previous} --> {id}")?;
                previous = id;
            }
        }
        writeln!(self.out, "{pad}{previous} --> [*]")
    }

    fn call(&mut self, path: &ExpandedPath, marker: &TransitionMarker, depth: usize) -> Result<String, fmt::Error> {
        let pad = "    ".repeat(depth);
        let id = self.next_id();

        match &marker.kind {
            TransitionKind::Reference { status } => {
                writeln!(self.out, "{pad}state \"call {}\" as {}", label(marker.child.as_str()), id)?;
                if *status != ChildStatus::Resolved {
                    writeln!(self.out, "{pad}note right of {id} : {}", status_label(*status))?;
                }
            }
            TransitionKind::Inline { first_segment, .. } => {
                let child = &path.segments[*first_segment].local_path;
                writeln!(self.out, "{pad}state \"{}\" as {} {{", label(&child.id()), id)?;
                self.segment(path, *first_segment, depth + 1)?;
                writeln!(self.out, "{pad}}}")?;
            }
            TransitionKind::Subgraph { region } => {
                self.region(region, &id, depth)?;
            }
        }
        Ok(id)
    }

    fn region(&mut self, region: &NestedRegion, id: &str, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        let name = label(region.workflow.as_str());

        let count = match (region.status, region.local_path_count) {
            (ChildStatus::Resolved, Some(count)) => count,
            (status, _) => {
                writeln!(self.out, "{pad}state \"{name}\" as {id}")?;
                return writeln!(self.out, "{pad}note right of {id} : {}", status_label(status));
            }
        };

        writeln!(self.out, "{pad}state \"{name} ({count} local paths)\" as {id} {{")?;
        let inner = "    ".repeat(depth + 1);
        let mut previous = "[*]".to_string();

        for state in &region.decision_states {
            let step = self.next_id();
            writeln!(self.out, "{inner}state \"{}?\" as {}", label(state.as_str()), step)?;
            writeln!(self.out, "{inner}{previous} --> {step}")?;
            previous = step;
        }
        for child in &region.children {
            let step = self.next_id();
            self.region(child, &step, depth + 1)?;
            writeln!(self.out, "{inner}{previous} --> {step}")?;
            previous = step;
        }

        writeln!(self.out, "{inner}{previous} --> [*]")?;
        writeln!(self.out, "{pad}}}")
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    root: &'a WorkflowName,
    mode: ExpansionMode,
    path_count: usize,
    graph: &'a WorkflowCallGraph,
    paths: &'a [ExpandedPath],
}

/// Pretty-printed JSON of the call graph and every expanded path
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl PathRenderer for JsonRenderer {
    fn render(
        &self,
        graph: &WorkflowCallGraph,
        paths: &[ExpandedPath],
        mode: ExpansionMode,
    ) -> Result<String, RenderError> {
        let document = JsonDocument {
            root: graph.root().name(),
            mode,
            path_count: paths.len(),
            graph,
            paths,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}
