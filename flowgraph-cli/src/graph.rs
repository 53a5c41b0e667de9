use crate::cli::{Cli, GraphArgs, GraphFormat};
use crate::error::{CliResult, IntoCliResult};
use crate::exit_codes::EXIT_ERROR;
use colored::*;
use flowgraph::{Config, EdgeTarget, NodeId, WorkflowAnalyzer, WorkflowCallGraph, WorkflowName};
use std::collections::HashSet;

/// Run the graph command
pub fn run_graph(args: GraphArgs) -> CliResult<()> {
    let config = args.resolve.apply(Config::new());
    let root = WorkflowName::try_new(args.workflow.as_str()).cli_validation_error()?;

    let analyzer = WorkflowAnalyzer::new(config)?;
    let graph = analyzer.build_graph(&root)?;

    let output = match args.format {
        GraphFormat::Tree => render_tree(&graph, Cli::should_use_color()),
        GraphFormat::Json => serde_json::to_string_pretty(&graph).cli_error(EXIT_ERROR)?,
    };
    println!("{output}");
    Ok(())
}

/// Indented tree of the call graph
///
/// A node reached a second time is printed once more without its children.
pub fn render_tree(graph: &WorkflowCallGraph, use_color: bool) -> String {
    let root = graph.root();
    let mut out = format!("{} ({})", paint(root.name().as_str(), use_color), root.definition.location);
    let mut expanded = HashSet::from([graph.root_id()]);
    write_children(graph, graph.root_id(), "", &mut expanded, use_color, &mut out);

    out.push_str(&format!(
        "\n\n{} workflow(s), depth {} of {}",
        graph.node_count(),
        graph.max_depth_reached(),
        graph.max_depth()
    ));
    out
}

fn paint(name: &str, use_color: bool) -> String {
    if use_color {
        name.bold().to_string()
    } else {
        name.to_string()
    }
}

fn write_children(
    graph: &WorkflowCallGraph,
    id: NodeId,
    prefix: &str,
    expanded: &mut HashSet<NodeId>,
    use_color: bool,
    out: &mut String,
) {
    let edges = &graph.node(id).edges;
    for (i, edge) in edges.iter().enumerate() {
        let last = i + 1 == edges.len();
        let branch = if last { "└── " } else { "├── " };
        let name = paint(edge.call.child.as_str(), use_color);

        let detail = match (&edge.target, edge.tier) {
            (EdgeTarget::Resolved(child), tier) => {
                let tier = tier.map(|t| format!("[{t}] ")).unwrap_or_default();
                let seen = if expanded.contains(child) { " (shown above)" } else { "" };
                format!("{tier}line {}{seen}", edge.call.line)
            }
            (EdgeTarget::Unexpanded, _) => format!("line {} (depth limit)", edge.call.line),
            (EdgeTarget::Unresolved { .. }, _) => format!("line {} (not found)", edge.call.line),
        };
        let detail = match (&edge.target, use_color) {
            (EdgeTarget::Unresolved { .. }, true) => detail.red().to_string(),
            (EdgeTarget::Unexpanded, true) => detail.yellow().to_string(),
            _ => detail,
        };
        out.push_str(&format!("\n{prefix}{branch}{name} {detail}"));

        if let Some(child) = edge.resolved() {
            if expanded.insert(child) {
                let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
                write_children(graph, child, &nested, expanded, use_color, out);
            }
        }
    }
}
