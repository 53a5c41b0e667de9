use crate::cli::{Cli, ListArgs, ListFormat};
use crate::error::{CliResult, IntoCliResult};
use crate::exit_codes::EXIT_ERROR;
use colored::*;
use flowgraph::{Config, FlowgraphError, WorkflowDefinition, WorkflowIndex};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct WorkflowInfo {
    name: String,
    location: String,
    description: String,
    decisions: usize,
    calls: Vec<String>,
}

impl From<&WorkflowDefinition> for WorkflowInfo {
    fn from(definition: &WorkflowDefinition) -> Self {
        Self {
            name: definition.name.to_string(),
            location: definition.location.to_string(),
            description: definition.description.clone(),
            decisions: definition.decision_count(),
            calls: definition.calls.iter().map(|c| c.child.to_string()).collect(),
        }
    }
}

/// Run the list command
pub fn run_list(args: ListArgs) -> CliResult<()> {
    let mut config = Config::new();
    if let Some(root) = args.root {
        config = config.with_search_root(root);
    }
    config.validate().cli_validation_error()?;

    let workflows = WorkflowIndex::new((&config).into())
        .discover()
        .map_err(FlowgraphError::from)?;
    tracing::debug!("Discovered {} workflow(s)", workflows.len());

    match args.format {
        ListFormat::Text => println!("{}", format_text(&workflows, Cli::should_use_color())),
        ListFormat::Json => {
            let infos: Vec<WorkflowInfo> = workflows.iter().map(|w| WorkflowInfo::from(w.as_ref())).collect();
            println!("{}", serde_json::to_string_pretty(&infos).cli_error(EXIT_ERROR)?);
        }
    }
    Ok(())
}

fn format_text(workflows: &[Arc<WorkflowDefinition>], use_color: bool) -> String {
    if workflows.is_empty() {
        return "No workflows found.".to_string();
    }

    let width = workflows.iter().map(|w| w.name.as_str().len()).max().unwrap_or(0);
    workflows
        .iter()
        .map(|workflow| {
            let name = format!("{:width$}", workflow.name.as_str());
            let name = if use_color { name.cyan().to_string() } else { name };
            let mut line = format!(
                "{}  {} decision(s), {} call(s)  {}",
                name,
                workflow.decision_count(),
                workflow.calls.len(),
                workflow.location
            );
            if !workflow.description.is_empty() {
                line.push_str(&format!("\n{:width$}  {}", "", workflow.description));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
