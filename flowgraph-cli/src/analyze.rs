use crate::cli::{AnalyzeArgs, Cli};
use crate::error::{CliError, CliResult, IntoCliResult};
use crate::exit_codes::{EXIT_ERROR, EXIT_WARNING};
use colored::*;
use flowgraph::{AnalysisReport, Config, ErrorContext, RenderFormat, WorkflowAnalyzer, WorkflowName};
use std::path::Path;

/// Settings for an analyze run: loaded configuration plus command-line overrides
pub fn analysis_config(args: &AnalyzeArgs, base: Config) -> Config {
    let mut config = args.resolve.apply(base);
    if let Some(mode) = args.mode {
        config = config.with_mode(mode.into());
    }
    if let Some(max_paths) = args.max_paths {
        config = config.with_max_paths(max_paths);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_deadline(Some(timeout));
    }
    config
}

/// Run the analyze command
///
/// The analysis is synchronous, so it runs on the blocking pool; the deadline is
/// also enforced from the outside in case a single file read stalls.
pub async fn run_analyze(args: AnalyzeArgs) -> CliResult<()> {
    let config = analysis_config(&args, Config::new());
    let deadline = config.deadline;
    let root = WorkflowName::try_new(args.workflow.as_str()).cli_validation_error()?;

    let analyzer = WorkflowAnalyzer::new(config)?
        .with_renderer(RenderFormat::from(args.format).renderer());

    tracing::debug!("Starting analysis of '{}'", root);
    let task = tokio::task::spawn_blocking(move || analyzer.analyze(&root));

    let joined = match deadline {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            CliError::new(
                format!("Analysis did not finish within {limit:?}"),
                EXIT_WARNING,
            )
        })?,
        None => task.await,
    };
    let report = joined.cli_error(EXIT_ERROR)??;

    write_output(&report.diagram, args.output.as_deref())?;
    print_summary(&report, Cli::should_use_color());
    Ok(())
}

fn write_output(diagram: &str, output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => {
            std::fs::write(path, diagram)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            tracing::info!("Wrote {} bytes to {}", diagram.len(), path.display());
        }
        None => {
            print!("{diagram}");
            if !diagram.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport, use_color: bool) {
    let graph = &report.graph;
    let headline = format!(
        "{} path(s) for '{}' in {} mode ({} workflow(s), depth {} of {})",
        report.paths.len(),
        graph.root().name(),
        report.mode,
        graph.node_count(),
        graph.max_depth_reached(),
        graph.max_depth()
    );

    if use_color {
        eprintln!("{} {}", "✓".green(), headline);
    } else {
        eprintln!("✓ {headline}");
    }

    if graph.is_truncated() {
        let note = "Some calls sit at the depth limit and were not expanded (raise --depth to follow them)";
        if use_color {
            eprintln!("{} {}", "!".yellow(), note.yellow());
        } else {
            eprintln!("! {note}");
        }
    }
}
