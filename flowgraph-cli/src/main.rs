use clap::CommandFactory;
use flowgraph_cli::analyze::run_analyze;
use flowgraph_cli::cli::{Cli, Commands};
use flowgraph_cli::error::handle_cli_result;
use flowgraph_cli::exit_codes::EXIT_SUCCESS;
use flowgraph_cli::graph::run_graph;
use flowgraph_cli::list::run_list;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let Some(command) = cli.command else {
        Cli::command().print_help().expect("Failed to print help");
        process::exit(EXIT_SUCCESS);
    };

    // Diagrams go to stdout, so logs stay on stderr and default to warnings only
    let level = if cli.quiet {
        "error"
    } else if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("FLOWGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(Cli::should_use_color())
        .init();

    if !Cli::should_use_color() {
        colored::control::set_override(false);
    }

    let result = match command {
        Commands::Analyze(args) => {
            tracing::info!("Running analyze command");
            run_analyze(args).await
        }
        Commands::Graph(args) => {
            tracing::info!("Running graph command");
            run_graph(args)
        }
        Commands::List(args) => {
            tracing::info!("Running list command");
            run_list(args)
        }
    };

    process::exit(handle_cli_result(result));
}
