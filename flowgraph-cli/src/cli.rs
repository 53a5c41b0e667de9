use clap::{Args, Parser, Subcommand, ValueEnum};
use flowgraph::{Config, ExpansionMode, MissingChildPolicy, RenderFormat};
use is_terminal::IsTerminal;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// How child workflows are combined with their parents
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Children stay single reference nodes
    Reference,
    /// Children's paths are substituted in (Cartesian product)
    Inline,
    /// Children are drawn as nested regions
    Subgraph,
}

impl From<ModeArg> for ExpansionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Reference => ExpansionMode::Reference,
            ModeArg::Inline => ExpansionMode::Inline,
            ModeArg::Subgraph => ExpansionMode::Subgraph,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagramFormat {
    Mermaid,
    Json,
}

impl From<DiagramFormat> for RenderFormat {
    fn from(format: DiagramFormat) -> Self {
        match format {
            DiagramFormat::Mermaid => RenderFormat::Mermaid,
            DiagramFormat::Json => RenderFormat::Json,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphFormat {
    Tree,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "flowgraph")]
#[command(version)]
#[command(about = "Resolve workflow call graphs and expand their execution paths")]
#[command(long_about = "
flowgraph reads workflows written as Mermaid state diagrams, resolves the
child workflows they call, and lists every end-to-end execution path.

Settings come from defaults, FLOWGRAPH_* environment variables and
flowgraph.yaml, in that order; command-line flags override all of them.

Example usage:
  flowgraph analyze deploy                    # Mermaid diagram of deploy's paths
  flowgraph analyze deploy --mode inline      # Substitute child paths
  flowgraph graph deploy                      # Show the resolved call graph
  flowgraph list --root ./workflows           # List every workflow found
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand and render every execution path of a workflow
    #[command(long_about = "
Resolves the call graph of a workflow, expands its execution paths in the
selected mode and renders them.

Expansion modes:
  reference  - one path per branch combination of the root; calls are references
  inline     - children's paths are substituted in (product of all path counts)
  subgraph   - like reference, but children are drawn as nested regions

Exit codes:
  0 - Paths rendered
  1 - A workflow could not be found or the analysis timed out
  2 - Cycle, path explosion, parse error or invalid setting

Examples:
  flowgraph analyze deploy --mode inline --depth 3
  flowgraph analyze deploy --format json --output deploy.json
  flowgraph analyze deploy --max-paths 500 --timeout 30s
")]
    Analyze(AnalyzeArgs),

    /// Show the resolved call graph of a workflow
    #[command(long_about = "
Resolves child workflows without expanding paths and prints the call graph
as a tree, or as JSON for scripting.

Examples:
  flowgraph graph deploy
  flowgraph graph deploy --depth 5 --format json
")]
    Graph(GraphArgs),

    /// List every workflow under the search root
    List(ListArgs),
}

/// Settings shared by commands that resolve a call graph
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Directory searched for workflow files
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Maximum expansion depth, the root is depth 0
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Mark children that cannot be found instead of failing
    #[arg(long)]
    pub allow_missing: bool,
}

impl ResolveArgs {
    /// Apply the flags on top of `config`
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(root) = &self.root {
            config = config.with_search_root(root);
        }
        if let Some(depth) = self.depth {
            config = config.with_max_depth(depth);
        }
        if self.allow_missing {
            config = config.with_missing_child_policy(MissingChildPolicy::Mark);
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Name of the root workflow
    pub workflow: String,

    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Expansion mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Ceiling on the number of expanded paths
    #[arg(long)]
    pub max_paths: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = DiagramFormat::Mermaid)]
    pub format: DiagramFormat,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Abort the analysis after this long (e.g. 30s, 5m, 1h)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Name of the root workflow
    pub workflow: String,

    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = GraphFormat::Tree)]
    pub format: GraphFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Directory searched for workflow files
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ListFormat::Text)]
    pub format: ListFormat,
}

/// Parse durations such as `30s`, `5m` or `2h`; a bare number is seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".to_string());
    }

    let (value_str, multiplier) = if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60)
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600)
    } else {
        (s, 1)
    };

    let value: u64 = value_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid duration value: {value_str}"))?;

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration too large: {s}"))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn try_parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(args)
    }

    pub fn is_tty() -> bool {
        io::stderr().is_terminal()
    }

    pub fn should_use_color() -> bool {
        Self::is_tty() && std::env::var("NO_COLOR").is_err()
    }
}
