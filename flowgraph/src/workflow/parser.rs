//! Workflow file parser
//!
//! Reads Mermaid state diagrams out of `.mermaid` and markdown files and turns each
//! diagram into a [`WorkflowDefinition`]: its decision points from the state table and
//! its child calls from the configured [`CallScanner`].

use crate::workflow::action_parser::{ActionCallScanner, CallScanner, StateAction};
use crate::workflow::state::{StateTable, StateType};
use crate::workflow::{SourceFile, SourceLocation, StateId, WorkflowDefinition, WorkflowName};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while parsing a workflow file
#[derive(Debug, Error)]
pub enum ParseError {
    /// The YAML front matter is malformed
    #[error("Invalid front matter in {path}: {message}")]
    FrontMatter {
        /// File being parsed
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// A ```` ```mermaid ```` fence is never closed
    #[error("Unterminated mermaid block in {path} starting at line {line}")]
    UnterminatedBlock {
        /// File being parsed
        path: PathBuf,
        /// Line of the opening fence
        line: usize,
    },

    /// A `.mermaid` file does not hold a state diagram
    #[error("Expected a stateDiagram in {path} at line {line}, found '{found}'")]
    WrongDiagramType {
        /// File being parsed
        path: PathBuf,
        /// Line of the diagram header
        line: usize,
        /// The header that was found
        found: String,
    },

    /// A workflow name is empty or unusable
    #[error("Invalid workflow name '{name}' in {path} at line {line}")]
    InvalidName {
        /// File being parsed
        path: PathBuf,
        /// Line of the name
        line: usize,
        /// The rejected name
        name: String,
    },

    /// Two diagrams in one file share a name
    #[error("Workflow '{name}' is defined twice in {path} (lines {first_line} and {second_line})")]
    DuplicateWorkflow {
        /// File being parsed
        path: PathBuf,
        /// The duplicated name
        name: String,
        /// Line of the first definition
        first_line: usize,
        /// Line of the second definition
        second_line: usize,
    },

    /// A diagram after the first one in a markdown file has no name directive
    #[error("Mermaid block at {path}:{line} has no name; add a '%% workflow: <name>' line")]
    UnnamedWorkflow {
        /// File being parsed
        path: PathBuf,
        /// Line of the opening fence
        line: usize,
    },
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($pattern).expect(concat!(stringify!($name), " is valid")));
    };
}

regex!(FENCE_OPEN, r"^\s*```\s*mermaid\s*$");
regex!(FENCE_CLOSE, r"^\s*```\s*$");
regex!(DIAGRAM_HEADER, r"^stateDiagram(?:-v2)?\b");
regex!(WORKFLOW_DIRECTIVE, r"^%%\s*workflow\s*:\s*(.*?)\s*$");
regex!(
    IMPORT_DIRECTIVE,
    r#"^%%\s*import\s+([A-Za-z_][A-Za-z0-9_.-]*)\s+from\s+"([^"]+)"\s*$"#
);
regex!(
    STATE_DECL,
    r#"^state\s+(?:"[^"]*"\s+as\s+)?([A-Za-z0-9_.-]+)\s*(?:<<\s*(\w+)\s*>>)?\s*\{?\s*$"#
);
regex!(
    TRANSITION,
    r"^(\[\*\]|[A-Za-z0-9_.-]+)\s*-->\s*(\[\*\]|[A-Za-z0-9_.-]+)\s*(?::.*)?$"
);
regex!(DESCRIPTION, r"^([A-Za-z0-9_.-]+)\s*:\s*(.+)$");
regex!(HEADING, r"^#{1,6}\s+(.+?)\s*#*\s*$");
regex!(ACTION_ITEM, r"^\s*[-*]\s+([A-Za-z0-9_.-]+)\s*:\s*(.+)$");

/// YAML front matter of a markdown workflow file
#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    imports: BTreeMap<String, String>,
}

/// One mermaid diagram being collected line by line
#[derive(Debug)]
struct DiagramBlock {
    start_line: usize,
    is_state_diagram: Option<bool>,
    header: String,
    name: Option<(String, usize)>,
    imports: Vec<(String, String)>,
    table: StateTable,
    actions: Vec<StateAction>,
    in_note: bool,
}

impl DiagramBlock {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            is_state_diagram: None,
            header: String::new(),
            name: None,
            imports: Vec::new(),
            table: StateTable::new(),
            actions: Vec::new(),
            in_note: false,
        }
    }

    fn feed(&mut self, raw: &str, line: usize) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }

        if text.starts_with("%%") {
            if let Some(captures) = WORKFLOW_DIRECTIVE.captures(text) {
                self.name = Some((captures[1].to_string(), line));
            } else if let Some(captures) = IMPORT_DIRECTIVE.captures(text) {
                self.imports
                    .push((captures[1].to_string(), captures[2].to_string()));
            }
            return;
        }

        if self.is_state_diagram.is_none() {
            self.is_state_diagram = Some(DIAGRAM_HEADER.is_match(text));
            self.header = text.to_string();
            return;
        }
        if self.is_state_diagram == Some(false) {
            return;
        }

        if self.in_note {
            if text == "end note" {
                self.in_note = false;
            }
            return;
        }
        if text.starts_with("note ") {
            self.in_note = !text.contains(':');
            return;
        }

        if let Some(captures) = TRANSITION.captures(text) {
            let from = StateId::from(&captures[1]);
            let to = StateId::from(&captures[2]);
            self.table.transition(&from, &to, line);
        } else if let Some(captures) = STATE_DECL.captures(text) {
            let state_type = captures
                .get(2)
                .map(|m| StateType::from_stereotype(m.as_str()))
                .unwrap_or_default();
            self.table.declare(&StateId::from(&captures[1]), state_type, line);
        } else if let Some(captures) = DESCRIPTION.captures(text) {
            let state = StateId::from(&captures[1]);
            self.table.declare(&state, StateType::Normal, line);
            self.actions.push(StateAction::new(state, &captures[2], line));
        }
    }
}

/// Parser for workflow source files
#[derive(Debug, Clone)]
pub struct WorkflowFileParser {
    scanner: Arc<dyn CallScanner>,
}

impl Default for WorkflowFileParser {
    fn default() -> Self {
        Self::new(Arc::new(ActionCallScanner))
    }
}

impl WorkflowFileParser {
    /// Create a parser using `scanner` to discover child calls
    pub fn new(scanner: Arc<dyn CallScanner>) -> Self {
        Self { scanner }
    }

    /// Parse the content of the file at `path`
    ///
    /// `.mermaid` files hold exactly one diagram, everything else is read as markdown.
    pub fn parse_str(&self, content: &str, path: &Path) -> ParseResult<SourceFile> {
        let is_mermaid = path.extension().and_then(|e| e.to_str()) == Some("mermaid");
        let file = if is_mermaid {
            self.parse_mermaid(content, path)?
        } else {
            self.parse_markdown(content, path)?
        };

        tracing::debug!(
            "Parsed {} workflow(s) and {} import(s) from {}",
            file.workflows.len(),
            file.imports.len(),
            path.display()
        );
        Ok(file)
    }

    /// Cheap textual check for a definition of `name` before a full parse
    ///
    /// True when the file stem is `name` or a `%% workflow:` directive or a front
    /// matter `name:` line names it. False positives only cost a parse.
    pub fn may_define(path: &Path, content: &str, name: &WorkflowName) -> bool {
        if path.file_stem().and_then(|s| s.to_str()) == Some(name.as_str()) {
            return true;
        }
        content
            .lines()
            .filter_map(marker_name)
            .any(|marker| marker == name.as_str())
    }

    fn parse_mermaid(&self, content: &str, path: &Path) -> ParseResult<SourceFile> {
        let mut block = DiagramBlock::new(1);
        for (idx, line) in content.lines().enumerate() {
            block.feed(line, idx + 1);
        }

        if block.is_state_diagram != Some(true) {
            return Err(ParseError::WrongDiagramType {
                path: path.to_path_buf(),
                line: block.start_line,
                found: block.header,
            });
        }

        let mut imports = BTreeMap::new();
        let name = match block.name.take() {
            Some((name, line)) => checked_name(&name, path, line)?,
            None => stem_name(path)?,
        };
        let definition = self.finish(block, name, String::new(), path, &mut imports);

        Ok(SourceFile {
            path: path.to_path_buf(),
            imports,
            workflows: vec![Arc::new(definition)],
        })
    }

    fn parse_markdown(&self, content: &str, path: &Path) -> ParseResult<SourceFile> {
        let lines: Vec<&str> = content.lines().collect();
        let (front, body_start) = split_front_matter(&lines, path)?;

        let mut blocks: Vec<DiagramBlock> = Vec::new();
        let mut open: Option<DiagramBlock> = None;
        let mut in_actions = false;

        for (idx, line) in lines.iter().enumerate().skip(body_start) {
            let line_no = idx + 1;

            if open.is_some() {
                if FENCE_CLOSE.is_match(line) {
                    if let Some(done) = open.take() {
                        if done.is_state_diagram == Some(true) {
                            blocks.push(done);
                        } else {
                            tracing::debug!(
                                "Skipping non-state diagram at {}:{}",
                                path.display(),
                                done.start_line
                            );
                        }
                    }
                } else if let Some(block) = open.as_mut() {
                    block.feed(line, line_no);
                }
                continue;
            }

            if FENCE_OPEN.is_match(line) {
                open = Some(DiagramBlock::new(line_no));
                in_actions = false;
            } else if let Some(captures) = HEADING.captures(line) {
                in_actions = captures[1].eq_ignore_ascii_case("actions");
            } else if in_actions {
                if let Some(captures) = ACTION_ITEM.captures(line) {
                    match blocks.last_mut() {
                        Some(block) => block.actions.push(StateAction::new(
                            StateId::from(&captures[1]),
                            &captures[2],
                            line_no,
                        )),
                        None => tracing::debug!(
                            "Action at {}:{} precedes any diagram; ignored",
                            path.display(),
                            line_no
                        ),
                    }
                }
            }
        }

        if let Some(block) = open {
            return Err(ParseError::UnterminatedBlock {
                path: path.to_path_buf(),
                line: block.start_line,
            });
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut imports: BTreeMap<String, PathBuf> = front
            .imports
            .iter()
            .map(|(alias, target)| (alias.clone(), base.join(target)))
            .collect();

        let mut workflows: Vec<Arc<WorkflowDefinition>> = Vec::with_capacity(blocks.len());
        let mut seen: HashMap<WorkflowName, usize> = HashMap::new();

        for (index, mut block) in blocks.into_iter().enumerate() {
            let name = match (block.name.take(), index) {
                (Some((name, line)), _) => checked_name(&name, path, line)?,
                (None, 0) => match front.name.as_deref() {
                    Some(name) => checked_name(name, path, 1)?,
                    None => stem_name(path)?,
                },
                (None, _) => {
                    return Err(ParseError::UnnamedWorkflow {
                        path: path.to_path_buf(),
                        line: block.start_line,
                    })
                }
            };

            if let Some(&first_line) = seen.get(&name) {
                return Err(ParseError::DuplicateWorkflow {
                    path: path.to_path_buf(),
                    name: name.to_string(),
                    first_line,
                    second_line: block.start_line,
                });
            }
            seen.insert(name.clone(), block.start_line);

            let description = if index == 0 {
                front
                    .description
                    .clone()
                    .or_else(|| front.title.clone())
                    .unwrap_or_default()
            } else {
                String::new()
            };

            let definition = self.finish(block, name, description, path, &mut imports);
            workflows.push(Arc::new(definition));
        }

        Ok(SourceFile {
            path: path.to_path_buf(),
            imports,
            workflows,
        })
    }

    fn finish(
        &self,
        block: DiagramBlock,
        name: WorkflowName,
        description: String,
        path: &Path,
        imports: &mut BTreeMap<String, PathBuf>,
    ) -> WorkflowDefinition {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for (alias, target) in block.imports {
            imports.entry(alias).or_insert_with(|| base.join(target));
        }

        let calls = self.scanner.scan(&name, &block.actions);
        WorkflowDefinition {
            name,
            description,
            location: SourceLocation {
                path: path.to_path_buf(),
                line: block.start_line,
            },
            decisions: block.table.decision_points(),
            calls,
        }
    }
}

fn marker_name(line: &str) -> Option<&str> {
    let text = line.trim();
    if let Some(captures) = WORKFLOW_DIRECTIVE.captures(text) {
        return captures.get(1).map(|m| m.as_str());
    }
    text.strip_prefix("name:")
        .map(|rest| rest.trim().trim_matches(|c| c == '"' || c == '\''))
}

fn checked_name(name: &str, path: &Path, line: usize) -> ParseResult<WorkflowName> {
    WorkflowName::try_new(name).map_err(|_| ParseError::InvalidName {
        path: path.to_path_buf(),
        line,
        name: name.to_string(),
    })
}

fn stem_name(path: &Path) -> ParseResult<WorkflowName> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    checked_name(stem, path, 1)
}

fn split_front_matter(lines: &[&str], path: &Path) -> ParseResult<(FrontMatter, usize)> {
    if lines.first().map(|l| l.trim()) != Some("---") {
        return Ok((FrontMatter::default(), 0));
    }

    let close = lines
        .iter()
        .skip(1)
        .position(|l| l.trim() == "---")
        .map(|p| p + 1)
        .ok_or_else(|| ParseError::FrontMatter {
            path: path.to_path_buf(),
            message: "front matter is not terminated by '---'".to_string(),
        })?;

    let yaml = lines[1..close].join("\n");
    if yaml.trim().is_empty() {
        return Ok((FrontMatter::default(), close + 1));
    }

    let front: FrontMatter =
        serde_yaml::from_str(&yaml).map_err(|e| ParseError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok((front, close + 1))
}
