//! Workflow index
//!
//! Locates and parses workflow definitions on demand. Parsed files are cached by
//! canonical path and definitions by name, so a child shared by several parents is
//! parsed once per analysis.

use crate::config::Config;
use crate::directory_utils::walk_files_with_extensions;
use crate::workflow::action_parser::CallScanner;
use crate::workflow::parser::{ParseError, WorkflowFileParser};
use crate::workflow::{SourceFile, WorkflowDefinition, WorkflowName};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the workflow index
#[derive(Debug, Error)]
pub enum IndexError {
    /// A workflow file could not be read
    #[error("Failed to read workflow file {path}: {source}")]
    Read {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A workflow file could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No file under the search root defines the workflow
    #[error("Workflow '{name}' not found after searching {} location(s)", .searched_locations.len())]
    NotFound {
        /// The requested workflow
        name: WorkflowName,
        /// Locations that were examined
        searched_locations: Vec<PathBuf>,
    },

    /// The search root holds more candidate files than allowed
    #[error("Search under {root} would consider more than {limit} files; narrow the search root or raise max_search_files")]
    SearchTooBroad {
        /// Search root
        root: PathBuf,
        /// Configured candidate ceiling
        limit: usize,
    },

    /// The search root is missing or not a directory
    #[error("Search root {path} is not a directory")]
    InvalidSearchRoot {
        /// The configured root
        path: PathBuf,
    },
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Where and how the index searches
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Root directory of filesystem search
    pub search_root: PathBuf,
    /// Extensions of candidate files, without dots
    pub extensions: Vec<String>,
    /// Ceiling on candidate files, checked before any file is read
    pub max_search_files: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for IndexOptions {
    fn from(config: &Config) -> Self {
        Self {
            search_root: config.search_root.clone(),
            extensions: config.extensions.clone(),
            max_search_files: config.max_search_files,
        }
    }
}

/// On-demand index of workflow definitions under a search root
#[derive(Debug)]
pub struct WorkflowIndex {
    options: IndexOptions,
    parser: WorkflowFileParser,
    files: DashMap<PathBuf, Arc<SourceFile>>,
    definitions: DashMap<WorkflowName, Arc<WorkflowDefinition>>,
    candidates: OnceCell<Vec<PathBuf>>,
}

impl WorkflowIndex {
    /// Create an index using the default call scanner
    pub fn new(options: IndexOptions) -> Self {
        Self::with_parser(options, WorkflowFileParser::default())
    }

    /// Create an index that discovers child calls with `scanner`
    pub fn with_scanner(options: IndexOptions, scanner: Arc<dyn CallScanner>) -> Self {
        Self::with_parser(options, WorkflowFileParser::new(scanner))
    }

    fn with_parser(options: IndexOptions, parser: WorkflowFileParser) -> Self {
        Self {
            options,
            parser,
            files: DashMap::new(),
            definitions: DashMap::new(),
            candidates: OnceCell::new(),
        }
    }

    /// The options this index was built with
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Number of files parsed so far
    pub fn parsed_file_count(&self) -> usize {
        self.files.len()
    }

    /// Load and parse a file, or return the cached parse
    ///
    /// Check, parse and insert happen under the entry lock, so two callers racing on
    /// the same file parse it once.
    pub fn load_file(&self, path: &Path) -> IndexResult<Arc<SourceFile>> {
        let canonical = path.canonicalize().map_err(|source| IndexError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file = self
            .files
            .entry(canonical.clone())
            .or_try_insert_with(|| {
                let content =
                    std::fs::read_to_string(&canonical).map_err(|source| IndexError::Read {
                        path: canonical.clone(),
                        source,
                    })?;
                let parsed = self.parser.parse_str(&content, &canonical)?;
                Ok::<_, IndexError>(Arc::new(parsed))
            })?
            .value()
            .clone();

        for workflow in &file.workflows {
            self.definitions
                .entry(workflow.name.clone())
                .or_insert_with(|| Arc::clone(workflow));
        }

        Ok(file)
    }

    /// Find `name` in a specific file; a file without it is a miss, not an error
    pub fn find_in_file(
        &self,
        path: &Path,
        name: &WorkflowName,
    ) -> IndexResult<Option<Arc<WorkflowDefinition>>> {
        Ok(self.load_file(path)?.find(name))
    }

    /// Cached definition for `name`, if any file loaded so far defines it
    pub fn cached(&self, name: &WorkflowName) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve a workflow by name, searching the filesystem on a cache miss
    pub fn resolve(&self, name: &WorkflowName) -> IndexResult<Arc<WorkflowDefinition>> {
        if let Some(definition) = self.cached(name) {
            tracing::debug!("Index cache hit for '{}'", name);
            return Ok(definition);
        }

        let mut searched = Vec::new();
        self.search(name, &mut searched)?
            .ok_or_else(|| IndexError::NotFound {
                name: name.clone(),
                searched_locations: searched,
            })
    }

    /// Search the root directory for a file defining `name`
    ///
    /// Candidates are filtered by extension and capped by `max_search_files` before
    /// any file is read. A textual marker pre-check runs over all candidates in
    /// parallel; the files that pass are parsed in sorted path order and the first
    /// definition wins. Every parsed file is appended to `searched`.
    pub fn search(
        &self,
        name: &WorkflowName,
        searched: &mut Vec<PathBuf>,
    ) -> IndexResult<Option<Arc<WorkflowDefinition>>> {
        let candidates = self.candidate_files()?;
        searched.push(self.options.search_root.clone());

        let hits: Vec<bool> = candidates
            .par_iter()
            .map(|path| marker_precheck(path, name))
            .collect();

        tracing::debug!(
            "Searching {} candidate file(s) for '{}', {} pass the marker check",
            candidates.len(),
            name,
            hits.iter().filter(|hit| **hit).count()
        );

        for (path, _) in candidates.iter().zip(hits).filter(|(_, hit)| *hit) {
            searched.push(path.clone());
            if let Some(definition) = self.find_in_file(path, name)? {
                tracing::debug!("Found '{}' in {}", name, path.display());
                return Ok(Some(definition));
            }
        }

        Ok(None)
    }

    /// Candidate files under the search root, sorted, computed once per index
    pub fn candidate_files(&self) -> IndexResult<&[PathBuf]> {
        let root = &self.options.search_root;
        if !root.is_dir() {
            return Err(IndexError::InvalidSearchRoot { path: root.clone() });
        }

        let files = self.candidates.get_or_try_init(|| {
            let limit = self.options.max_search_files;
            let root = root.canonicalize().map_err(|source| IndexError::Read {
                path: root.clone(),
                source,
            })?;

            let mut files: Vec<PathBuf> =
                walk_files_with_extensions(&root, &self.options.extensions)
                    .take(limit.saturating_add(1))
                    .collect();

            if files.len() > limit {
                return Err(IndexError::SearchTooBroad { root, limit });
            }
            files.sort();
            Ok(files)
        })?;

        Ok(files.as_slice())
    }

    /// Every workflow defined under the search root, sorted by name
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn discover(&self) -> IndexResult<Vec<Arc<WorkflowDefinition>>> {
        let mut workflows = Vec::new();
        for path in self.candidate_files()? {
            match self.load_file(path) {
                Ok(file) => workflows.extend(file.workflows.iter().cloned()),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        workflows.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.location.path.cmp(&b.location.path))
        });
        Ok(workflows)
    }
}

fn marker_precheck(path: &Path, name: &WorkflowName) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => WorkflowFileParser::may_define(path, &content, name),
        Err(e) => {
            tracing::debug!("Pre-check could not read {}: {}", path.display(), e);
            false
        }
    }
}
