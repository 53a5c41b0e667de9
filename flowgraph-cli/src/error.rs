//! Error handling for the flowgraph CLI
//!
//! Library errors are wrapped in [`CliError`], which keeps the cause chain and
//! carries the exit code the process should end with.

use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_WARNING};
use flowgraph::callgraph::GraphError;
use flowgraph::workflow::IndexError;
use flowgraph::{ExpansionError, FlowgraphError};
use std::error::Error;
use std::fmt;

/// CLI-specific result type that preserves error information
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type that includes both error information and suggested exit code
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: i32,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl CliError {
    /// Create a new CLI error with a message and exit code
    pub fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            exit_code,
            source: None,
        }
    }

    /// Create a CLI error from another error with a specific exit code
    pub fn from_error<E: Error + Send + Sync + 'static>(error: E, exit_code: i32) -> Self {
        Self {
            message: error.to_string(),
            exit_code,
            source: Some(Box::new(error)),
        }
    }

    /// Create a CLI error with exit code 1 (general error)
    pub fn general<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self::from_error(error, EXIT_WARNING)
    }

    /// Create a CLI error with exit code 2 (validation error)
    pub fn validation<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self::from_error(error, EXIT_ERROR)
    }

    /// Wrap a library error, choosing the exit code from its kind
    pub fn analysis(error: FlowgraphError) -> Self {
        let exit_code = exit_code_for(&error);
        Self::from_error(error, exit_code)
    }

    /// The message followed by every underlying cause
    ///
    /// Causes whose text repeats the previous line are skipped, since transparent
    /// wrappers display the same message as their source.
    pub fn full_chain(&self) -> String {
        let mut result = self.message.clone();
        let mut previous = self.message.clone();

        let mut current = self.source.as_deref().and_then(|e| e.source());
        while let Some(err) = current {
            let text = err.to_string();
            if text != previous {
                result.push_str(&format!("\n  Caused by: {text}"));
                previous = text;
            }
            current = err.source();
        }

        result
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<FlowgraphError> for CliError {
    fn from(error: FlowgraphError) -> Self {
        Self::analysis(error)
    }
}

/// Exit code for a library error
///
/// Problems in the workflows themselves or in the settings are validation failures;
/// anything that stopped the analysis from finishing is a general error.
pub fn exit_code_for(error: &FlowgraphError) -> i32 {
    match error {
        FlowgraphError::Config(_) | FlowgraphError::Parse(_) => EXIT_ERROR,
        FlowgraphError::Graph(GraphError::CircularWorkflow { .. })
        | FlowgraphError::Graph(GraphError::Index(IndexError::Parse(_)))
        | FlowgraphError::Graph(GraphError::Index(IndexError::SearchTooBroad { .. }))
        | FlowgraphError::Index(IndexError::Parse(_)) => EXIT_ERROR,
        FlowgraphError::Expansion(ExpansionError::PathExplosion { .. }) => EXIT_ERROR,
        _ => EXIT_WARNING,
    }
}

/// Extension trait for converting results to CLI results
pub trait IntoCliResult<T> {
    fn cli_error(self, exit_code: i32) -> CliResult<T>;
    fn cli_general_error(self) -> CliResult<T>;
    fn cli_validation_error(self) -> CliResult<T>;
}

impl<T, E: Error + Send + Sync + 'static> IntoCliResult<T> for Result<T, E> {
    fn cli_error(self, exit_code: i32) -> CliResult<T> {
        self.map_err(|e| CliError::from_error(e, exit_code))
    }

    fn cli_general_error(self) -> CliResult<T> {
        self.map_err(CliError::general)
    }

    fn cli_validation_error(self) -> CliResult<T> {
        self.map_err(CliError::validation)
    }
}

/// Convert a CliResult to an exit code, printing the full error chain if needed
pub fn handle_cli_result<T>(result: CliResult<T>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.full_chain());
            e.exit_code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph::{ErrorContext, WorkflowName};
    use std::io;

    #[test]
    fn test_cycle_is_a_validation_error() {
        let error = FlowgraphError::from(GraphError::CircularWorkflow {
            full_chain: vec![WorkflowName::new("a"), WorkflowName::new("b"), WorkflowName::new("a")],
        });
        let cli_error = CliError::from(error);

        assert_eq!(cli_error.exit_code, EXIT_ERROR);
        assert!(cli_error.message.contains("a -> b -> a"));
    }

    #[test]
    fn test_path_explosion_is_a_validation_error() {
        let error = FlowgraphError::from(ExpansionError::PathExplosion {
            computed_total: 4,
            limit: 3,
        });
        assert_eq!(exit_code_for(&error), EXIT_ERROR);
    }

    #[test]
    fn test_missing_workflow_is_a_general_error() {
        let error = FlowgraphError::from(GraphError::Index(IndexError::NotFound {
            name: WorkflowName::new("deploy"),
            searched_locations: vec![],
        }));
        assert_eq!(exit_code_for(&error), EXIT_WARNING);
    }

    #[test]
    fn test_full_chain_includes_causes() {
        let result: Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "diagram.mmd is read-only"));
        let error = CliError::analysis(result.context("Failed to write diagram").unwrap_err());

        let chain = error.full_chain();
        assert!(chain.starts_with("Failed to write diagram"));
        assert!(chain.contains("Caused by: diagram.mmd is read-only"));
        assert_eq!(error.exit_code, EXIT_WARNING);
    }

    #[test]
    fn test_handle_cli_result() {
        assert_eq!(handle_cli_result::<()>(Ok(())), EXIT_SUCCESS);
        assert_eq!(
            handle_cli_result::<()>(Err(CliError::new("boom", EXIT_ERROR))),
            EXIT_ERROR
        );
    }
}
