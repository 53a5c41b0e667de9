//! Unified error handling for the flowgraph library
//!
//! Each stage of the analysis owns a typed error enum; this module aggregates them
//! into [`FlowgraphError`] so callers can use a single `Result` type end to end.

use crate::callgraph::GraphError;
use crate::common::deadline::DeadlineExceeded;
use crate::config::ConfigError;
use crate::paths::ExpansionError;
use crate::render::RenderError;
use crate::workflow::{IndexError, ParseError};
use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for the flowgraph library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowgraphError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A workflow file could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The workflow index could not locate or load a workflow
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Call graph construction failed (missing child, cycle)
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Path expansion failed (path explosion)
    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    /// Rendering the expanded paths failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The overall analysis deadline passed
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Generic error with context
    #[error("{message}")]
    Context {
        /// Description of what was being attempted
        message: String,
        /// The underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for flowgraph operations
pub type Result<T> = std::result::Result<T, FlowgraphError>;

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, msg: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<S: Into<String>>(self, msg: S) -> Result<T> {
        self.map_err(|e| FlowgraphError::Context {
            message: msg.into(),
            source: Box::new(e),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| FlowgraphError::Context {
            message: f().into(),
            source: Box::new(e),
        })
    }
}

/// Displays an error followed by every `source()` beneath it, one per line
pub struct ErrorChain<'a>(&'a dyn std::error::Error);

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.0)?;

        let mut cause = self.0.source();
        let mut level = 1;
        while let Some(err) = cause {
            writeln!(f, "{:indent$}Caused by: {}", "", err, indent = level * 2)?;
            cause = err.source();
            level += 1;
        }
        Ok(())
    }
}

/// Adds [`ErrorChain`] formatting to any error
pub trait ErrorChainExt {
    /// Format the error with its full cause chain
    fn error_chain(&self) -> ErrorChain<'_>;
}

impl<E: std::error::Error> ErrorChainExt for E {
    fn error_chain(&self) -> ErrorChain<'_> {
        ErrorChain(self)
    }
}
