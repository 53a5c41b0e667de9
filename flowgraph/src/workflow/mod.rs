//! Workflow definitions, parsing and the workflow index
//!
//! Workflows are Mermaid state diagrams. This module turns source files into
//! [`WorkflowDefinition`]s (decision points plus child-call facts) and locates them on
//! demand through the [`WorkflowIndex`].

mod action_parser;
mod definition;
mod index;
mod parser;
mod state;

pub use action_parser::{ActionCallScanner, CallScanner, StateAction};
pub use definition::{
    CallSiteId, ChildCallFact, DecisionPoint, ReferenceKind, SourceFile, SourceLocation,
    WorkflowDefinition, WorkflowError, WorkflowName, WorkflowResult,
};
pub use index::{IndexError, IndexOptions, IndexResult, WorkflowIndex};
pub use parser::{ParseError, ParseResult, WorkflowFileParser};
pub use state::{StateError, StateId, StateTable, StateType, TERMINAL_MARKER};
