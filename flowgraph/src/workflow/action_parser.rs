//! Child-call scanning over state actions
//!
//! The index hands every state action of a workflow to a [`CallScanner`], which
//! reports the sub-workflow calls it recognizes as [`ChildCallFact`]s.

use crate::workflow::{ChildCallFact, ReferenceKind, StateId, WorkflowName};
use once_cell::sync::Lazy;
use regex::Regex;

/// Sub-workflow action syntax
///
/// ```text
/// Run workflow "name" with key="value"
/// Delegate to "name"
/// Run workflow name
/// ```
static SUB_WORKFLOW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:[Rr]un\s+workflow|[Dd]elegate(?:\s+to)?)\s+(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_.-]*))(?:\s+with\s+(.+))?$"#,
    )
    .expect("sub-workflow regex is valid")
});

/// An action attached to a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateAction {
    /// The state the action belongs to
    pub state: StateId,
    /// Action text, trimmed
    pub text: String,
    /// 1-based line of the action
    pub line: usize,
}

impl StateAction {
    /// Create a state action
    pub fn new(state: impl Into<StateId>, text: impl Into<String>, line: usize) -> Self {
        Self {
            state: state.into(),
            text: text.into().trim().to_string(),
            line,
        }
    }
}

/// Produces the child-call facts of one workflow
pub trait CallScanner: Send + Sync + std::fmt::Debug {
    /// Scan the actions of `workflow`, returning calls ordered by line
    fn scan(&self, workflow: &WorkflowName, actions: &[StateAction]) -> Vec<ChildCallFact>;
}

/// Recognizes `Run workflow` and `Delegate to` actions
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionCallScanner;

impl ActionCallScanner {
    /// Parse one action text into the referenced child and how it was written
    pub fn parse_call(text: &str) -> Option<(WorkflowName, ReferenceKind)> {
        let captures = SUB_WORKFLOW_REGEX.captures(text.trim())?;

        if let Some(literal) = captures.get(1) {
            WorkflowName::try_new(literal.as_str())
                .ok()
                .map(|name| (name, ReferenceKind::StringLiteral))
        } else {
            captures
                .get(2)
                .and_then(|ident| WorkflowName::try_new(ident.as_str()).ok())
                .map(|name| (name, ReferenceKind::Identifier))
        }
    }
}

impl CallScanner for ActionCallScanner {
    fn scan(&self, workflow: &WorkflowName, actions: &[StateAction]) -> Vec<ChildCallFact> {
        let mut calls: Vec<ChildCallFact> = actions
            .iter()
            .filter_map(|action| {
                Self::parse_call(&action.text).map(|(child, kind)| {
                    ChildCallFact::new(child, kind, action.line, action.state.clone())
                })
            })
            .collect();

        calls.sort_by_key(|call| call.line);
        tracing::trace!("{} calls {} child workflow(s)", workflow, calls.len());
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_literal_call() {
        let (name, kind) =
            ActionCallScanner::parse_call(r#"Run workflow "validation-workflow""#).unwrap();
        assert_eq!(name.as_str(), "validation-workflow");
        assert_eq!(kind, ReferenceKind::StringLiteral);

        let (name, _) = ActionCallScanner::parse_call(
            r#"Run workflow "analyze code" with file="test.rs" mode="strict""#,
        )
        .unwrap();
        assert_eq!(name.as_str(), "analyze code");

        let (name, kind) =
            ActionCallScanner::parse_call(r#"Delegate to "review" with input="${data}""#).unwrap();
        assert_eq!(name.as_str(), "review");
        assert_eq!(kind, ReferenceKind::StringLiteral);
    }

    #[test]
    fn test_parse_identifier_call() {
        let (name, kind) = ActionCallScanner::parse_call("run workflow build_all").unwrap();
        assert_eq!(name.as_str(), "build_all");
        assert_eq!(kind, ReferenceKind::Identifier);

        let (name, kind) = ActionCallScanner::parse_call("Delegate lint").unwrap();
        assert_eq!(name.as_str(), "lint");
        assert_eq!(kind, ReferenceKind::Identifier);
    }

    #[test]
    fn test_non_call_actions_are_ignored() {
        assert!(ActionCallScanner::parse_call(r#"Log "running workflow""#).is_none());
        assert!(ActionCallScanner::parse_call(r#"Execute prompt "build""#).is_none());
        assert!(ActionCallScanner::parse_call("Run workflow").is_none());
    }

    #[test]
    fn test_scan_orders_calls_by_line() {
        let actions = vec![
            StateAction::new("Deploy", r#"Run workflow "deploy-app""#, 20),
            StateAction::new("Start", r#"Log "hello""#, 4),
            StateAction::new("Build", "Run workflow build", 12),
        ];

        let calls = ActionCallScanner.scan(&WorkflowName::new("release"), &actions);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].child.as_str(), "build");
        assert_eq!(calls[0].state.as_str(), "Build");
        assert_eq!(calls[0].call_site.as_str(), "build@L12");
        assert_eq!(calls[1].child.as_str(), "deploy-app");
        assert_eq!(calls[1].line, 20);
    }
}
