//! State identifiers and the per-diagram state table used to find decision points

use crate::workflow::definition::DecisionPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The start/end pseudo-state of a Mermaid state diagram
pub const TERMINAL_MARKER: &str = "[*]";

/// Types of workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StateType {
    /// Normal workflow state
    #[default]
    Normal,
    /// Fork state for parallel execution
    Fork,
    /// Join state for merging parallel branches
    Join,
    /// Choice state for conditional branching
    Choice,
}

impl StateType {
    /// Map a Mermaid stereotype (`choice`, `fork`, `join`) to a state type
    pub fn from_stereotype(stereotype: &str) -> Self {
        match stereotype.trim().to_ascii_lowercase().as_str() {
            "choice" => StateType::Choice,
            "fork" => StateType::Fork,
            "join" => StateType::Join,
            _ => StateType::Normal,
        }
    }
}

/// Errors that can occur when creating state-related types
#[derive(Debug, Error)]
pub enum StateError {
    /// State ID cannot be empty or whitespace only
    #[error("State ID cannot be empty or whitespace only")]
    EmptyStateId,
}

/// Unique identifier for workflow states
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    /// Create a new state ID
    ///
    /// # Panics
    /// Panics if the ID is empty or whitespace only. For non-panicking creation,
    /// use `try_new` instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self::try_new(id).expect("State ID cannot be empty or whitespace only")
    }

    /// Create a new state ID, returning an error for invalid input
    pub fn try_new(id: impl Into<String>) -> Result<Self, StateError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StateError::EmptyStateId);
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `[*]` pseudo-state
    pub fn is_terminal(&self) -> bool {
        self.0 == TERMINAL_MARKER
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct StateEntry {
    state_type: StateType,
    first_line: usize,
    targets: Vec<StateId>,
}

/// States and transitions of one diagram, in the order they were seen
#[derive(Debug, Default)]
pub struct StateTable {
    entries: HashMap<StateId, StateEntry>,
}

impl StateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, state: &StateId, line: usize) -> &mut StateEntry {
        self.entries
            .entry(state.clone())
            .or_insert_with(|| StateEntry {
                first_line: line,
                ..Default::default()
            })
    }

    /// Record a state declaration; a stereotype overrides any earlier type
    pub fn declare(&mut self, state: &StateId, state_type: StateType, line: usize) {
        if state.is_terminal() {
            return;
        }
        let entry = self.touch(state, line);
        if state_type != StateType::Normal {
            entry.state_type = state_type;
        }
    }

    /// Record a transition `from --> to`
    pub fn transition(&mut self, from: &StateId, to: &StateId, line: usize) {
        if !to.is_terminal() {
            self.touch(to, line);
        }
        if from.is_terminal() {
            return;
        }
        let entry = self.touch(from, line);
        if !entry.targets.contains(to) {
            entry.targets.push(to.clone());
        }
    }

    /// Number of distinct states (excluding `[*]`)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no state has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decision points ordered by first appearance
    ///
    /// A state is a decision when it is declared `<<choice>>` or has two or more
    /// distinct outgoing targets (`[*]` included). Fork states never are.
    pub fn decision_points(&self) -> Vec<DecisionPoint> {
        let mut decisions: Vec<DecisionPoint> = self
            .entries
            .iter()
            .filter(|(_, entry)| match entry.state_type {
                StateType::Fork => false,
                StateType::Choice => true,
                StateType::Normal | StateType::Join => entry.targets.len() >= 2,
            })
            .map(|(state, entry)| DecisionPoint {
                state: state.clone(),
                line: entry.first_line,
                true_branch: entry.targets.first().cloned(),
                false_branch: entry.targets.get(1).cloned(),
            })
            .collect();

        decisions.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.state.cmp(&b.state)));
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_id_creation() {
        let id1 = StateId::new("start");
        let id2: StateId = "start".into();
        assert_eq!(id1, id2);
        assert!(StateId::try_new(" ").is_err());
        assert!(StateId::new(TERMINAL_MARKER).is_terminal());
    }

    #[test]
    fn test_stereotypes() {
        assert_eq!(StateType::from_stereotype("choice"), StateType::Choice);
        assert_eq!(StateType::from_stereotype("FORK"), StateType::Fork);
        assert_eq!(StateType::from_stereotype("join"), StateType::Join);
        assert_eq!(StateType::from_stereotype("note"), StateType::Normal);
    }

    #[test]
    fn test_two_targets_make_a_decision() {
        let mut table = StateTable::new();
        table.transition(&"[*]".into(), &"Check".into(), 2);
        table.transition(&"Check".into(), &"Build".into(), 3);
        table.transition(&"Check".into(), &"[*]".into(), 4);
        table.transition(&"Build".into(), &"[*]".into(), 5);

        let decisions = table.decision_points();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].state.as_str(), "Check");
        assert_eq!(decisions[0].line, 2);
        assert_eq!(decisions[0].true_branch, Some(StateId::new("Build")));
        assert_eq!(decisions[0].false_branch, Some(StateId::new("[*]")));
    }

    #[test]
    fn test_repeated_transition_is_not_a_branch() {
        let mut table = StateTable::new();
        table.transition(&"A".into(), &"B".into(), 1);
        table.transition(&"A".into(), &"B".into(), 2);
        assert!(table.decision_points().is_empty());
    }

    #[test]
    fn test_fork_is_never_a_decision_and_choice_always_is() {
        let mut table = StateTable::new();
        table.declare(&"F".into(), StateType::Fork, 1);
        table.declare(&"C".into(), StateType::Choice, 2);
        table.transition(&"F".into(), &"X".into(), 3);
        table.transition(&"F".into(), &"Y".into(), 4);
        table.transition(&"C".into(), &"X".into(), 5);

        let decisions = table.decision_points();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].state.as_str(), "C");
        assert_eq!(decisions[0].false_branch, None);
    }

    #[test]
    fn test_decisions_are_ordered_by_first_appearance() {
        let mut table = StateTable::new();
        table.transition(&"Late".into(), &"X".into(), 10);
        table.transition(&"Late".into(), &"Y".into(), 11);
        table.declare(&"Early".into(), StateType::Choice, 3);

        let order: Vec<_> = table
            .decision_points()
            .into_iter()
            .map(|d| d.state.to_string())
            .collect();
        assert_eq!(order, vec!["Early", "Late"]);
    }
}
