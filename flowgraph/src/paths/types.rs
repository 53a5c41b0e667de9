//! Expanded path types handed to renderers

use crate::config::ConfigError;
use crate::paths::LocalPath;
use crate::workflow::{CallSiteId, StateId, WorkflowName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a child's paths combine with its parent's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionMode {
    /// Children are atomic markers; path count equals the root's
    #[default]
    Reference,
    /// Children's paths are substituted in; path count is the full product
    Inline,
    /// Like reference for counting, with children drawn as nested regions
    Subgraph,
}

impl ExpansionMode {
    /// Every mode, in declaration order
    pub const ALL: [ExpansionMode; 3] = [Self::Reference, Self::Inline, Self::Subgraph];

    /// Whether the mode needs local paths of workflows below the root
    pub fn walks_children(self) -> bool {
        match self {
            Self::Inline => true,
            Self::Reference | Self::Subgraph => false,
        }
    }

    /// Lowercase name of the mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Inline => "inline",
            Self::Subgraph => "subgraph",
        }
    }
}

impl fmt::Display for ExpansionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpansionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "mode".to_string(),
                value: s.to_string(),
                hint: "Expected one of: reference, inline, subgraph".to_string(),
            })
    }
}

/// One workflow and the local path taken through it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSegment {
    /// Workflow of the segment
    pub workflow: WorkflowName,
    /// Local path taken
    pub local_path: LocalPath,
}

/// Resolution state of a called child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    /// Resolved to a graph node
    Resolved,
    /// Beyond the depth ceiling
    Unexpanded,
    /// Not found (missing-child policy `mark`)
    Unresolved,
}

/// A child drawn as a nested region in subgraph mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedRegion {
    /// The child workflow
    pub workflow: WorkflowName,
    /// Call site in the enclosing workflow
    pub call_site: CallSiteId,
    /// Resolution state
    pub status: ChildStatus,
    /// Local path count of the child, when resolved (saturating)
    pub local_path_count: Option<u64>,
    /// The child's decision states in source order
    pub decision_states: Vec<StateId>,
    /// Regions of the child's own calls
    pub children: Vec<NestedRegion>,
}

impl NestedRegion {
    /// Whether the region or any region inside it stops at the depth ceiling
    pub fn is_truncated(&self) -> bool {
        self.status == ChildStatus::Unexpanded || self.children.iter().any(Self::is_truncated)
    }
}

/// Mode-specific payload of a transition marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    /// The child is an atomic node
    Reference {
        /// Resolution state of the child
        status: ChildStatus,
    },
    /// The child's segments follow in the path
    Inline {
        /// Index of the child's first segment
        first_segment: usize,
        /// Number of segments the child (with its own children) occupies
        segment_count: usize,
    },
    /// The child is drawn as a nested region
    Subgraph {
        /// The region to draw
        region: NestedRegion,
    },
}

/// Where a parent called a child within an expanded path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionMarker {
    /// Step in the parent's local path at which the call happens
    pub position: usize,
    /// Index of the parent's segment
    pub parent_segment: usize,
    /// Calling workflow
    pub parent: WorkflowName,
    /// Called workflow
    pub child: WorkflowName,
    /// Call site in the parent
    pub call_site: CallSiteId,
    /// Mode-specific payload
    #[serde(flatten)]
    pub kind: TransitionKind,
}

impl TransitionMarker {
    /// Move segment indices by `offset` when a fragment is embedded in a longer path
    pub(crate) fn shift(mut self, offset: usize) -> Self {
        self.parent_segment += offset;
        if let TransitionKind::Inline { first_segment, .. } = &mut self.kind {
            *first_segment += offset;
        }
        self
    }
}

/// Deterministic identifier of an expanded path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PathId(String);

impl PathId {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One end-to-end path through the call hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedPath {
    /// Deterministic identifier
    pub id: PathId,
    /// Segments; the root's segment is first
    pub segments: Vec<PathSegment>,
    /// Calls in parent-then-call-site order
    pub transitions: Vec<TransitionMarker>,
}

impl ExpandedPath {
    /// The root workflow's segment
    pub fn root_segment(&self) -> &PathSegment {
        &self.segments[0]
    }

    /// Markers whose parent is segment `index`, in call-site order
    pub fn transitions_from(&self, index: usize) -> impl Iterator<Item = &TransitionMarker> {
        self.transitions
            .iter()
            .filter(move |marker| marker.parent_segment == index)
    }
}
