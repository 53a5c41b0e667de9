//! Call graph arena types

use crate::callgraph::ResolutionTier;
use crate::workflow::{ChildCallFact, WorkflowDefinition, WorkflowName};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Index of a node in a [`WorkflowCallGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a call edge points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    /// The child was resolved to a node of this graph
    Resolved(NodeId),
    /// The caller sits at the depth ceiling; the child was not resolved
    Unexpanded,
    /// No tier could find the child (missing-child policy `mark`)
    Unresolved {
        /// Locations examined by the resolver
        searched_locations: Vec<PathBuf>,
    },
}

/// One call site and where it leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    /// The call as found in the parent
    pub call: ChildCallFact,
    /// Resolution outcome
    pub target: EdgeTarget,
    /// The tier that resolved the child, for resolved edges
    pub tier: Option<ResolutionTier>,
}

impl CallEdge {
    /// The resolved child node, if any
    pub fn resolved(&self) -> Option<NodeId> {
        match self.target {
            EdgeTarget::Resolved(id) => Some(id),
            EdgeTarget::Unexpanded | EdgeTarget::Unresolved { .. } => None,
        }
    }
}

/// A workflow in the call graph
#[derive(Debug, Clone, Serialize)]
pub struct CallGraphNode {
    /// Arena index
    pub id: NodeId,
    /// The parsed workflow
    pub definition: Arc<WorkflowDefinition>,
    /// Depth of the first visit (root is 0)
    pub depth: usize,
    /// Call edges in call-site order
    pub edges: Vec<CallEdge>,
}

impl CallGraphNode {
    /// Workflow name
    pub fn name(&self) -> &WorkflowName {
        &self.definition.name
    }

    /// Whether any call of this node was left unexpanded by the depth ceiling
    pub fn is_truncated(&self) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.target == EdgeTarget::Unexpanded)
    }

    /// Resolved children in call-site order (a child called twice appears twice)
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().filter_map(CallEdge::resolved)
    }
}

/// Call graph rooted at one workflow
///
/// Nodes live in an arena and refer to each other by [`NodeId`]; a workflow called
/// from several parents is a single node with several in-edges.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowCallGraph {
    pub(crate) nodes: Vec<CallGraphNode>,
    #[serde(skip)]
    pub(crate) by_name: HashMap<WorkflowName, NodeId>,
    pub(crate) root: NodeId,
    pub(crate) max_depth_reached: usize,
    pub(crate) max_depth: usize,
}

impl WorkflowCallGraph {
    /// The root node
    pub fn root(&self) -> &CallGraphNode {
        &self.nodes[self.root.0]
    }

    /// Id of the root node
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Node by id
    ///
    /// # Panics
    /// Panics if `id` does not belong to this graph.
    pub fn node(&self, id: NodeId) -> &CallGraphNode {
        &self.nodes[id.0]
    }

    /// Node by id, if it belongs to this graph
    pub fn get(&self, id: NodeId) -> Option<&CallGraphNode> {
        self.nodes.get(id.0)
    }

    /// Id of the node for a workflow name
    pub fn node_id(&self, name: &WorkflowName) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Node for a workflow name
    pub fn node_by_name(&self, name: &WorkflowName) -> Option<&CallGraphNode> {
        self.node_id(name).map(|id| self.node(id))
    }

    /// All nodes in first-visit order
    pub fn nodes(&self) -> &[CallGraphNode] {
        &self.nodes
    }

    /// Total node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest first-visit depth of any node
    pub fn max_depth_reached(&self) -> usize {
        self.max_depth_reached
    }

    /// Depth ceiling the graph was built with
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Nodes with at least one resolved edge to `id`, in first-visit order
    pub fn parents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.children().any(|child| child == id))
            .map(|node| node.id)
            .collect()
    }

    /// Whether any node was truncated by the depth ceiling
    pub fn is_truncated(&self) -> bool {
        self.nodes.iter().any(CallGraphNode::is_truncated)
    }
}
