//! Depth-first call graph construction with cycle detection

use crate::callgraph::resolver::{resolve_child, GraphError, GraphResult, ResolutionContext};
use crate::callgraph::{CallEdge, CallGraphNode, EdgeTarget, NodeId, WorkflowCallGraph};
use crate::common::Deadline;
use crate::config::MissingChildPolicy;
use crate::workflow::{WorkflowDefinition, WorkflowIndex, WorkflowName};
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Workflows on the current root-to-node walk, in traversal order
#[derive(Debug, Default)]
struct AncestorChain {
    names: Vec<WorkflowName>,
}

impl AncestorChain {
    /// Push `name` for the lifetime of the returned guard
    fn enter(&mut self, name: WorkflowName) -> AncestorGuard<'_> {
        self.names.push(name);
        AncestorGuard { chain: self }
    }

    fn contains(&self, name: &WorkflowName) -> bool {
        self.names.contains(name)
    }

    /// The chain extended by the repeated workflow
    fn closed_by(&self, repeated: &WorkflowName) -> Vec<WorkflowName> {
        let mut chain = self.names.clone();
        chain.push(repeated.clone());
        chain
    }
}

/// Pops its workflow off the chain when dropped, on success and error alike
struct AncestorGuard<'a> {
    chain: &'a mut AncestorChain,
}

impl Deref for AncestorGuard<'_> {
    type Target = AncestorChain;

    fn deref(&self) -> &AncestorChain {
        self.chain
    }
}

impl DerefMut for AncestorGuard<'_> {
    fn deref_mut(&mut self) -> &mut AncestorChain {
        self.chain
    }
}

impl Drop for AncestorGuard<'_> {
    fn drop(&mut self) {
        self.chain.names.pop();
    }
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<CallGraphNode>,
    by_name: HashMap<WorkflowName, NodeId>,
    max_depth_reached: usize,
}

impl Arena {
    fn reserve(&mut self, definition: Arc<WorkflowDefinition>, depth: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_name.insert(definition.name.clone(), id);
        self.max_depth_reached = self.max_depth_reached.max(depth);
        self.nodes.push(CallGraphNode {
            id,
            definition,
            depth,
            edges: Vec::new(),
        });
        id
    }
}

/// Builds a [`WorkflowCallGraph`] from a root workflow
#[derive(Debug)]
pub struct CallGraphBuilder<'a> {
    index: &'a WorkflowIndex,
    max_depth: usize,
    policy: MissingChildPolicy,
    deadline: Deadline,
}

impl<'a> CallGraphBuilder<'a> {
    /// Create a builder over `index`
    pub fn new(index: &'a WorkflowIndex, max_depth: usize, policy: MissingChildPolicy) -> Self {
        Self {
            index,
            max_depth,
            policy,
            deadline: Deadline::none(),
        }
    }

    /// Bound filesystem searches by `deadline`
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve `root` and every child reachable within the depth ceiling
    ///
    /// Fails on the first cycle, and on the first unresolvable child unless the
    /// missing-child policy is `mark`. Nothing partial is returned on failure.
    pub fn build_graph(&self, root: &WorkflowName) -> GraphResult<WorkflowCallGraph> {
        let definition = self.index.resolve(root)?;
        let mut arena = Arena::default();
        let mut chain = AncestorChain::default();

        let root_id = self.visit(definition, 0, &mut chain, &mut arena)?;
        debug_assert!(chain.names.is_empty());

        tracing::info!(
            "Built call graph for '{}': {} node(s), depth {} of {}",
            root,
            arena.nodes.len(),
            arena.max_depth_reached,
            self.max_depth
        );

        Ok(WorkflowCallGraph {
            nodes: arena.nodes,
            by_name: arena.by_name,
            root: root_id,
            max_depth_reached: arena.max_depth_reached,
            max_depth: self.max_depth,
        })
    }

    fn visit(
        &self,
        definition: Arc<WorkflowDefinition>,
        depth: usize,
        chain: &mut AncestorChain,
        arena: &mut Arena,
    ) -> GraphResult<NodeId> {
        let id = arena.reserve(Arc::clone(&definition), depth);
        let mut ancestors = chain.enter(definition.name.clone());
        let scope = self.index.load_file(&definition.location.path)?;
        let ctx = ResolutionContext {
            index: self.index,
            scope: &scope,
            deadline: &self.deadline,
        };

        let mut edges = Vec::with_capacity(definition.calls.len());
        for call in &definition.calls {
            if depth >= self.max_depth {
                // Unexpanded calls are never resolved, so only the referenced name is checked
                if ancestors.contains(&call.child) {
                    return Err(GraphError::CircularWorkflow {
                        full_chain: ancestors.closed_by(&call.child),
                    });
                }
                tracing::debug!(
                    "'{}' at depth {} leaves '{}' unexpanded",
                    definition.name,
                    depth,
                    call.child
                );
                edges.push(CallEdge {
                    call: call.clone(),
                    target: EdgeTarget::Unexpanded,
                    tier: None,
                });
                continue;
            }

            let resolution = match resolve_child(&ctx, call, &definition.name) {
                Ok(resolution) => resolution,
                Err(GraphError::ChildWorkflowNotFound {
                    searched_locations, ..
                }) if self.policy == MissingChildPolicy::Mark => {
                    tracing::warn!(
                        "'{}' called by '{}' at line {} not found; marked unresolved",
                        call.child,
                        definition.name,
                        call.line
                    );
                    edges.push(CallEdge {
                        call: call.clone(),
                        target: EdgeTarget::Unresolved { searched_locations },
                        tier: None,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            // An import alias can resolve to a differently named workflow
            let child_name = resolution.definition.name.clone();
            if ancestors.contains(&child_name) {
                return Err(GraphError::CircularWorkflow {
                    full_chain: ancestors.closed_by(&child_name),
                });
            }

            let child_id = match arena.by_name.get(&child_name).copied() {
                Some(existing) => {
                    ensure_no_cycle_through(existing, &ancestors, arena)?;
                    existing
                }
                None => self.visit(resolution.definition, depth + 1, &mut ancestors, arena)?,
            };

            edges.push(CallEdge {
                call: call.clone(),
                target: EdgeTarget::Resolved(child_id),
                tier: Some(resolution.tier),
            });
        }

        arena.nodes[id.0].edges = edges;
        Ok(id)
    }
}

/// Check the descendants of a shared node against the active ancestors
///
/// Resolved edges are compared by resolved name and followed; unexpanded edges are
/// compared by referenced name, matching the check made when they were recorded.
fn ensure_no_cycle_through(
    start: NodeId,
    ancestors: &AncestorChain,
    arena: &Arena,
) -> GraphResult<()> {
    let mut stack = vec![(start, vec![arena.nodes[start.0].definition.name.clone()])];
    let mut seen = HashSet::new();

    while let Some((id, path)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for edge in &arena.nodes[id.0].edges {
            let (name, child) = match edge.target {
                EdgeTarget::Resolved(child) => (&arena.nodes[child.0].definition.name, Some(child)),
                EdgeTarget::Unexpanded => (&edge.call.child, None),
                EdgeTarget::Unresolved { .. } => continue,
            };
            let mut next = path.clone();
            next.push(name.clone());
            if ancestors.contains(name) {
                let mut full_chain = ancestors.names.clone();
                full_chain.extend(next);
                return Err(GraphError::CircularWorkflow { full_chain });
            }
            if let Some(child) = child {
                stack.push((child, next));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::ResolutionTier;
    use crate::test_helpers::FixtureDir;

    fn build(fixture: &FixtureDir, root: &str, depth: usize) -> GraphResult<WorkflowCallGraph> {
        let index = fixture.index();
        CallGraphBuilder::new(&index, depth, MissingChildPolicy::Fail)
            .build_graph(&WorkflowName::new(root))
    }

    fn names(chain: &[WorkflowName]) -> Vec<&str> {
        chain.iter().map(WorkflowName::as_str).collect()
    }

    #[test]
    fn test_ancestor_guard_pops_on_drop() {
        let mut chain = AncestorChain::default();
        {
            let mut outer = chain.enter(WorkflowName::new("a"));
            {
                let inner = outer.enter(WorkflowName::new("b"));
                assert!(inner.contains(&WorkflowName::new("a")));
                assert!(inner.contains(&WorkflowName::new("b")));
            }
            assert!(!outer.contains(&WorkflowName::new("b")));
        }
        assert!(chain.names.is_empty());
    }

    #[test]
    fn test_single_workflow_graph() {
        let fixture = FixtureDir::new();
        fixture.workflow("solo", 2, &[]);

        let graph = build(&fixture, "solo", 2).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.root().name().as_str(), "solo");
        assert_eq!(graph.max_depth_reached(), 0);
    }

    #[test]
    fn test_first_visit_depths() {
        let fixture = FixtureDir::new();
        fixture.workflow("a", 0, &["b", "c"]);
        fixture.workflow("b", 0, &["c"]);
        fixture.workflow("c", 0, &[]);

        let graph = build(&fixture, "a", 3).unwrap();
        let depth = |n: &str| graph.node_by_name(&WorkflowName::new(n)).unwrap().depth;

        assert_eq!(depth("a"), 0);
        assert_eq!(depth("b"), 1);
        // c is first reached through b
        assert_eq!(depth("c"), 2);
        assert_eq!(graph.max_depth_reached(), 2);
    }

    #[test]
    fn test_shared_child_is_one_node() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 0, &["left", "right"]);
        fixture.workflow("left", 0, &["shared"]);
        fixture.workflow("right", 1, &["shared"]);
        fixture.workflow("shared", 1, &[]);

        let graph = build(&fixture, "root", 2).unwrap();
        let shared = graph.node_id(&WorkflowName::new("shared")).unwrap();
        let left = graph.node_by_name(&WorkflowName::new("left")).unwrap();
        let right = graph.node_by_name(&WorkflowName::new("right")).unwrap();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(left.children().collect::<Vec<_>>(), vec![shared]);
        assert_eq!(right.children().collect::<Vec<_>>(), vec![shared]);
        assert_eq!(graph.parents_of(shared).len(), 2);
    }

    #[test]
    fn test_cycle_reports_full_chain() {
        let fixture = FixtureDir::new();
        fixture.workflow("A", 0, &["B"]);
        fixture.workflow("B", 0, &["C"]);
        fixture.workflow("C", 0, &["B"]);

        let err = build(&fixture, "A", 2).unwrap_err();
        match err {
            GraphError::CircularWorkflow { full_chain } => {
                assert_eq!(names(&full_chain), vec!["A", "B", "C", "B"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_call_is_a_cycle() {
        let fixture = FixtureDir::new();
        fixture.workflow("loop", 0, &["loop"]);

        let err = build(&fixture, "loop", 2).unwrap_err();
        assert!(matches!(err, GraphError::CircularWorkflow { ref full_chain } if full_chain.len() == 2));
    }

    #[test]
    fn test_depth_ceiling_leaves_grandchild_unexpanded() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 0, &["child"]);
        // grandchild does not exist anywhere
        fixture.workflow("child", 1, &["grandchild"]);

        let graph = build(&fixture, "root", 1).unwrap();
        let child = graph.node_by_name(&WorkflowName::new("child")).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert!(child.is_truncated());
        assert_eq!(child.edges[0].target, EdgeTarget::Unexpanded);
        assert_eq!(child.edges[0].call.child.as_str(), "grandchild");
        assert!(graph.node_id(&WorkflowName::new("grandchild")).is_none());
    }

    #[test]
    fn test_depth_zero_keeps_only_root() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 1, &["child"]);

        let graph = build(&fixture, "root", 0).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(graph.root().is_truncated());
    }

    #[test]
    fn test_missing_child_fails_by_default() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 0, &["ghost", "real"]);
        fixture.workflow("real", 0, &[]);

        let err = build(&fixture, "root", 2).unwrap_err();
        assert!(matches!(
            err,
            GraphError::ChildWorkflowNotFound { ref attempted_name, .. } if attempted_name.as_str() == "ghost"
        ));
    }

    #[test]
    fn test_missing_child_marked_when_policy_is_mark() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 0, &["ghost", "real"]);
        fixture.workflow("real", 0, &[]);
        let index = fixture.index();

        let graph = CallGraphBuilder::new(&index, 2, MissingChildPolicy::Mark)
            .build_graph(&WorkflowName::new("root"))
            .unwrap();

        let root = graph.root();
        assert!(matches!(root.edges[0].target, EdgeTarget::Unresolved { .. }));
        assert!(matches!(root.edges[1].target, EdgeTarget::Resolved(_)));
        assert_eq!(root.edges[1].tier, Some(ResolutionTier::FilesystemSearch));
    }

    #[test]
    fn test_cycle_visible_by_name_at_depth_ceiling() {
        let fixture = FixtureDir::new();
        fixture.workflow("A", 0, &["B"]);
        fixture.workflow("B", 0, &["A"]);

        let err = build(&fixture, "A", 1).unwrap_err();
        match err {
            GraphError::CircularWorkflow { full_chain } => {
                assert_eq!(names(&full_chain), vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_import_alias_named_like_ancestor_is_not_a_cycle() {
        let fixture = FixtureDir::new();
        fixture.workflow("build", 0, &["helper"]);
        fixture.workflow("compile", 0, &[]);
        fixture.write(
            "helper.md",
            "---\nname: helper\nimports:\n  build: compile.md\n---\n\n```mermaid\nstateDiagram-v2\n    [*] --> C1\n    C1 --> [*]\n```\n\n## Actions\n\n- C1: Run workflow \"build\"\n",
        );

        let graph = build(&fixture, "build", 2).unwrap();
        let helper = graph.node_by_name(&WorkflowName::new("helper")).unwrap();
        let compile = graph.node_id(&WorkflowName::new("compile")).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(helper.edges[0].target, EdgeTarget::Resolved(compile));
        assert_eq!(helper.edges[0].tier, Some(ResolutionTier::ImportTracked));
    }

    #[test]
    fn test_shared_node_unexpanded_call_closing_a_cycle() {
        let fixture = FixtureDir::new();
        fixture.workflow("root", 0, &["x", "y"]);
        fixture.workflow("x", 0, &["s"]);
        fixture.workflow("y", 0, &["s"]);
        // s is first built at the ceiling through x, so its call to y stays unexpanded
        fixture.workflow("s", 0, &["y"]);

        let err = build(&fixture, "root", 2).unwrap_err();
        match err {
            GraphError::CircularWorkflow { full_chain } => {
                assert_eq!(names(&full_chain), vec!["root", "y", "s", "y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_root_is_an_index_error() {
        let fixture = FixtureDir::new();
        fixture.workflow("present", 0, &[]);

        let err = build(&fixture, "absent", 2).unwrap_err();
        assert!(matches!(err, GraphError::Index(_)));
    }
}
