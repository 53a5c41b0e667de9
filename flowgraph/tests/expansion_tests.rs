//! End-to-end expansion through the analyzer


use flowgraph::{
    ChildStatus, ExpansionError, ExpansionMode, FlowgraphError, RenderFormat, TransitionKind,
    WorkflowAnalyzer, WorkflowName,
};
use std::collections::HashSet;
use test_helpers::Workspace;

fn parent_and_child() -> Workspace {
    let workspace = Workspace::new();
    workspace.workflow("parent", 1, &["child"]);
    workspace.workflow("child", 1, &[]);
    workspace
}

fn path_ids(report: &flowgraph::AnalysisReport) -> Vec<String> {
    report.paths.iter().map(|p| p.id.to_string()).collect()
}

#[test]
fn test_inline_product_of_two_by_two() -> anyhow::Result<()> {
    let workspace = parent_and_child();
    let analyzer = WorkflowAnalyzer::new(workspace.config().with_mode(ExpansionMode::Inline))?;

    let report = analyzer.analyze(&WorkflowName::new("parent"))?;
    let ids = path_ids(&report);

    assert_eq!(ids.len(), 4);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
    assert_eq!(ids[0], "parent[T]{child[T]}");
    assert_eq!(ids[3], "parent[F]{child[F]}");
    Ok(())
}

#[test]
fn test_inline_ceiling_fails_before_materializing() -> anyhow::Result<()> {
    let workspace = parent_and_child();
    let analyzer = WorkflowAnalyzer::new(
        workspace
            .config()
            .with_mode(ExpansionMode::Inline)
            .with_max_paths(3),
    )?;

    let err = analyzer.analyze(&WorkflowName::new("parent")).unwrap_err();
    assert!(matches!(
        err,
        FlowgraphError::Expansion(ExpansionError::PathExplosion {
            computed_total: 4,
            limit: 3
        })
    ));
    assert!(err.to_string().contains("4 paths, limit is 3"));
    Ok(())
}

#[test]
fn test_reference_counts_parent_paths_only() -> anyhow::Result<()> {
    let workspace = Workspace::new();
    workspace.workflow("parent", 1, &["child"]);
    workspace.workflow("child", 5, &[]);

    let analyzer = WorkflowAnalyzer::new(workspace.config())?;
    let report = analyzer.analyze(&WorkflowName::new("parent"))?;

    assert_eq!(path_ids(&report), vec!["parent[T]", "parent[F]"]);
    for path in &report.paths {
        assert_eq!(path.segments.len(), 1);
        assert!(matches!(
            path.transitions[0].kind,
            TransitionKind::Reference {
                status: ChildStatus::Resolved
            }
        ));
    }
    Ok(())
}

#[test]
fn test_subgraph_counts_like_reference_and_nests_regions() -> anyhow::Result<()> {
    let workspace = Workspace::new();
    workspace.workflow("parent", 1, &["child"]);
    workspace.workflow("child", 2, &["leaf"]);
    workspace.workflow("leaf", 0, &[]);

    let analyzer = WorkflowAnalyzer::new(workspace.config().with_mode(ExpansionMode::Subgraph))?;
    let report = analyzer.analyze(&WorkflowName::new("parent"))?;

    assert_eq!(report.paths.len(), 2);
    match &report.paths[0].transitions[0].kind {
        TransitionKind::Subgraph { region } => {
            assert_eq!(region.workflow.as_str(), "child");
            assert_eq!(region.local_path_count, Some(4));
            assert_eq!(region.decision_states.len(), 2);
            assert_eq!(region.children[0].workflow.as_str(), "leaf");
            assert!(!region.is_truncated());
        }
        other => panic!("expected a subgraph marker, got {other:?}"),
    }
    assert!(report.diagram.contains("child (4 local paths)"));
    Ok(())
}

#[test]
fn test_oversized_workflow_is_rejected_without_enumeration() -> anyhow::Result<()> {
    let workspace = Workspace::new();
    workspace.workflow("huge", 20, &[]);

    let analyzer = WorkflowAnalyzer::new(workspace.config())?;
    match analyzer.analyze(&WorkflowName::new("huge")) {
        Err(FlowgraphError::Expansion(ExpansionError::PathExplosion {
            computed_total,
            limit,
        })) => {
            assert_eq!(computed_total, 1 << 20);
            assert_eq!(limit, 10_000);
        }
        other => panic!("expected path explosion, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_repeated_analysis_is_identical() -> anyhow::Result<()> {
    let workspace = Workspace::new();
    workspace.workflow("deploy", 2, &["build", "verify"]);
    workspace.workflow("build", 1, &["lint"]);
    workspace.workflow("verify", 1, &[]);
    workspace.workflow("lint", 1, &[]);

    let config = workspace.config().with_mode(ExpansionMode::Inline).with_max_depth(3);
    let first = WorkflowAnalyzer::new(config.clone())?.analyze(&WorkflowName::new("deploy"))?;
    let second = WorkflowAnalyzer::new(config)?.analyze(&WorkflowName::new("deploy"))?;

    assert_eq!(first.paths.len(), 4 * 4 * 2);
    assert_eq!(path_ids(&first), path_ids(&second));
    assert_eq!(first.diagram, second.diagram);
    Ok(())
}

#[test]
fn test_call_position_follows_preceding_decisions() -> anyhow::Result<()> {
    let workspace = Workspace::new();
    workspace.workflow("deploy", 3, &["notify"]);
    workspace.workflow("notify", 0, &[]);

    let report = WorkflowAnalyzer::new(workspace.config())?.analyze(&WorkflowName::new("deploy"))?;

    assert_eq!(report.paths[0].transitions[0].position, 3);
    let call = &report.graph.root().definition.calls[0];
    assert_eq!(report.paths[0].transitions[0].call_site, call.call_site);
    Ok(())
}

#[test]
fn test_json_output_round_trips_through_serde() -> anyhow::Result<()> {
    let workspace = parent_and_child();
    let analyzer = WorkflowAnalyzer::new(workspace.config().with_mode(ExpansionMode::Inline))?
        .with_renderer(RenderFormat::Json.renderer());

    let report = analyzer.analyze(&WorkflowName::new("parent"))?;
    let json: serde_json::Value = serde_json::from_str(&report.diagram)?;

    assert_eq!(json["path_count"], 4);
    assert_eq!(json["paths"][1]["id"], "parent[T]{child[F]}");
    assert_eq!(json["paths"][1]["segments"][1]["workflow"], "child");
    Ok(())
}
