//! Property tests over generated workflow trees


use flowgraph::{ExpansionMode, LocalPathEnumerator, WorkflowAnalyzer, WorkflowIndex, WorkflowName};
use proptest::prelude::*;
use std::collections::HashSet;
use test_helpers::Workspace;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn local_paths_are_complete_and_stable(decisions in 0usize..9) {
        let workspace = Workspace::new();
        workspace.workflow("subject", decisions, &[]);
        let index: WorkflowIndex = workspace.index();
        let definition = index.resolve(&WorkflowName::new("subject")).unwrap();

        let enumerator = LocalPathEnumerator::new(1 << 12);
        let first = enumerator.enumerate(&definition).unwrap();
        let second = enumerator.enumerate(&definition).unwrap();

        prop_assert_eq!(first.len(), 1usize << decisions);
        let distinct: HashSet<String> = first.iter().map(|p| p.id()).collect();
        prop_assert_eq!(distinct.len(), first.len());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn inline_count_is_product_of_children(
        root_decisions in 0usize..3,
        child_decisions in proptest::collection::vec(0usize..3, 0..4),
    ) {
        let workspace = Workspace::new();
        let children: Vec<String> = (0..child_decisions.len()).map(|i| format!("child{i}")).collect();
        let refs: Vec<&str> = children.iter().map(String::as_str).collect();
        workspace.workflow("root", root_decisions, &refs);
        for (name, decisions) in children.iter().zip(&child_decisions) {
            workspace.workflow(name, *decisions, &[]);
        }

        let analyzer = WorkflowAnalyzer::new(workspace.config().with_mode(ExpansionMode::Inline)).unwrap();
        let report = analyzer.analyze(&WorkflowName::new("root")).unwrap();

        let expected = child_decisions
            .iter()
            .fold(1usize << root_decisions, |total, d| total * (1 << d));
        prop_assert_eq!(report.paths.len(), expected);

        let distinct: HashSet<String> = report.paths.iter().map(|p| p.id.to_string()).collect();
        prop_assert_eq!(distinct.len(), expected);
    }
}
