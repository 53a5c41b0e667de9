//! End-to-end tests of the flowgraph binary

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn workflow(name: &str, decisions: usize, calls: &[&str]) -> String {
    let mut lines = vec!["stateDiagram-v2".to_string()];
    let mut previous = "[*]".to_string();
    for i in 1..=decisions {
        lines.push(format!("    state Gate{i} <<choice>>"));
        lines.push(format!("    {previous} --> Gate{i}"));
        lines.push(format!("    Gate{i} --> Yes{i}"));
        lines.push(format!("    Gate{i} --> No{i}"));
        lines.push(format!("    Yes{i} --> Done{i}"));
        lines.push(format!("    No{i} --> Done{i}"));
        previous = format!("Done{i}");
    }
    for (i, child) in calls.iter().enumerate() {
        lines.push(format!("    {previous} --> Run{i}"));
        lines.push(format!("    Run{i}: Run workflow \"{child}\""));
        previous = format!("Run{i}");
    }
    lines.push(format!("    {previous} --> [*]"));
    format!("---\nname: {name}\n---\n\n```mermaid\n{}\n```\n", lines.join("\n"))
}

fn setup(workflows: &[(&str, usize, &[&str])]) -> Result<TempDir> {
    let dir = TempDir::new()?;
    for (name, decisions, calls) in workflows {
        std::fs::write(dir.path().join(format!("{name}.md")), workflow(name, *decisions, calls))?;
    }
    Ok(dir)
}

/// The binary run inside `dir`, isolated from any user configuration
fn flowgraph(dir: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("flowgraph")?;
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("NO_COLOR", "1")
        .env_remove("FLOWGRAPH_MODE")
        .env_remove("FLOWGRAPH_MAX_DEPTH")
        .env_remove("FLOWGRAPH_MAX_PATHS")
        .env_remove("FLOWGRAPH_SEARCH_ROOT");
    Ok(cmd)
}

#[test]
fn test_help() -> Result<()> {
    let dir = TempDir::new()?;
    flowgraph(dir.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("list"));
    Ok(())
}

#[test]
fn test_analyze_prints_mermaid() -> Result<()> {
    let dir = setup(&[("deploy", 1, &["build"]), ("build", 2, &[])])?;

    flowgraph(dir.path())?
        .args(["analyze", "deploy"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stateDiagram-v2"))
        .stdout(predicate::str::contains("state \"deploy[T]\" as p0"))
        .stdout(predicate::str::contains("call build"))
        .stderr(predicate::str::contains("2 path(s) for 'deploy' in reference mode"));
    Ok(())
}

#[test]
fn test_analyze_inline_json_to_file() -> Result<()> {
    let dir = setup(&[("deploy", 1, &["build"]), ("build", 2, &[])])?;
    let output = dir.path().join("paths.json");

    flowgraph(dir.path())?
        .args(["analyze", "deploy", "--mode", "inline", "--format", "json", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output)?)?;
    assert_eq!(json["path_count"], 8);
    assert_eq!(json["paths"][0]["id"], "deploy[T]{build[TT]}");
    Ok(())
}

#[test]
fn test_path_explosion_exits_with_validation_error() -> Result<()> {
    let dir = setup(&[("parent", 1, &["child"]), ("child", 1, &[])])?;

    flowgraph(dir.path())?
        .args(["analyze", "parent", "--mode", "inline", "--max-paths", "3"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("4 paths, limit is 3"));
    Ok(())
}

#[test]
fn test_cycle_exits_with_validation_error() -> Result<()> {
    let dir = setup(&[("a", 0, &["b"]), ("b", 0, &["c"]), ("c", 0, &["b"])])?;

    flowgraph(dir.path())?
        .args(["analyze", "a", "--depth", "5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Circular workflow dependency: a -> b -> c -> b"));
    Ok(())
}

#[test]
fn test_missing_child_fails_unless_allowed() -> Result<()> {
    let dir = setup(&[("deploy", 1, &["ghost"])])?;

    flowgraph(dir.path())?
        .args(["analyze", "deploy"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Child workflow 'ghost'"));

    flowgraph(dir.path())?
        .args(["analyze", "deploy", "--allow-missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unresolved: not found"));
    Ok(())
}

#[test]
fn test_environment_selects_mode() -> Result<()> {
    let dir = setup(&[("parent", 1, &["child"]), ("child", 1, &[])])?;

    flowgraph(dir.path())?
        .env("FLOWGRAPH_MODE", "inline")
        .args(["analyze", "parent"])
        .assert()
        .success()
        .stderr(predicate::str::contains("4 path(s) for 'parent' in inline mode"));
    Ok(())
}

#[test]
fn test_yaml_config_is_read_from_current_dir() -> Result<()> {
    let dir = setup(&[("parent", 1, &["child"]), ("child", 1, &[])])?;
    std::fs::write(dir.path().join("flowgraph.yaml"), "mode: subgraph\n")?;

    flowgraph(dir.path())?
        .args(["analyze", "parent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("child (2 local paths)"));
    Ok(())
}

#[test]
fn test_graph_tree_and_json() -> Result<()> {
    let dir = setup(&[("deploy", 0, &["build"]), ("build", 0, &[])])?;

    flowgraph(dir.path())?
        .args(["graph", "deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("└── build [filesystem search]"))
        .stdout(predicate::str::contains("2 workflow(s), depth 1 of 2"));

    let output = flowgraph(dir.path())?
        .args(["graph", "deploy", "--format", "json"])
        .output()?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_list_text_and_json() -> Result<()> {
    let dir = setup(&[("deploy", 2, &["build"]), ("build", 0, &[])])?;

    flowgraph(dir.path())?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy  2 decision(s), 1 call(s)"));

    let output = flowgraph(dir.path())?.args(["list", "--format", "json"]).output()?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json[0]["name"], "build");
    assert_eq!(json[1]["calls"][0], "build");
    Ok(())
}

#[test]
fn test_unknown_root_workflow() -> Result<()> {
    let dir = setup(&[("deploy", 0, &[])])?;

    flowgraph(dir.path())?
        .args(["analyze", "release"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Workflow 'release' not found"));
    Ok(())
}
