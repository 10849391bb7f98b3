//! Integration Test: Core Stays Headless
//!
//! **Policy**: `threadline-core` has zero dependencies on terminal or UI
//! frameworks, and never installs a logging subscriber. Surfaces own both.

use std::fs;

use architectural_enforcement::workspace_root;

const FORBIDDEN_IN_CORE: &[&str] = &[
    "ratatui",
    "crossterm",
    "clap",
    "tracing-subscriber",
];

#[test]
fn test_core_has_no_ui_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("threadline/core/Cargo.toml"))
        .expect("core manifest should be readable");

    let found: Vec<&str> = FORBIDDEN_IN_CORE
        .iter()
        .copied()
        .filter(|dep| {
            manifest.lines().any(|line| {
                let line = line.trim_start();
                line.starts_with(&format!("{dep} ")) || line.starts_with(&format!("{dep}="))
            })
        })
        .collect();

    assert!(
        found.is_empty(),
        "threadline-core must stay headless, found: {found:?}"
    );
}
