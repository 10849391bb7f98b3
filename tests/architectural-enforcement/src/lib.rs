//! Architectural Enforcement
//!
//! Source scanning helpers shared by the integration tests in `tests/`,
//! which enforce architectural principles:
//! - No sleep() calls in production code
//! - No global mutable state (every stream owns its decoder and reducer)
//! - No UI dependencies in the core library
//!
//! These tests are designed to catch violations early in the development cycle.

use std::fs;
use std::path::{Path, PathBuf};

/// Directories holding production code
pub const PRODUCTION_DIRS: &[&str] = &["threadline/core/src", "threadline/cli/src"];

/// Workspace root, derived from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files below `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Non-test code lines of a file as `(line number, code without comments)`
///
/// Scanning stops at the first `#[cfg(test)]`, which by convention opens
/// the trailing test module.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            (idx + 1, code.to_string())
        })
        .collect()
}

/// Lines in production code matching `is_violation`, formatted for reports
pub fn find_violations(dirs: &[&str], is_violation: impl Fn(&str) -> bool) -> Vec<String> {
    let mut violations = Vec::new();
    for dir in dirs {
        for file in rust_files(dir) {
            for (line_number, code) in production_lines(&file) {
                if is_violation(&code) {
                    violations.push(format!(
                        "{}:{} - {}",
                        file.display(),
                        line_number,
                        code.trim()
                    ));
                }
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_dirs_exist() {
        for dir in PRODUCTION_DIRS {
            assert!(
                !rust_files(dir).is_empty(),
                "no Rust sources found in {dir}"
            );
        }
    }
}
