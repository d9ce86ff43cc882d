//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! on the genfeed production sources:
//! - No sleep() calls outside the feed reconnect delay
//! - No blocking I/O inside async functions
//!
//! The helpers here walk the production source trees and classify lines; the
//! checks themselves live under `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["feed/core/src", "feed/daemon/src"];

/// Workspace root (two levels above this package)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A production source file, truncated at its `#[cfg(test)]` module
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Lines before the test module
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Read a file, dropping everything from the first `#[cfg(test)]` on
    #[must_use]
    pub fn read(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        let lines = content
            .lines()
            .take_while(|l| !l.trim_start().starts_with("#[cfg(test)]"))
            .map(str::to_string)
            .collect();
        Some(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    /// Format a violation for this file
    #[must_use]
    pub fn violation(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            idx + 1,
            what,
            self.lines[idx].trim()
        )
    }
}

/// All `.rs` files under the production directories
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.exists())
        .flat_map(|dir| {
            walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .filter_map(|e| SourceFile::read(e.path()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// The code part of a line, without any trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Kind of function a line declares, if it declares one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnKind {
    /// `fn` / `pub fn`
    Sync,
    /// `async fn` / `pub async fn`
    Async,
}

/// Classify a function signature line
#[must_use]
pub fn fn_kind(line: &str) -> Option<FnKind> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    if rest.starts_with("async fn ") {
        Some(FnKind::Async)
    } else if rest.starts_with("fn ") {
        Some(FnKind::Sync)
    } else {
        None
    }
}

/// Kind of the function enclosing `current_idx`
///
/// Async blocks inside a sync function (e.g. `tokio::spawn(async move {..})`)
/// are reported as async.
#[must_use]
pub fn enclosing_fn(lines: &[String], current_idx: usize) -> Option<FnKind> {
    for i in (0..=current_idx).rev() {
        let line = lines[i].trim();

        if i < current_idx && code_part(line).contains("async move {") {
            return Some(FnKind::Async);
        }
        if let Some(kind) = fn_kind(line) {
            return Some(kind);
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.ends_with('{')) {
            return None;
        }
    }
    None
}

/// Whether nearby lines mention the reconnect delay
#[must_use]
pub fn is_reconnect_context(lines: &[String], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(15)..std::cmp::min(current_idx + 5, lines.len());
    lines[context_range].iter().any(|l| {
        let l = l.to_lowercase();
        l.contains("reconnect") || l.contains("backoff")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(code: &[&str]) -> Vec<String> {
        code.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn test_fn_kind() {
        assert_eq!(fn_kind("    pub async fn open(&self) {"), Some(FnKind::Async));
        assert_eq!(fn_kind("fn parse(line: &str) {"), Some(FnKind::Sync));
        assert_eq!(fn_kind("let f = 1;"), None);
    }

    #[test]
    fn test_enclosing_fn_sees_spawned_async_blocks() {
        let code = lines(&[
            "fn spawn_it() {",
            "    tokio::spawn(async move {",
            "        let x = std::fs::read(\"a\");",
            "    });",
            "}",
        ]);
        assert_eq!(enclosing_fn(&code, 2), Some(FnKind::Async));
        assert_eq!(enclosing_fn(&code, 1), Some(FnKind::Sync));
    }

    #[test]
    fn test_reconnect_context() {
        let code = lines(&[
            "// Flat reconnect backoff",
            "tokio::select! {",
            "    () = tokio::time::sleep(self.reconnect_delay) => {}",
            "}",
        ]);
        assert!(is_reconnect_context(&code, 2));
        assert!(!is_reconnect_context(&lines(&["tokio::time::sleep(d).await;"]), 0));
    }
}
