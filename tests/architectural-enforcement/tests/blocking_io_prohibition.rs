//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async production code MUST NOT use blocking I/O. Feed reads
//! and preloads go through reqwest's async client; stdin is read through
//! `tokio::io`.
//! **Acceptable**: non-async functions (config loading before the widget
//! starts) and test code.

use architectural_enforcement::{code_part, enclosing_fn, production_sources, FnKind};

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::thread::sleep", "Blocking sleep"),
];

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (idx, line) in source.lines.iter().enumerate() {
            let code = code_part(line);
            let Some((_, what)) = FORBIDDEN.iter().find(|(needle, _)| code.contains(needle)) else {
                continue;
            };
            if enclosing_fn(&source.lines, idx) != Some(FnKind::Async) {
                continue;
            }
            violations.push(source.violation(idx, what));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - reqwest::Client for HTTP");
        eprintln!("  - tokio::io for stdin");
        eprintln!("  - tokio::task::spawn_blocking for CPU-bound decoding");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.",
            violations.len()
        );
    }
}

#[test]
fn test_reqwest_blocking_never_used() {
    for source in production_sources() {
        assert!(
            !source.lines.iter().any(|l| code_part(l).contains("reqwest::blocking")),
            "{} uses reqwest::blocking",
            source.path.display()
        );
    }
}
