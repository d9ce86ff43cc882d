//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in `feed/core` and `feed/daemon` MUST NOT call
//! sleep methods. Timed behaviour uses `tokio::time::interval` (slideshow) or
//! waits on channels.
//! **Exception**: the flat reconnect delay of the feed connection.

use architectural_enforcement::{code_part, is_reconnect_context, production_sources};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (idx, line) in source.lines.iter().enumerate() {
            let code = code_part(line);
            if !(code.contains("::sleep(") || code.contains(".sleep(")) {
                continue;
            }
            if is_reconnect_context(&source.lines, idx) {
                continue;
            }
            violations.push(source.violation(idx, "Sleep call"));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - The feed reconnect delay");
        eprintln!("  - Test code (#[cfg(test)] modules, tests/ directories)");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for events (use channels or interval ticks)");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_sources_are_found() {
    let sources = production_sources();
    assert!(
        sources.iter().any(|s| s.path.ends_with("connection.rs")),
        "source walk found no feed sources; check PRODUCTION_DIRS"
    );
}
