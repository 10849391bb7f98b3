//! Integration Test: Global Mutable State Prohibition
//!
//! **Policy**: Stream decoding state lives in per-request values. Production
//! code MUST NOT keep mutable state in statics or thread-locals.
//! **Allowed**: immutable statics such as a lazily compiled regex

use architectural_enforcement::{find_violations, PRODUCTION_DIRS};

const INTERIOR_MUTABILITY: &[&str] = &[
    "Mutex<", "RwLock<", "RefCell<", "Cell<", "Atomic", "OnceCell<",
];

fn is_global_mutable_state(code: &str) -> bool {
    let code = code.trim();
    if code.contains("static mut ") || code.contains("thread_local!") {
        return true;
    }
    let is_static = code.starts_with("static ") || code.starts_with("pub static ");
    is_static && INTERIOR_MUTABILITY.iter().any(|ty| code.contains(ty))
}

#[test]
fn test_no_global_mutable_state() {
    let violations = find_violations(PRODUCTION_DIRS, is_global_mutable_state);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Global mutable state found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} global state violation(s).\nKeep state in per-request values!",
            violations.len()
        );
    }
}

#[test]
fn test_detector() {
    assert!(is_global_mutable_state("static mut COUNTER: u32 = 0;"));
    assert!(is_global_mutable_state(
        "static STATE: LazyLock<Mutex<String>> = LazyLock::new(Default::default);"
    ));
    assert!(is_global_mutable_state("pub static HITS: AtomicUsize = AtomicUsize::new(0);"));
    assert!(!is_global_mutable_state(
        "static TITLE_LINE: LazyLock<Regex> = LazyLock::new(|| {"
    ));
    assert!(!is_global_mutable_state("    writes: AtomicUsize,"));
}
