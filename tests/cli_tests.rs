//! Integration tests for minitype CLI commands
//!
//! Tests the CLI commands: check (default), parse, lex, tables

use std::fs;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique source file path in the temp directory
fn unique_test_file(prefix: &str) -> String {
    let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let thread_id = format!("{:?}", std::thread::current().id());
    std::env::temp_dir()
        .join(format!(
            "minitype_cli_{}_{}_{}_{}.py",
            prefix,
            std::process::id(),
            thread_id.replace(|c: char| !c.is_alphanumeric(), "_"),
            counter
        ))
        .to_string_lossy()
        .to_string()
}

/// Helper to run minitype and capture output
fn run_minitype(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_minitype"))
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env("NO_COLOR", "1")
        .env_remove("MINITYPE_LOG")
        .env_remove("MINITYPE_DEBUG")
        .env_remove("MINITYPE_GENERIC_CONSTRUCTORS")
        .output()
        .expect("Failed to execute minitype");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Write `code` to a temp file, run minitype with `args` before the path
fn run_on_code(prefix: &str, args: &[&str], code: &str) -> (String, String, i32, String) {
    let path = unique_test_file(prefix);
    fs::write(&path, code).expect("Failed to write test file");

    let mut full_args = args.to_vec();
    full_args.push(&path);
    let (stdout, stderr, status) = run_minitype(&full_args);

    let _ = fs::remove_file(&path);
    (stdout, stderr, status, path)
}

// ============================================================================
// minitype check tests
// ============================================================================

#[test]
fn test_check_generics_case() {
    let (stdout, _, code) = run_minitype(&["check", "cases/generics_typed_ng.py"]);
    assert_eq!(code, 1, "diagnostics should exit with 1");
    assert_eq!(
        stdout,
        "cases/generics_typed_ng.py:12: error: Incompatible types in assignment (expression has type \"int\", variable has type \"str\") [assignment]\n\
         Found 1 error in 1 file (checked 1 source file)\n"
    );
}

#[test]
fn test_default_command_checks_file() {
    let (stdout, _, code) = run_minitype(&["cases/arg_type_ng.py"]);
    assert_eq!(code, 1);
    assert!(stdout.contains(
        "cases/arg_type_ng.py:5: error: Argument 1 to \"g\" has incompatible type \"str\"; expected \"int\"  [arg-type]"
    ));
}

#[test]
fn test_check_clean_file() {
    let (stdout, _, code) = run_minitype(&["check", "cases/generics_typed_ok.py"]);
    assert_eq!(code, 0, "clean file should exit with 0");
    assert_eq!(stdout, "Success: no issues found in 1 source file\n");
}

#[test]
fn test_check_counts_multiple_errors() {
    let (stdout, _, code) = run_minitype(&["check", "cases/return_value_ng.py"]);
    assert_eq!(code, 1);
    assert_eq!(stdout.matches(": error: ").count(), 2);
    assert!(stdout.ends_with("Found 2 errors in 1 file (checked 1 source file)\n"));
}

#[test]
fn test_check_json_output() {
    let (stdout, _, code) = run_minitype(&["check", "cases/operator_ng.py", "--json"]);
    assert_eq!(code, 1);

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("check --json should output valid JSON");
    assert_eq!(json["file"], "cases/operator_ng.py");

    let diagnostics = json["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["line"], 2);
    assert_eq!(diagnostics[0]["code"], "operator");
    assert_eq!(
        diagnostics[0]["message"],
        "Unsupported operand types for + (\"int\" and \"str\")  [operator]"
    );
}

#[test]
fn test_check_unsupported_construct_is_fatal() {
    let (stdout, stderr, code) = run_minitype(&["check", "cases/unsupported_class_ng.py"]);
    assert_eq!(code, 2, "fatal errors should exit with 2");
    assert!(stdout.is_empty());
    assert!(stderr.contains("Unsupported construct at line 4: class definition"));
}

#[test]
fn test_check_nonexistent_file() {
    let (_, stderr, code) = run_minitype(&["check", "cases/nonexistent.py"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("cannot read"));
}

#[test]
fn test_check_syntax_error() {
    let (_, stderr, code, _) = run_on_code("syntax", &["check"], "def f(:\n    return 1\n");
    assert_eq!(code, 2);
    assert!(stderr.contains("Parser error at line 1"));
}

#[test]
fn test_check_temp_file_reports_path() {
    let (stdout, _, code, path) = run_on_code("assign", &["check"], "v: str = 1\n");
    assert_eq!(code, 1);
    assert!(stdout.starts_with(&format!("{}:1: error: Incompatible types in assignment", path)));
}

#[test]
fn test_generic_constructor_flag() {
    let source = "T = Param(\"T\")\n\ndef f(x: T) -> T:\n    return x\n\ny: int = f(1)\n";

    let (_, _, code, _) = run_on_code("ctor_off", &["check"], source);
    assert_eq!(code, 1, "T is a plain named type without the flag");

    let (stdout, _, code, _) =
        run_on_code("ctor_on", &["check", "--generic-constructor", "Param"], source);
    assert_eq!(code, 0, "unexpected output: {}", stdout);
}

#[test]
fn test_debug_dumps_tables_to_stderr() {
    let (_, stderr, code) = run_minitype(&["check", "--debug", "cases/generics_typed_ng.py"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("generics:\n  T = \"T\"\n"));
    assert!(stderr.contains("  f(x: T) -> T\n"));
    assert!(stderr.contains("  copy_x: str\n"));
}

// ============================================================================
// minitype tables tests
// ============================================================================

#[test]
fn test_tables_text() {
    let (stdout, _, code) = run_minitype(&["tables", "cases/generics_typed_ng.py"]);
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        "generics:\n  T = \"T\"\nfunctions:\n  f(x: T) -> T\nvariables:\n  copy_x: str\n  x: int\n"
    );
}

#[test]
fn test_tables_json() {
    let (stdout, _, code) = run_minitype(&["tables", "cases/generics_typed_ng.py", "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("tables --json should output valid JSON");
    assert_eq!(json["generics"]["T"], "T");
    assert_eq!(json["functions"]["f"]["return_type"], "T");
    assert_eq!(json["variables"]["x"], "int");
}

// ============================================================================
// minitype parse / lex tests
// ============================================================================

#[test]
fn test_parse_json() {
    let (stdout, _, code) = run_minitype(&["parse", "cases/arg_type_ng.py", "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("parse --json should output valid JSON");
    assert_eq!(json["body"].as_array().unwrap().len(), 2);
}

#[test]
fn test_parse_accepts_unsupported_constructs() {
    let (_, _, code) = run_minitype(&["parse", "cases/unsupported_class_ng.py"]);
    assert_eq!(code, 0, "only the analyzer rejects classes");
}

#[test]
fn test_lex_output() {
    let (stdout, _, code, _) = run_on_code("lex", &["lex"], "x: int = 1\n");
    assert_eq!(code, 0);
    assert!(stdout.starts_with("1:1 Identifier(\"x\") \"x\"\n"));
    assert!(stdout.contains("Integer(1)"));
    assert!(stdout.trim_end().ends_with("Eof \"\""));
}
