use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn mutest_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    // test binary is in target/debug/deps/, mutest binary is in target/debug/
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("mutest");
    path
}

fn mutest(dir: &Path, args: &[&str]) -> Output {
    Command::new(mutest_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("MUTEST_WORKERS")
        .env_remove("MUTEST_TEST_CMD")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run mutest")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}\nstderr:\n{}",
            stdout(output),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

const CALC: &str = "package calc

func Max(a, b int) int {
\tif a > b {
\t\treturn a
\t}
\treturn b
}

func Inc(x int) int {
\treturn x + 1
}
";

const CALC_TEST: &str = "package calc

import \"testing\"

func TestMax(t *testing.T) {
\tif Max(3, 2) != 3 || Max(2, 3) != 3 || Max(2, 2) != 2 {
\t\tt.Fatal(\"Max\")
\t}
}
";

fn create_go_module(dir: &Path) {
    std::fs::write(dir.join("go.mod"), "module example.com/calc\n\ngo 1.21\n").unwrap();
    std::fs::write(dir.join("calc.go"), CALC).unwrap();
    std::fs::write(dir.join("calc_test.go"), CALC_TEST).unwrap();
}

/// A test command that only notices changes to the comparison in `Max`.
fn write_check_script(dir: &Path) {
    std::fs::write(dir.join("check.sh"), "#!/bin/sh\ngrep -q 'if a > b' calc.go\n").unwrap();
}

fn go_available() -> bool {
    Command::new("go")
        .arg("version")
        .output()
        .is_ok_and(|o| o.status.success())
}

#[test]
fn types_lists_every_mutation_type() {
    let dir = TempDir::new().unwrap();
    let output = mutest(dir.path(), &["types"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("CONDITIONALS_BOUNDARY"));
    assert!(text.contains("INVERT_LOOP_CTRL"));
    assert!(text.contains("off by default"));
}

#[test]
fn unleash_outside_a_module_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    let output = mutest(dir.path(), &["unleash", "notes.txt"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_mutation_type_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    let output = mutest(dir.path(), &["unleash", "--dry-run", "--enable", "FLIP_ALL"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn dry_run_lists_mutants_without_running_tests() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());

    let output = mutest(dir.path(), &["unleash", "--dry-run", "--json"]);
    assert_eq!(output.status.code(), Some(0));

    let result = json(&output);
    let mutants = result["mutants"].as_array().unwrap();
    assert_eq!(mutants.len(), 3);
    assert!(mutants.iter().all(|m| m["status"] == "RUNNABLE"));
    assert_eq!(mutants[0]["mutation_type"], "CONDITIONALS_BOUNDARY");
    assert_eq!(mutants[0]["file"], "calc.go");
    assert_eq!(mutants[0]["line"], 4);
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.go")).unwrap(), CALC);
}

#[test]
fn dry_run_ignores_thresholds() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    let output = mutest(
        dir.path(),
        &["unleash", "--dry-run", "--quiet", "--threshold-efficacy", "100"],
    );
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn function_scope_limits_discovery() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());

    let output = mutest(
        dir.path(),
        &["unleash", "calc.go", "--function", "Inc", "--dry-run", "--json"],
    );
    assert_eq!(output.status.code(), Some(0));
    let result = json(&output);
    let mutants = result["mutants"].as_array().unwrap();
    assert_eq!(mutants.len(), 1);
    assert_eq!(mutants[0]["mutation_type"], "ARITHMETIC_BASE");

    let missing = mutest(dir.path(), &["unleash", "calc.go", "--function", "Nope", "--dry-run"]);
    assert_eq!(missing.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn custom_test_command_kills_and_lets_live() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    write_check_script(dir.path());

    let output = mutest(
        dir.path(),
        &["unleash", "--test-cmd", "sh check.sh", "--workers", "2", "--json"],
    );
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let result = json(&output);
    assert_eq!(result["summary"]["killed"], 2);
    assert_eq!(result["summary"]["lived"], 1);
    let lived: Vec<_> = result["mutants"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["status"] == "LIVED")
        .collect();
    assert_eq!(lived[0]["ref_id"], "m1");
    assert_eq!(lived[0]["replacement"], "-");

    // The module itself is never touched by an isolated run.
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.go")).unwrap(), CALC);

    let show = mutest(dir.path(), &["show", "@m1"]);
    assert!(show.status.success());
    assert!(stdout(&show).contains("calc.go:11"));

    let status = mutest(dir.path(), &["status"]);
    assert!(status.status.success());
    assert!(stdout(&status).contains("1 lived"));

    let unknown = mutest(dir.path(), &["show", "@m7"]);
    assert_eq!(unknown.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn lived_mutants_fail_only_when_asked() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    write_check_script(dir.path());

    let output = mutest(
        dir.path(),
        &["unleash", "--test-cmd", "sh check.sh", "--quiet", "--fail-on-lived"],
    );
    assert_eq!(output.status.code(), Some(1));
}

#[cfg(unix)]
#[test]
fn missed_thresholds_have_their_own_exit_codes() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    write_check_script(dir.path());

    let efficacy = mutest(
        dir.path(),
        &["unleash", "--test-cmd", "sh check.sh", "--quiet", "--threshold-efficacy", "90"],
    );
    assert_eq!(efficacy.status.code(), Some(10));

    let met = mutest(
        dir.path(),
        &["unleash", "--test-cmd", "sh check.sh", "--quiet", "--threshold-efficacy", "50"],
    );
    assert_eq!(met.status.code(), Some(0));
}

#[cfg(unix)]
#[test]
fn failing_baseline_stops_the_run() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    std::fs::write(dir.path().join("check.sh"), "#!/bin/sh\nexit 1\n").unwrap();

    let output = mutest(dir.path(), &["unleash", "--test-cmd", "sh check.sh", "--quiet"]);
    assert_eq!(output.status.code(), Some(3));
}

#[cfg(unix)]
#[test]
fn in_place_run_restores_sources() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    write_check_script(dir.path());

    let output = mutest(
        dir.path(),
        &["unleash", "--in-place", "--test-cmd", "sh check.sh", "--quiet"],
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.go")).unwrap(), CALC);
    assert!(!dir.path().join(".calc.go.mutest.bak").exists());
}

#[test]
fn leftover_backups_are_restored_before_running() {
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());
    std::fs::write(dir.path().join("calc.go"), CALC.replace("a > b", "a >= b")).unwrap();
    std::fs::write(dir.path().join(".calc.go.mutest.bak"), CALC).unwrap();

    let output = mutest(dir.path(), &["unleash", "--dry-run", "--quiet"]);
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(std::fs::read_to_string(dir.path().join("calc.go")).unwrap(), CALC);
    assert!(!dir.path().join(".calc.go.mutest.bak").exists());
}

#[test]
fn go_toolchain_run() {
    if !go_available() {
        eprintln!("go not on PATH; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    create_go_module(dir.path());

    let output = mutest(dir.path(), &["unleash", "--json"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let result = json(&output);
    let mutants = result["mutants"].as_array().unwrap();
    let status_of = |line: u64, mutation: &str| {
        mutants
            .iter()
            .find(|m| m["line"] == line && m["mutation_type"] == mutation)
            .map(|m| m["status"].as_str().unwrap().to_string())
    };
    // `>=` returns the same value when a == b, so no test can tell.
    assert_eq!(status_of(4, "CONDITIONALS_BOUNDARY").as_deref(), Some("LIVED"));
    assert_eq!(status_of(4, "CONDITIONALS_NEGATION").as_deref(), Some("KILLED"));
    // Inc has no test, so coverage marks it before any run.
    assert_eq!(status_of(11, "ARITHMETIC_BASE").as_deref(), Some("NOT_COVERED"));
}
