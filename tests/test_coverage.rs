use std::path::Path;

use tempfile::TempDir;

use mutest::coverage::{self, AssumeCovered, CoverageError, CoverageIndex, ProfileIndex};

const PROFILE: &str = "mode: set
example.com/calc/calc.go:3.24,4.12 1 1
example.com/calc/calc.go:4.12,6.3 1 1
example.com/calc/calc.go:7.2,7.10 1 0
example.com/calc/internal/sign/sign.go:3.20,5.2 2 1
";

#[test]
fn executed_blocks_are_covered() {
    let index = ProfileIndex::parse(PROFILE, "example.com/calc").unwrap();
    assert!(index.covers(Path::new("calc.go"), 4, 7));
    assert!(index.covers(Path::new("calc.go"), 5, 3));
    assert!(index.covers(Path::new("internal/sign/sign.go"), 4, 1));
}

#[test]
fn blocks_with_zero_count_are_not_covered() {
    let index = ProfileIndex::parse(PROFILE, "example.com/calc").unwrap();
    assert!(!index.covers(Path::new("calc.go"), 7, 5));
}

#[test]
fn positions_outside_every_block_are_not_covered() {
    let index = ProfileIndex::parse(PROFILE, "example.com/calc").unwrap();
    assert!(!index.covers(Path::new("calc.go"), 1, 1));
    assert!(!index.covers(Path::new("calc.go"), 9, 1));
    assert!(!index.covers(Path::new("missing.go"), 4, 7));
}

#[test]
fn files_are_keyed_relative_to_the_module() {
    let index = ProfileIndex::parse(PROFILE, "example.com/calc").unwrap();
    assert_eq!(index.file_count(), 2);
}

#[test]
fn profile_without_mode_is_rejected() {
    let err = ProfileIndex::parse("example.com/calc/calc.go:3.24,4.12 1 1\n", "example.com/calc")
        .unwrap_err();
    assert!(matches!(err, CoverageError::MissingMode));
}

#[test]
fn malformed_lines_are_reported_with_their_line_number() {
    let text = "mode: count\nexample.com/calc/calc.go:3.24,4.12 1 1\ngarbage\n";
    match ProfileIndex::parse(text, "example.com/calc") {
        Err(CoverageError::Malformed { line, content }) => {
            assert_eq!(line, 3);
            assert_eq!(content, "garbage");
        }
        other => panic!("expected a malformed line, got {other:?}"),
    }
}

#[test]
fn empty_profile_covers_nothing() {
    let index = ProfileIndex::parse("mode: atomic\n", "example.com/calc").unwrap();
    assert_eq!(index.file_count(), 0);
    assert!(!index.covers(Path::new("calc.go"), 1, 1));
}

#[test]
fn load_reads_a_profile_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cover.out");
    std::fs::write(&path, PROFILE).unwrap();

    let index = ProfileIndex::load(&path, "example.com/calc").unwrap();
    assert!(index.covers(Path::new("calc.go"), 4, 7));

    let missing = ProfileIndex::load(&dir.path().join("nope.out"), "example.com/calc");
    assert!(matches!(missing, Err(CoverageError::Read { .. })));
}

#[test]
fn module_path_comes_from_go_mod() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("go.mod"),
        "// header\nmodule example.com/calc\n\ngo 1.22\n",
    )
    .unwrap();
    assert_eq!(
        coverage::read_module_path(dir.path()).as_deref(),
        Some("example.com/calc")
    );

    let empty = TempDir::new().unwrap();
    assert_eq!(coverage::read_module_path(empty.path()), None);
}

#[test]
fn assume_covered_covers_everything() {
    assert!(AssumeCovered.covers(Path::new("src/lib.rs"), 1, 1));
}
