use std::path::{Path, PathBuf};

use mutest::Language;
use mutest::catalog::{EnabledTypes, MutationType};
use mutest::coverage::CoverageIndex;
use mutest::discovery::{self, Discovery};
use mutest::mutants::{Mutant, Status};
use mutest::parser::{ParsedFile, parse_source};

fn go(source: &str) -> ParsedFile {
    parse_source(Language::Go, Path::new("calc/calc.go"), source.to_string()).unwrap()
}

fn rust(source: &str) -> ParsedFile {
    parse_source(Language::Rust, Path::new("src/lib.rs"), source.to_string()).unwrap()
}

fn discover(file: &ParsedFile, enabled: &EnabledTypes) -> Vec<Mutant> {
    Discovery::new(file, enabled, None).collect()
}

fn types(mutants: &[Mutant]) -> Vec<MutationType> {
    mutants.iter().map(|m| m.mutation_type()).collect()
}

/// Covers whole lines.
struct Lines(Vec<usize>);

impl CoverageIndex for Lines {
    fn covers(&self, _file: &Path, line: usize, _column: usize) -> bool {
        self.0.contains(&line)
    }
}

const MAX: &str = "package calc

func Max(a, b int) int {
\tif a > b {
\t\treturn a
\t}
\treturn b
}
";

#[test]
fn boundary_site_covers_the_operator() {
    let file = go(MAX);
    let enabled = EnabledTypes::none().with(MutationType::ConditionalsBoundary, true);
    let mutants = discover(&file, &enabled);

    assert_eq!(mutants.len(), 1);
    let site = mutants[0].site();
    let start = MAX.find(" > ").unwrap() + 1;
    assert_eq!(site.span.start_byte, start);
    assert_eq!(site.span.end_byte, start + 1);
    assert_eq!(site.span.start_line, 4);
    assert_eq!(site.span.start_column, 7);
    assert_eq!(site.original, ">");
    assert_eq!(site.parent_kind, "binary_expression");
    assert_eq!(site.file, PathBuf::from("calc/calc.go"));
    assert_eq!(mutants[0].status(), Status::Runnable);
}

#[test]
fn several_types_share_one_site() {
    let file = go(MAX);
    let mutants = discover(&file, &EnabledTypes::default());

    assert_eq!(
        types(&mutants),
        vec![
            MutationType::ConditionalsBoundary,
            MutationType::ConditionalsNegation
        ]
    );
    assert_eq!(mutants[0].site().span, mutants[1].site().span);
}

#[test]
fn unary_minus_yields_only_sign_inversion() {
    let file = go("package calc

func Neg(y int) int {
\tx := -y
\treturn x
}
");
    let mutants = discover(&file, &EnabledTypes::all());
    assert_eq!(types(&mutants), vec![MutationType::InvertNegatives]);
    assert_eq!(mutants[0].site().parent_kind, "unary_expression");
}

#[test]
fn binary_minus_yields_only_arithmetic() {
    let file = go("package calc

func Sub(a, b int) int {
\tx := a - b
\treturn x
}
");
    let mutants = discover(&file, &EnabledTypes::all());
    assert_eq!(types(&mutants), vec![MutationType::ArithmeticBase]);
    assert_eq!(mutants[0].site().parent_kind, "binary_expression");
}

#[test]
fn logical_not_site_is_the_whole_expression() {
    let file = go("package calc

func Check() int {
\tif !isValid() {
\t\treturn 1
\t}
\treturn 0
}
");
    let mutants = discover(&file, &EnabledTypes::default());
    assert_eq!(types(&mutants), vec![MutationType::InvertLogicalNot]);
    let site = mutants[0].site();
    assert_eq!(site.original, "!isValid()");
    assert_eq!(site.node_kind, "unary_expression");
    assert_eq!(site.parent_kind, "if_statement");
}

#[test]
fn loop_header_yields_comparison_and_increment() {
    let file = go("package calc

func Sum(n int) int {
\ttotal := 0
\tfor i := 0; i < n; i++ {
\t\ttotal += i
\t}
\treturn total
}
");
    let mutants = discover(&file, &EnabledTypes::default());
    assert_eq!(
        types(&mutants),
        vec![
            MutationType::ConditionalsBoundary,
            MutationType::ConditionalsNegation,
            MutationType::IncrementDecrement
        ]
    );

    let with_assignments = discover(
        &file,
        &EnabledTypes::none().with(MutationType::InvertAssignments, true),
    );
    assert_eq!(with_assignments.len(), 1);
    assert_eq!(with_assignments[0].site().original, "+=");
}

#[test]
fn disabled_types_are_not_discovered() {
    let file = go(MAX);
    assert!(discover(&file, &EnabledTypes::none()).is_empty());
}

#[test]
fn coverage_seeds_initial_status() {
    let file = go("package calc

func Clamp(x, lo, hi int) int {
\tif x < lo {
\t\treturn lo
\t}
\tif x > hi {
\t\treturn hi
\t}
\treturn x
}
");
    let enabled = EnabledTypes::none().with(MutationType::ConditionalsBoundary, true);
    let index = Lines(vec![4]);
    let mutants: Vec<_> = Discovery::new(&file, &enabled, Some(&index)).collect();

    assert_eq!(mutants.len(), 2);
    assert_eq!(mutants[0].site().span.start_line, 4);
    assert_eq!(mutants[0].status(), Status::Runnable);
    assert_eq!(mutants[1].site().span.start_line, 7);
    assert_eq!(mutants[1].status(), Status::NotCovered);
}

#[test]
fn order_is_stable_across_runs() {
    let source = "package calc

func F(a, b int) int {
\tif a >= b && a != 0 {
\t\treturn a * b
\t}
\treturn -a + b
}
";
    let enabled = EnabledTypes::all();
    let key = |m: &Mutant| (m.site().span.start_byte, m.mutation_type());

    let first: Vec<_> = discover(&go(source), &enabled).iter().map(key).collect();
    let second: Vec<_> = discover(&go(source), &enabled).iter().map(key).collect();
    assert_eq!(first, second);

    let offsets: Vec<_> = first.iter().map(|(offset, _)| *offset).collect();
    let mut sorted = offsets.clone();
    sorted.sort();
    assert_eq!(offsets, sorted, "pre-order follows source order");
}

#[test]
fn context_lines_surround_the_site() {
    let file = go(MAX);
    let mutants = discover(&file, &EnabledTypes::default());
    let site = mutants[0].site();
    assert_eq!(site.context_before, vec!["", "func Max(a, b int) int {"]);
    assert_eq!(site.context_after, vec!["\t\treturn a", "\t}"]);
}

#[test]
fn scoped_discovery_stays_inside_the_function() {
    let file = go("package calc

func A(x int) bool {
\treturn x > 0
}

func B(x int) int {
\treturn x + 1
}
");
    let enabled = EnabledTypes::default();
    let scoped: Vec<_> = Discovery::scoped(&file, "B", &enabled, None).unwrap().collect();
    assert_eq!(types(&scoped), vec![MutationType::ArithmeticBase]);

    assert!(Discovery::scoped(&file, "Missing", &enabled, None).is_none());
}

#[test]
fn methods_can_be_scoped() {
    let file = go("package calc

type Counter struct{ n int }

func (c *Counter) Inc() {
\tc.n++
}
");
    let enabled = EnabledTypes::default();
    let scoped: Vec<_> = Discovery::scoped(&file, "Inc", &enabled, None).unwrap().collect();
    assert_eq!(types(&scoped), vec![MutationType::IncrementDecrement]);
}

#[test]
fn rust_test_modules_are_skipped() {
    let file = rust("pub fn next(a: i32) -> i32 {
    a + 1
}

#[cfg(test)]
mod tests {
    #[test]
    fn adds() {
        assert_eq!(super::next(1) - 1, 1);
    }
}
");
    let mutants = discover(&file, &EnabledTypes::default());
    assert_eq!(types(&mutants), vec![MutationType::ArithmeticBase]);
    assert_eq!(mutants[0].site().span.start_line, 2);
}

#[test]
fn rust_negation_inside_macro_is_not_a_site() {
    let file = rust("pub fn check(ok: bool) -> bool {
    debug_assert!(!ok || ok);
    !ok
}
");
    let mutants = discover(&file, &EnabledTypes::default());
    assert_eq!(types(&mutants), vec![MutationType::InvertLogicalNot]);
    assert_eq!(mutants[0].site().span.start_line, 3);
}

#[test]
fn ids_number_mutants_across_files() {
    let files = vec![go(MAX), go(MAX)];
    let enabled = EnabledTypes::default();
    let mutants = discovery::discover_all(&files, &enabled, None);
    let ids: Vec<_> = mutants.iter().map(Mutant::id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
