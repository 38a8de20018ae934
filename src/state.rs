use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Language;
use crate::catalog::MutationType;
use crate::mutants::{Mutant, Status};
use crate::mutator::Mutation;
use crate::scheduler::RunOutcome;

pub const STATE_FILE: &str = ".mutest-state.json";

/// Minimum percentages a run must reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub efficacy: Option<f64>,
    pub mutation_coverage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdViolation {
    Efficacy,
    MutationCoverage,
}

impl ThresholdViolation {
    pub fn exit_code(self) -> i32 {
        match self {
            ThresholdViolation::Efficacy => 10,
            ThresholdViolation::MutationCoverage => 11,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub killed: usize,
    pub lived: usize,
    pub timed_out: usize,
    pub not_viable: usize,
    pub not_covered: usize,
    /// Runnable mutants reported without a test run (dry run).
    pub runnable: usize,
    /// killed / (killed + lived), as a percentage.
    pub efficacy: f64,
    /// tested / (tested + not covered), as a percentage.
    pub mutation_coverage: f64,
    pub duration_ms: u64,
}

impl Summary {
    pub fn from_mutants<'a>(mutants: impl IntoIterator<Item = &'a Mutant>, duration_ms: u64) -> Self {
        let mut summary = Summary {
            duration_ms,
            ..Summary::default()
        };
        for mutant in mutants {
            summary.total += 1;
            match mutant.status() {
                Status::Killed => summary.killed += 1,
                Status::Lived => summary.lived += 1,
                Status::TimedOut => summary.timed_out += 1,
                Status::NotViable => summary.not_viable += 1,
                Status::NotCovered => summary.not_covered += 1,
                Status::Runnable => summary.runnable += 1,
            }
        }
        let tested = summary.killed + summary.lived;
        summary.efficacy = percent(summary.killed, tested);
        summary.mutation_coverage = percent(tested, tested + summary.not_covered);
        summary
    }

    /// The first threshold this summary falls short of, efficacy first.
    pub fn check(&self, thresholds: &Thresholds) -> Option<ThresholdViolation> {
        if thresholds.efficacy.is_some_and(|min| self.efficacy < min) {
            return Some(ThresholdViolation::Efficacy);
        }
        if thresholds
            .mutation_coverage
            .is_some_and(|min| self.mutation_coverage < min)
        {
            return Some(ThresholdViolation::MutationCoverage);
        }
        None
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutantRecord {
    pub id: usize,
    /// `m1`, `m2`, ... for lived mutants, used by `mutest show`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub mutation_type: MutationType,
    pub status: Status,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub original: String,
    pub replacement: String,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub context_before: Vec<String>,
    #[serde(default)]
    pub context_after: Vec<String>,
}

impl MutantRecord {
    pub fn from_mutant(mutant: &Mutant, ref_id: Option<String>) -> Self {
        let site = mutant.site();
        let replacement = match Mutation::for_mutant(mutant) {
            Ok(Mutation::Token(token)) => token.replacement().to_string(),
            Ok(Mutation::Expression(expression)) => expression.reconstruct().render(),
            Err(_) => String::new(),
        };
        MutantRecord {
            id: mutant.id(),
            ref_id,
            mutation_type: mutant.mutation_type(),
            status: mutant.status(),
            file: site.file.to_string_lossy().replace('\\', "/"),
            line: site.span.start_line,
            column: site.span.start_column,
            original: site.original.clone(),
            replacement,
            diff: mutant.diff().unwrap_or_default().to_string(),
            duration_ms: mutant.duration().map_or(0, |d| d.as_millis() as u64),
            context_before: site.context_before.clone(),
            context_after: site.context_after.clone(),
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub language: Language,
    pub root: String,
    #[serde(default)]
    pub cancelled: bool,
    pub summary: Summary,
    pub mutants: Vec<MutantRecord>,
}

impl RunResult {
    pub fn from_outcome(language: Language, root: &Path, outcome: &RunOutcome) -> Self {
        let mut lived = 0;
        let mutants = outcome
            .mutants
            .iter()
            .map(|mutant| {
                let ref_id = (mutant.status() == Status::Lived).then(|| {
                    lived += 1;
                    format!("m{lived}")
                });
                MutantRecord::from_mutant(mutant, ref_id)
            })
            .collect();
        RunResult {
            language,
            root: root.display().to_string(),
            cancelled: outcome.cancelled,
            summary: Summary::from_mutants(&outcome.mutants, outcome.elapsed.as_millis() as u64),
            mutants,
        }
    }

    pub fn lived(&self) -> impl Iterator<Item = &MutantRecord> {
        self.mutants.iter().filter(|m| m.status == Status::Lived)
    }

    /// Look a mutant up by ref (`m2`) or by numeric id (`17`).
    pub fn find(&self, reference: &str) -> Option<&MutantRecord> {
        if let Ok(id) = reference.parse::<usize>() {
            return self.mutants.iter().find(|m| m.id == id);
        }
        self.mutants
            .iter()
            .find(|m| m.ref_id.as_deref() == Some(reference))
    }
}

fn state_path() -> PathBuf {
    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    dir.join(STATE_FILE)
}

pub fn save_last_run(result: &RunResult) -> io::Result<PathBuf> {
    let path = state_path();
    save_to_path(result, &path)?;
    Ok(path)
}

pub fn load_last_run() -> Option<RunResult> {
    load_from_path(&state_path())
}

pub fn save_to_path(result: &RunResult, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

pub fn load_from_path(path: &Path) -> Option<RunResult> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
