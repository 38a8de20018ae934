use console::Style;

use crate::catalog::MutationType;
use crate::mutants::{Mutant, Status};
use crate::state::{MutantRecord, RunResult, Summary, ThresholdViolation, Thresholds};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Killed => Style::new().green().bold(),
        Status::Lived => Style::new().red().bold(),
        Status::TimedOut => Style::new().yellow().bold(),
        Status::NotViable => Style::new().magenta(),
        Status::NotCovered => Style::new().dim(),
        Status::Runnable => Style::new().cyan(),
    }
}

/// One line per finalized mutant, e.g. `KILLED ARITHMETIC_BASE at pkg/a.go:12:7`.
pub fn print_mutant_line(mutant: &Mutant) {
    let status = mutant.status();
    let dim = Style::new().dim();
    println!(
        "{:>12} {} {} {}",
        status_style(status).apply_to(status.label()),
        mutant.mutation_type(),
        dim.apply_to("at"),
        mutant.site().location(),
    );
}

pub fn print_summary(summary: &Summary, cancelled: bool) {
    println!();
    if cancelled {
        let style = Style::new().yellow().bold();
        println!("{} run cancelled; partial results", style.apply_to("!"));
    }
    let dim = Style::new().dim();
    println!(
        "Killed: {}, Lived: {}, Timed out: {}, Not viable: {}, Not covered: {}",
        summary.killed, summary.lived, summary.timed_out, summary.not_viable, summary.not_covered,
    );
    if summary.runnable > 0 {
        println!("Runnable (not tested): {}", summary.runnable);
    }
    println!(
        "Efficacy: {:.2}%, Mutation coverage: {:.2}% {}",
        summary.efficacy,
        summary.mutation_coverage,
        dim.apply_to(format!("({} mutants in {:.1}s)", summary.total, summary.duration_ms as f64 / 1000.0)),
    );
}

pub fn print_threshold_violation(violation: ThresholdViolation, summary: &Summary, thresholds: &Thresholds) {
    let (name, actual, required) = match violation {
        ThresholdViolation::Efficacy => ("efficacy", summary.efficacy, thresholds.efficacy),
        ThresholdViolation::MutationCoverage => (
            "mutation coverage",
            summary.mutation_coverage,
            thresholds.mutation_coverage,
        ),
    };
    print_error(&format!(
        "{} {:.2}% is below the required {:.2}%",
        name,
        actual,
        required.unwrap_or_default(),
    ));
}

pub fn print_mutant_detail(m: &MutantRecord) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    let label = m.ref_id.clone().unwrap_or_else(|| format!("#{}", m.id));
    println!(
        "{} {} [{}] {}",
        ref_style.apply_to(format!("@{}", label)),
        m.location(),
        m.mutation_type,
        status_style(m.status).apply_to(m.status.label()),
    );
    println!();

    for line in &m.context_before {
        println!("  {}", dim.apply_to(line));
    }

    if m.diff.is_empty() {
        println!("  {} → {}", m.original, m.replacement);
    }
    for line in m.diff.lines() {
        if line.starts_with('-') {
            let del_style = Style::new().red();
            println!("  {}", del_style.apply_to(line));
        } else if line.starts_with('+') {
            let add_style = Style::new().green();
            println!("  {}", add_style.apply_to(line));
        }
    }

    for line in &m.context_after {
        println!("  {}", dim.apply_to(line));
    }
}

pub fn print_status(result: &RunResult) {
    let s = &result.summary;
    println!(
        "Last run ({}, {}): {} mutants, {} killed, {} lived ({:.1}% efficacy, {:.1}% mutation coverage)",
        result.language,
        result.root,
        s.total,
        s.killed,
        s.lived,
        s.efficacy,
        s.mutation_coverage,
    );
    if result.cancelled {
        println!("The run was cancelled before every mutant was tested.");
    }

    if s.lived > 0 {
        println!();
        for m in result.lived() {
            let ref_style = Style::new().cyan().bold();
            println!(
                "  {} {} {} → {}",
                ref_style.apply_to(format!("@{}", m.ref_id.as_deref().unwrap_or("?"))),
                m.location(),
                m.original,
                m.replacement,
            );
        }
        println!();
        println!("Use `mutest show @m1` for details on a specific mutant.");
    }
}

pub fn print_types(enabled: impl Fn(MutationType) -> bool) {
    let dim = Style::new().dim();
    for mutation_type in MutationType::ALL {
        let state = if enabled(mutation_type) {
            Style::new().green().apply_to("enabled ")
        } else {
            dim.apply_to("disabled")
        };
        let default = if mutation_type.enabled_by_default() {
            "on by default"
        } else {
            "off by default"
        };
        println!(
            "{} {:<28} {}",
            state,
            mutation_type.name(),
            dim.apply_to(default)
        );
    }
}
