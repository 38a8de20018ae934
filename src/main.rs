use mutest::Language;
use mutest::catalog::EnabledTypes;
use mutest::config::{Overrides, RepoConfig, Settings};
use mutest::copy_tree;
use mutest::coverage::{self, AssumeCovered, CoverageIndex, ProfileIndex};
use mutest::discovery::{self, Discovery};
use mutest::guard;
use mutest::mutants::Mutant;
use mutest::output;
use mutest::parser::{self, ParsedFile};
use mutest::runner::CommandRunner;
use mutest::scheduler::{CancellationToken, Scheduler};
use mutest::state;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mutest", version, about = "Mutation testing for Go and Rust modules")]
struct Cli {
    /// Log more (-v info, -vv debug). MUTEST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation testing on a module
    Unleash(UnleashArgs),
    /// Show details for a mutant from the last run
    Show {
        /// Mutant ref (e.g. @m1, m1) or numeric id
        #[arg(name = "ref")]
        mutant_ref: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary of last run
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List mutation types and whether they are enabled
    Types {
        /// Module whose .mutest.toml to apply (default: current directory)
        path: Option<PathBuf>,
    },
}

#[derive(Args)]
struct UnleashArgs {
    /// Module directory, or a single source file inside it (default: current directory)
    path: Option<PathBuf>,
    /// Discover and classify coverage only; never mutate or run tests
    #[arg(long)]
    dry_run: bool,
    /// Run the whole module's tests for every mutant
    #[arg(long)]
    integration: bool,
    /// Number of concurrent workers (default: available CPUs)
    #[arg(short, long, env = "MUTEST_WORKERS")]
    workers: Option<usize>,
    /// Timeout multiplier applied to the baseline suite duration
    #[arg(long = "timeout-mult", env = "MUTEST_TIMEOUT_MULT")]
    timeout_multiplier: Option<f64>,
    /// Fixed time added to every mutant's timeout, in milliseconds
    #[arg(long, env = "MUTEST_TIMEOUT_ALLOWANCE_MS")]
    timeout_allowance_ms: Option<u64>,
    /// Test command override (default: `go test -count=1 -failfast` / `cargo test --quiet`)
    #[arg(long, env = "MUTEST_TEST_CMD")]
    test_cmd: Option<String>,
    /// Glob of root-relative paths never mutated (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
    /// Mutation types to enable, comma separated
    #[arg(long, value_delimiter = ',')]
    enable: Vec<String>,
    /// Mutation types to disable, comma separated
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,
    /// Minimum efficacy percentage (exit code 10 when missed)
    #[arg(long, env = "MUTEST_THRESHOLD_EFFICACY")]
    threshold_efficacy: Option<f64>,
    /// Minimum mutation coverage percentage (exit code 11 when missed)
    #[arg(long, env = "MUTEST_THRESHOLD_MCOVER")]
    threshold_mcover: Option<f64>,
    /// Function name to scope mutations to (requires a file path)
    #[arg(short, long)]
    function: Option<String>,
    /// Also write the JSON results to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,
    /// Exit code only, no output
    #[arg(short, long)]
    quiet: bool,
    /// Exit with code 1 when any mutant lived
    #[arg(long)]
    fail_on_lived: bool,
    /// Mutate the module in place instead of a temporary copy
    #[arg(long)]
    in_place: bool,
    /// Session ID for the temporary copy (default: auto-generated)
    #[arg(long)]
    session: Option<String>,
}

impl UnleashArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            dry_run: self.dry_run,
            integration: self.integration,
            timeout_multiplier: self.timeout_multiplier,
            timeout_allowance_ms: self.timeout_allowance_ms,
            test_cmd: self.test_cmd.clone(),
            exclude: self.exclude.clone(),
            enable: self.enable.clone(),
            disable: self.disable.clone(),
            threshold_efficacy: self.threshold_efficacy,
            threshold_mcover: self.threshold_mcover,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Unleash(args) => cmd_unleash(args),
        Commands::Show { mutant_ref, json } => cmd_show(mutant_ref, json),
        Commands::Status { json } => cmd_status(json),
        Commands::Types { path } => cmd_types(path),
    };

    let exit_code = result.unwrap_or_else(|e| {
        output::print_error(&format!("{e:#}"));
        3
    });
    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("MUTEST_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// Where mutation happens: the module itself or a throwaway copy of it.
struct Workspace {
    root: PathBuf,
    _temp_dir: Option<tempfile::TempDir>,
}

impl Workspace {
    fn isolated(module_root: &Path, session: Option<String>) -> anyhow::Result<Self> {
        let session_id = session.unwrap_or_else(generate_session_id);
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("mutest-{}-", session_id))
            .tempdir()
            .context("failed to create temp directory")?;
        copy_tree::copy_tree(module_root, temp_dir.path()).context("failed to copy module tree")?;
        Ok(Workspace {
            root: temp_dir.path().to_path_buf(),
            _temp_dir: Some(temp_dir),
        })
    }

    fn in_place(module_root: &Path) -> Self {
        Workspace {
            root: module_root.to_path_buf(),
            _temp_dir: None,
        }
    }
}

fn cmd_unleash(args: UnleashArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let start = match &args.path {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) => cwd.join(p),
        None => cwd.clone(),
    };
    if !start.exists() {
        output::print_error(&format!("Path not found: {}", start.display()));
        return Ok(2);
    }
    let module_root = copy_tree::find_project_root(&start);
    let Some(language) = Language::detect(&module_root) else {
        output::print_error(&format!(
            "No go.mod or Cargo.toml found above {}. Run inside a Go or Rust module.",
            start.display()
        ));
        return Ok(2);
    };

    let recovered = guard::recover_interrupted(&module_root)?;
    if !recovered.is_empty() {
        let names: Vec<_> = recovered.iter().map(|p| p.display().to_string()).collect();
        output::print_error(&format!(
            "Recovered source files from a previously interrupted run: {}. Re-run to continue.",
            names.join(", ")
        ));
        return Ok(3);
    }

    let settings = match RepoConfig::load(&module_root)
        .and_then(|config| Settings::resolve(&config, &args.overrides()))
    {
        Ok(settings) => settings,
        Err(e) => {
            output::print_error(&e.to_string());
            return Ok(2);
        }
    };

    let single_file = if start.is_file() {
        let relative = start
            .strip_prefix(&module_root)
            .context("source file is outside the module root")?
            .to_path_buf();
        if !language.is_mutable_source(&relative) {
            output::print_error(&format!(
                "Not a mutable {} source file: {}",
                language,
                relative.display()
            ));
            return Ok(2);
        }
        Some(relative)
    } else {
        None
    };
    if args.function.is_some() && single_file.is_none() {
        output::print_error("--function needs a source file path, not a directory.");
        return Ok(2);
    }

    let workspace = if args.in_place {
        Workspace::in_place(&module_root)
    } else {
        Workspace::isolated(&module_root, args.session.clone())?
    };

    let relative_files = match &single_file {
        Some(file) => vec![file.clone()],
        None => copy_tree::find_source_files(&workspace.root, language, &settings.exclude)
            .context("failed to list source files")?,
    };
    let parsed = parse_all(&workspace.root, &relative_files);

    if let (Some(name), Some(file)) = (&args.function, parsed.first()) {
        let available = parser::list_functions(file);
        if !available.iter().any(|n| n == name) {
            output::print_error(&format!(
                "Function '{}' not found. Available: {}",
                name,
                available.join(", ")
            ));
            return Ok(2);
        }
    }

    let runner = CommandRunner::new(language, settings.test_cmd.as_deref())
        .integration(settings.integration);
    let dry_run = settings.scheduler.dry_run;

    let (coverage, suite_duration): (Option<Box<dyn CoverageIndex>>, _) = if dry_run {
        (None, Default::default())
    } else {
        let profile_dir = tempfile::tempdir().context("failed to create temp directory")?;
        let profile = profile_dir.path().join("coverage.out");
        let wants_profile = language == Language::Go;
        let duration = match runner.baseline(&workspace.root, wants_profile.then_some(profile.as_path())) {
            Ok(duration) => duration,
            Err(e) => {
                output::print_error(&format!("Tests fail before mutation. Fix failing tests first.\n{e}"));
                return Ok(3);
            }
        };
        let index: Box<dyn CoverageIndex> = if wants_profile && profile.exists() {
            let module_path = coverage::read_module_path(&workspace.root).unwrap_or_default();
            Box::new(ProfileIndex::load(&profile, &module_path)?)
        } else {
            Box::new(AssumeCovered)
        };
        (Some(index), duration)
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let scheduler = Scheduler::new(&workspace.root, &runner, settings.scheduler.clone())
        .with_cancellation(cancel)
        .with_suite_duration(suite_duration);

    let show_lines = !args.quiet && !args.json;
    let on_result = |m: &Mutant| {
        if show_lines {
            output::print_mutant_line(m);
        }
    };
    let mutants = mutants_for(&parsed, args.function.as_deref(), &settings.enabled, coverage.as_deref());
    let outcome = match scheduler.run_with(mutants, on_result) {
        Ok(outcome) => outcome,
        Err(e) => {
            output::print_error(&format!("Run aborted: {e}"));
            if let Some(path) = e.suspect_file() {
                output::print_error(&format!("Verify {} by hand before continuing.", path.display()));
            }
            return Ok(3);
        }
    };

    let result = state::RunResult::from_outcome(language, &module_root, &outcome);
    if let Err(e) = state::save_last_run(&result) {
        tracing::warn!(error = %e, "could not save run state");
    }
    if let Some(path) = &args.output {
        state::save_to_path(&result, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if !args.quiet {
        if args.json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            output::print_summary(&result.summary, result.cancelled);
        }
    }

    if !dry_run {
        if let Some(violation) = result.summary.check(&settings.thresholds) {
            if !args.quiet && !args.json {
                output::print_threshold_violation(violation, &result.summary, &settings.thresholds);
            }
            return Ok(violation.exit_code());
        }
    }
    if args.fail_on_lived && result.summary.lived > 0 {
        return Ok(1);
    }
    Ok(0)
}

fn parse_all(root: &Path, files: &[PathBuf]) -> Vec<ParsedFile> {
    files
        .iter()
        .filter_map(|file| match parser::parse_file(root, file) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "skipping file");
                None
            }
        })
        .collect()
}

fn mutants_for<'a>(
    parsed: &'a [ParsedFile],
    function: Option<&str>,
    enabled: &'a EnabledTypes,
    coverage: Option<&'a dyn CoverageIndex>,
) -> Box<dyn Iterator<Item = Mutant> + 'a> {
    match (function, parsed.first()) {
        (Some(name), Some(file)) => Box::new(
            Discovery::scoped(file, name, enabled, coverage)
                .into_iter()
                .flatten()
                .enumerate()
                .map(|(idx, mutant)| mutant.with_id(idx + 1)),
        ),
        _ => Box::new(discovery::discover(parsed, enabled, coverage)),
    }
}

fn cmd_show(mutant_ref: String, json_mode: bool) -> anyhow::Result<i32> {
    let reference = mutant_ref.trim_start_matches('@');

    let Some(last_run) = state::load_last_run() else {
        output::print_error("No previous run found. Run `mutest unleash` first.");
        return Ok(2);
    };

    match last_run.find(reference) {
        Some(m) => {
            if json_mode {
                println!("{}", serde_json::to_string(m)?);
            } else {
                output::print_mutant_detail(m);
            }
            Ok(0)
        }
        None => {
            let valid: Vec<_> = last_run
                .lived()
                .filter_map(|m| m.ref_id.as_deref())
                .map(|r| format!("@{}", r))
                .collect();
            output::print_error(&format!(
                "Mutant @{} not found. Lived refs: {}",
                reference,
                if valid.is_empty() { "none".to_string() } else { valid.join(", ") }
            ));
            Ok(2)
        }
    }
}

fn cmd_status(json_mode: bool) -> anyhow::Result<i32> {
    match state::load_last_run() {
        Some(result) => {
            if json_mode {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                output::print_status(&result);
            }
            Ok(0)
        }
        None => {
            output::print_error("No previous run found. Run `mutest unleash` first.");
            Ok(2)
        }
    }
}

fn cmd_types(path: Option<PathBuf>) -> anyhow::Result<i32> {
    let start = match path {
        Some(p) => p,
        None => std::env::current_dir().context("failed to get current directory")?,
    };
    let root = copy_tree::find_project_root(&start);
    let settings = match RepoConfig::load(&root)
        .and_then(|config| Settings::resolve(&config, &Overrides::default()))
    {
        Ok(settings) => settings,
        Err(e) => {
            output::print_error(&e.to_string());
            return Ok(2);
        }
    };
    output::print_types(|t| settings.enabled.contains(t));
    Ok(0)
}
