use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::Language;

/// One invocation of the test suite against the module at `root`.
#[derive(Debug, Clone)]
pub struct TestRequest<'a> {
    pub root: &'a Path,
    /// Mutated file, relative to `root`.
    pub file: &'a Path,
    /// Package directory of `file`, relative to `root`.
    pub package: &'a Path,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestVerdict {
    Passed,
    Failed,
    BuildFailed,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub verdict: TestVerdict,
    pub duration: Duration,
    pub output: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("test command `{program}` could not be started: {source}")]
    Unavailable { program: String, source: io::Error },
    #[error("test command failed: {0}")]
    Io(#[from] io::Error),
    #[error("tests fail without any mutation applied:\n{output}")]
    BaselineFailed { output: String },
}

impl RunnerError {
    /// Whether no further test run can succeed, so the whole run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunnerError::Unavailable { .. })
    }
}

/// External test runner. Implementations keep no state between calls.
pub trait TestRunner: Send + Sync {
    fn run(&self, request: &TestRequest<'_>) -> Result<TestReport, RunnerError>;
}

/// Per-mutant timeout derived from the unmutated suite's run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub multiplier: f64,
    pub allowance: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            multiplier: 3.0,
            allowance: Duration::from_secs(2),
        }
    }
}

impl Timeouts {
    pub fn for_suite(&self, suite: Duration) -> Duration {
        suite.mul_f64(self.multiplier.max(0.0)) + self.allowance
    }
}

pub fn parse_test_cmd(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    if parts.len() > 1 {
        (parts[0].to_string(), parts[1..].iter().map(|s| s.to_string()).collect())
    } else {
        (cmd.to_string(), vec![])
    }
}

/// Whether test output shows the code did not compile.
pub fn is_build_failure(language: Language, output: &str) -> bool {
    match language {
        Language::Go => output.contains("[build failed]") || output.contains("[setup failed]"),
        Language::Rust => output.contains("error[E") || output.contains("could not compile"),
    }
}

fn default_command(language: Language) -> &'static str {
    match language {
        Language::Go => "go test -count=1 -failfast",
        Language::Rust => "cargo test --quiet",
    }
}

/// Runs the suite as a subprocess in the module root.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    language: Language,
    program: String,
    args: Vec<String>,
    integration: bool,
}

impl CommandRunner {
    pub fn new(language: Language, test_cmd: Option<&str>) -> Self {
        let (program, args) = parse_test_cmd(test_cmd.unwrap_or(default_command(language)));
        CommandRunner {
            language,
            program,
            args,
            integration: false,
        }
    }

    /// Run the whole module's tests for every mutant instead of only the
    /// mutated package's.
    pub fn integration(mut self, integration: bool) -> Self {
        self.integration = integration;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn drives_go_tool(&self) -> bool {
        self.language == Language::Go
            && Path::new(&self.program).file_name().is_some_and(|n| n == "go")
    }

    fn command(&self, root: &Path, flags: &[String], target: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.drives_go_tool() {
            cmd.args(flags);
            cmd.arg(go_target(target));
        }
        cmd.current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Keep the terminal's Ctrl-C away from in-flight tests; the run
        // drains them before stopping.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child, RunnerError> {
        cmd.spawn().map_err(|source| RunnerError::Unavailable {
            program: self.program.clone(),
            source,
        })
    }

    /// Run the unmutated suite once and return how long it took. For the Go
    /// tool a cover profile is written to `coverprofile` when given.
    pub fn baseline(&self, root: &Path, coverprofile: Option<&Path>) -> Result<Duration, RunnerError> {
        let flags: Vec<String> = coverprofile
            .map(|profile| format!("-coverprofile={}", profile.display()))
            .into_iter()
            .collect();
        let cmd = self.command(root, &flags, None);

        tracing::info!(program = %self.program, root = %root.display(), "running baseline");
        let child = self.spawn(cmd)?;
        let report = wait_with_timeout(child, None)?;
        if report.verdict != TestVerdict::Passed {
            return Err(RunnerError::BaselineFailed {
                output: report.output,
            });
        }
        Ok(report.duration)
    }
}

impl TestRunner for CommandRunner {
    fn run(&self, request: &TestRequest<'_>) -> Result<TestReport, RunnerError> {
        // Backstop for test binaries that outlive a killed `go` process.
        let backstop = request.timeout * 2;
        let flags = [format!("-timeout={}ms", backstop.as_millis().max(1))];
        let target = (!self.integration).then_some(request.package);
        let mut cmd = self.command(request.root, &flags, target);
        cmd.env("MUTEST_FILE", request.file)
            .env("MUTEST_PACKAGE", request.package);

        let child = self.spawn(cmd)?;
        let mut report = wait_with_timeout(child, Some(request.timeout))?;
        if report.verdict == TestVerdict::Failed && is_build_failure(self.language, &report.output) {
            report.verdict = TestVerdict::BuildFailed;
        }
        Ok(report)
    }
}

fn go_target(package: Option<&Path>) -> String {
    match package {
        None => "./...".to_string(),
        Some(p) if p.as_os_str().is_empty() => ".".to_string(),
        Some(p) => format!("./{}", p.to_string_lossy().replace('\\', "/")),
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<String>> {
    let mut stream = stream?;
    Some(std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }))
}

/// Kill the child's whole process group, taking test binaries spawned by
/// the test driver down with it. Returns whether the group was signalled.
fn kill_group(child: &Child) -> bool {
    #[cfg(unix)]
    {
        signal_group("kill", child.id())
    }
    #[cfg(not(unix))]
    {
        let _ = child;
        false
    }
}

#[cfg(unix)]
fn signal_group(program: &str, pgid: u32) -> bool {
    let status = Command::new(program)
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            tracing::debug!(pgid, %status, "process group already gone");
            false
        }
        Err(e) => {
            tracing::warn!(pgid, program, error = %e, "could not kill test process group; child processes may outlive the timeout");
            false
        }
    }
}

fn wait_with_timeout(mut child: Child, timeout: Option<Duration>) -> Result<TestReport, RunnerError> {
    let start = Instant::now();
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if timeout.is_some_and(|limit| start.elapsed() > limit) {
                    kill_group(&child);
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers may block on pipes inherited by grandchildren;
                    // leave them detached.
                    return Ok(TestReport {
                        verdict: TestVerdict::TimedOut,
                        duration: start.elapsed(),
                        output: String::new(),
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                let _ = child.kill();
                return Err(RunnerError::Io(e));
            }
        }
    };
    let duration = start.elapsed();

    let mut output = String::new();
    for handle in [stdout, stderr].into_iter().flatten() {
        output.push_str(&handle.join().unwrap_or_default());
    }
    let verdict = if status.success() {
        TestVerdict::Passed
    } else {
        TestVerdict::Failed
    };
    Ok(TestReport {
        verdict,
        duration,
        output,
    })
}
