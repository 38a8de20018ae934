//! Worker pool driving apply -> test -> classify -> rollback.
//!
//! The calling thread pulls mutants from the (lazy) discovery sequence and
//! spawns one job per runnable mutant on a fixed-size rayon pool. Every pool
//! thread owns a private workspace: the first works in the module root, the
//! others in temporary copies of it, so a test run only ever sees its own
//! mutation. Results are reported to the caller as they arrive and returned
//! in discovery order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::copy_tree::copy_tree;
use crate::error::EngineError;
use crate::guard::{FileGuard, FileLocks};
use crate::mutants::{Mutant, Status, generate_diff};
use crate::mutator::{Mutate, Mutation};
use crate::runner::{TestRequest, TestRunner, TestVerdict, Timeouts};

/// Cooperative stop flag shared between the run and whoever interrupts it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub dry_run: bool,
    pub timeouts: Timeouts,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            workers: default_workers(),
            dry_run: false,
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Reported mutants in discovery order.
    pub mutants: Vec<Mutant>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct Scheduler<'r> {
    root: PathBuf,
    runner: &'r dyn TestRunner,
    config: SchedulerConfig,
    suite_duration: Duration,
    cancel: CancellationToken,
    locks: FileLocks,
}

impl<'r> Scheduler<'r> {
    /// `root` is the module root that mutant file paths are relative to.
    pub fn new(root: impl Into<PathBuf>, runner: &'r dyn TestRunner, config: SchedulerConfig) -> Self {
        Scheduler {
            root: root.into(),
            runner,
            config,
            suite_duration: Duration::ZERO,
            cancel: CancellationToken::new(),
            locks: FileLocks::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run time of the unmutated suite, the base for per-mutant timeouts.
    pub fn with_suite_duration(mut self, duration: Duration) -> Self {
        self.suite_duration = duration;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeouts.for_suite(self.suite_duration)
    }

    pub fn run<I>(&self, mutants: I) -> Result<RunOutcome, EngineError>
    where
        I: IntoIterator<Item = Mutant>,
    {
        self.run_with(mutants, |_| {})
    }

    /// Like [`Scheduler::run`], calling `on_result` on the calling thread for
    /// each mutant as soon as it is final.
    pub fn run_with<I, F>(&self, mutants: I, on_result: F) -> Result<RunOutcome, EngineError>
    where
        I: IntoIterator<Item = Mutant>,
        F: FnMut(&Mutant),
    {
        let start = Instant::now();
        let mut sink = Sink {
            on_result,
            reported: Vec::new(),
            fatal: None,
        };

        if self.config.dry_run {
            tracing::info!("dry run: discovery and coverage only");
            for mutant in mutants {
                if self.cancel.is_cancelled() {
                    break;
                }
                sink.report(mutant);
            }
        } else {
            let workers = self.config.workers.max(1);
            tracing::info!(workers, timeout_ms = self.timeout().as_millis() as u64, "starting workers");
            self.dispatch(mutants, workers, &mut sink);
        }

        if let Some(error) = sink.fatal {
            return Err(error);
        }
        let mut reported = sink.reported;
        reported.sort_by_key(Mutant::id);
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::warn!(reported = reported.len(), "run cancelled");
        }
        Ok(RunOutcome {
            mutants: reported,
            cancelled,
            elapsed: start.elapsed(),
        })
    }

    fn dispatch<I, F>(&self, mutants: I, workers: usize, sink: &mut Sink<F>)
    where
        I: IntoIterator<Item = Mutant>,
        F: FnMut(&Mutant),
    {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mutest-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                sink.fatal = Some(EngineError::Io {
                    path: self.root.clone(),
                    source: std::io::Error::other(e),
                });
                return;
            }
        };
        let workspaces = match Workspaces::prepare(&self.root, workers) {
            Ok(workspaces) => workspaces,
            Err(e) => {
                sink.fatal = Some(e);
                return;
            }
        };

        let abort = AtomicBool::new(false);
        let stopped = || self.cancel.is_cancelled() || abort.load(Ordering::SeqCst);
        let (done_tx, done_rx) = mpsc::channel::<Result<Mutant, EngineError>>();
        let (stopped, abort, workspaces) = (&stopped, &abort, &workspaces);

        pool.in_place_scope(|scope| {
            for mutant in mutants {
                if stopped() {
                    break;
                }
                if mutant.status() != Status::Runnable {
                    sink.report(mutant);
                    continue;
                }
                tracing::debug!(id = mutant.id(), site = %mutant.site().location(), "dispatching");
                let done_tx = done_tx.clone();
                scope.spawn(move |_| {
                    if stopped() {
                        return;
                    }
                    let mut mutant = mutant;
                    let root = workspaces.for_thread(rayon::current_thread_index());
                    let result = self.process(root, &mut mutant).map(|()| mutant);
                    if result.is_err() {
                        abort.store(true, Ordering::SeqCst);
                    }
                    // The receiver only goes away once the scope is done.
                    let _ = done_tx.send(result);
                });
                sink.drain(&done_rx, false, abort);
            }
            drop(done_tx);
            sink.drain(&done_rx, true, abort);
        });
    }

    /// One full cycle for a runnable mutant. Only integrity failures and an
    /// unusable test runner come back as errors.
    fn process(&self, root: &Path, mutant: &mut Mutant) -> Result<(), EngineError> {
        let file = mutant.site().file.clone();
        let package = mutant.site().package().to_path_buf();
        let path = root.join(&file);

        let mutation = match Mutation::for_mutant(mutant) {
            Ok(mutation) => mutation,
            Err(e) => return not_viable(mutant, &e),
        };
        let mut guard = match FileGuard::acquire(&self.locks, &path) {
            Ok(guard) => guard,
            Err(e) => return not_viable(mutant, &e),
        };
        let mutated = match guard.apply(&mutation) {
            Ok(applied) => applied.source.clone(),
            Err(e) => {
                guard.release()?;
                return not_viable(mutant, &e);
            }
        };
        mutant.record_diff(generate_diff(guard.snapshot(), &mutated));
        tracing::debug!(id = mutant.id(), mutation = %mutation.describe(), "applied");

        let request = TestRequest {
            root,
            file: &file,
            package: &package,
            timeout: self.timeout(),
        };
        let outcome = self.runner.run(&request);
        guard.release()?;

        let status = match outcome {
            Ok(report) => {
                mutant.record_duration(report.duration);
                classify(report.verdict)
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(id = mutant.id(), error = %e, "test runner failed");
                Status::NotViable
            }
        };
        mutant.finalize(status)?;
        Ok(())
    }
}

pub fn classify(verdict: TestVerdict) -> Status {
    match verdict {
        TestVerdict::Passed => Status::Lived,
        TestVerdict::Failed => Status::Killed,
        TestVerdict::TimedOut => Status::TimedOut,
        TestVerdict::BuildFailed => Status::NotViable,
    }
}

fn not_viable(mutant: &mut Mutant, error: &dyn std::fmt::Display) -> Result<(), EngineError> {
    tracing::warn!(id = mutant.id(), site = %mutant.site().location(), error = %error, "mutant not viable");
    mutant.finalize(Status::NotViable)?;
    Ok(())
}

struct Sink<F> {
    on_result: F,
    reported: Vec<Mutant>,
    fatal: Option<EngineError>,
}

impl<F: FnMut(&Mutant)> Sink<F> {
    fn report(&mut self, mutant: Mutant) {
        (self.on_result)(&mutant);
        self.reported.push(mutant);
    }

    /// Collect finished work. With `wait` set, blocks until every job has
    /// dropped its sender.
    fn drain(&mut self, done: &Receiver<Result<Mutant, EngineError>>, wait: bool, abort: &AtomicBool) {
        loop {
            let next = if wait {
                done.recv().ok()
            } else {
                done.try_recv().ok()
            };
            match next {
                Some(Ok(mutant)) => self.report(mutant),
                Some(Err(error)) => {
                    tracing::error!(error = %error, "stopping run");
                    abort.store(true, Ordering::SeqCst);
                    self.fatal.get_or_insert(error);
                }
                None => return,
            }
        }
    }
}

/// One working tree per pool thread.
struct Workspaces {
    root: PathBuf,
    copies: Vec<TempDir>,
}

impl Workspaces {
    fn prepare(root: &Path, workers: usize) -> Result<Self, EngineError> {
        let io_error = |source| EngineError::Io {
            path: root.to_path_buf(),
            source,
        };
        let mut copies = Vec::with_capacity(workers.saturating_sub(1));
        for worker in 1..workers {
            let dir = tempfile::Builder::new()
                .prefix(&format!("mutest-worker-{worker}-"))
                .tempdir()
                .map_err(io_error)?;
            copy_tree(root, dir.path()).map_err(io_error)?;
            copies.push(dir);
        }
        Ok(Workspaces {
            root: root.to_path_buf(),
            copies,
        })
    }

    fn for_thread(&self, index: Option<usize>) -> &Path {
        match index {
            Some(i) if i > 0 => self.copies.get(i - 1).map_or(self.root.as_path(), |d| d.path()),
            _ => &self.root,
        }
    }
}
