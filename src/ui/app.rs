//! View-state machine for test runs.
//!
//! Everything the aggregator reacts to — key input, spinner ticks, probe
//! results — is one tagged union dispatched through [`App::handle`]. The
//! machine owns the per-run result stream and replaces it, together with
//! the collected-results vector, on every new run: a stale stream is simply
//! dropped, so no result from a prior run can ever reach the new view
//! state.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::orchestrator::{self, RunHandle};
use crate::probe::TestResult;
use crate::registry::Registry;

/// Aggregator mode. Transitions are monotonic within one run; only an
/// explicit new start returns the machine to a pre-complete mode, and that
/// allocates a brand-new stream/state pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    AwaitingDestination,
    Running,
    Complete,
}

/// One consumed event. The liveness tick is a distinct variant so it can
/// never be miscounted as a result.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    Result(TestResult),
}

pub struct App {
    registry: Registry,
    audit: AuditLog,
    run: Option<RunHandle>,
    pub mode: Mode,
    /// Destination being typed while awaiting confirmation.
    pub input: String,
    /// Confirmed destination for the current run.
    pub destination: String,
    /// Results in arrival order — not registry order; probes finish
    /// concurrently.
    pub results: Vec<TestResult>,
    pub expected: usize,
    pub spinner_frame: usize,
    pub status: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(registry: Registry, audit: AuditLog) -> Self {
        let status = format!(
            "{} vantage hosts loaded - press 't' to start tests, 'q' to quit",
            registry.servers.len()
        );
        Self {
            registry,
            audit,
            run: None,
            mode: Mode::Idle,
            input: String::new(),
            destination: String::new(),
            results: Vec::new(),
            expected: 0,
            spinner_frame: 0,
            status,
            should_quit: false,
        }
    }

    pub fn host_count(&self) -> usize {
        self.registry.servers.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Pull at most one pending result without blocking. The stream is
    /// consumed one item per call and re-requested by the event loop after
    /// each result; completion never depends on the channel disconnecting.
    pub fn poll_result(&self) -> Option<TestResult> {
        self.run.as_ref().and_then(|run| run.results.try_recv().ok())
    }

    /// The single reducer for all event kinds.
    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Tick => {
                if self.mode == Mode::Running {
                    self.spinner_frame = self.spinner_frame.wrapping_add(1);
                }
            }
            AppEvent::Result(result) => self.handle_result(result),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.mode {
            Mode::AwaitingDestination => match key.code {
                KeyCode::Enter => self.confirm_destination(),
                KeyCode::Esc => {
                    self.input.clear();
                    self.mode = if self.expected > 0 && self.results.len() == self.expected {
                        Mode::Complete
                    } else {
                        Mode::Idle
                    };
                    self.status = "Destination entry cancelled".into();
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            Mode::Idle | Mode::Complete => match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('t') => {
                    self.mode = Mode::AwaitingDestination;
                    self.input.clear();
                    self.status =
                        "Enter destination address (Enter to confirm, Esc to cancel)".into();
                }
                _ => {}
            },
            // In-flight probes are not cancellable; quitting abandons them
            // along with the process.
            Mode::Running => {
                if key.code == KeyCode::Char('q') {
                    self.should_quit = true;
                }
            }
        }
    }

    fn confirm_destination(&mut self) {
        let destination = self.input.trim().to_string();
        if destination.is_empty() {
            self.status = "Destination must not be empty".into();
            return;
        }

        let handle = orchestrator::start(&self.registry.servers, &destination, &self.audit);
        self.begin_run(destination, handle);
    }

    /// Install a brand-new stream/state pair and enter Running.
    fn begin_run(&mut self, destination: String, handle: RunHandle) {
        info!(destination = %destination, hosts = handle.expected, "run started");
        self.destination = destination;
        self.results = Vec::new();
        self.expected = handle.expected;
        self.run = Some(handle);
        self.input.clear();
        self.spinner_frame = 0;
        self.mode = Mode::Running;
        self.status = format!(
            "Testing {} from {} vantage hosts...",
            self.destination, self.expected
        );
    }

    fn handle_result(&mut self, result: TestResult) {
        if self.mode != Mode::Running {
            warn!(server = %result.server, "result received outside a running test; ignored");
            return;
        }

        self.results.push(result);
        debug_assert!(self.results.len() <= self.expected);

        if self.results.len() == self.expected {
            self.run = None;
            self.mode = Mode::Complete;
            self.status = format!("{}/{} tests passed", self.passed(), self.expected);
            info!(
                passed = self.passed(),
                total = self.expected,
                destination = %self.destination,
                "run complete"
            );
        }
    }
}
