//! Singleton launching: start a service only if it isn't already running.

use super::detection::{MatchMode, ProcessQuery};
use super::service::ServiceHandle;
use super::spawner::Spawner;
use crate::error::{Result, WardenError};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Outcome of one `ensure_running` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    /// A matching process was found; nothing was started.
    AlreadyRunning,
    /// No matching process was found and a new one was started.
    Launched,
    /// No matching process was found and starting one failed.
    LaunchFailed,
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LaunchStatus::AlreadyRunning => "already running",
            LaunchStatus::Launched => "launched",
            LaunchStatus::LaunchFailed => "launch failed",
        };
        f.write_str(s)
    }
}

/// Result of ensuring a service is running.
#[derive(Debug)]
pub struct LaunchResult {
    pub status: LaunchStatus,
    /// The matched PID, or the PID of the new process. Never set on failure.
    pub pid: Option<u32>,
    /// Why the launch failed (only for `LaunchFailed`).
    pub error: Option<WardenError>,
    /// The process table query failed and was treated as "not running".
    pub query_error: Option<WardenError>,
}

impl LaunchResult {
    fn already_running(pid: u32) -> Self {
        Self {
            status: LaunchStatus::AlreadyRunning,
            pid: Some(pid),
            error: None,
            query_error: None,
        }
    }

    fn launched(pid: u32, query_error: Option<WardenError>) -> Self {
        Self {
            status: LaunchStatus::Launched,
            pid: Some(pid),
            error: None,
            query_error,
        }
    }

    fn failed(error: WardenError, query_error: Option<WardenError>) -> Self {
        Self {
            status: LaunchStatus::LaunchFailed,
            pid: None,
            error: Some(error),
            query_error,
        }
    }

    /// Whether the service is running after the call.
    pub fn is_success(&self) -> bool {
        self.status != LaunchStatus::LaunchFailed
    }
}

/// Receives the human-readable status lines.
pub trait StatusSink {
    fn report(&mut self, line: &str);
}

/// Prints status lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn report(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Collects status lines in memory.
impl StatusSink for Vec<String> {
    fn report(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl<S: StatusSink + ?Sized> StatusSink for &mut S {
    fn report(&mut self, line: &str) {
        (**self).report(line);
    }
}

/// Keeps at most one instance of a service running.
///
/// The launcher checks first and launches only on a negative result, once
/// per call, with no retry. It does not serialize separate invocations; see
/// `LaunchLock` for that.
pub struct SingletonLauncher<Q, S, R> {
    query: Q,
    spawner: S,
    sink: R,
    match_mode: MatchMode,
}

impl<Q, S, R> SingletonLauncher<Q, S, R>
where
    Q: ProcessQuery,
    S: Spawner,
    R: StatusSink,
{
    pub fn new(query: Q, spawner: S, sink: R) -> Self {
        Self {
            query,
            spawner,
            sink,
            match_mode: MatchMode::default(),
        }
    }

    /// Set how process table entries are matched against the service name.
    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn into_sink(self) -> R {
        self.sink
    }

    /// Make sure `handle` is running, starting it if no instance is found.
    ///
    /// Returns `Err` only when the handle is invalid; that check happens
    /// before the process table is touched. Every other outcome, including
    /// query and launch failures, is reported in the `LaunchResult`.
    pub fn ensure_running(&mut self, handle: &mut ServiceHandle) -> Result<LaunchResult> {
        handle.validate()?;
        let name = handle.name().to_string();

        let (found, query_error) = match self.query.find_by_name(&name, self.match_mode) {
            Ok(found) => (found, None),
            Err(e) => {
                warn!("Process query for {} failed, assuming not running: {}", name, e);
                (Vec::new(), Some(e))
            }
        };

        if let Some(first) = found.first() {
            if found.len() > 1 {
                warn!(
                    "{} instances of {} are running; reporting PID {}",
                    found.len(),
                    name,
                    first.pid
                );
            }
            debug!("{} matched PID {} via {:?}", name, first.pid, first.source);

            handle.set_running_pid(first.pid);
            self.sink.report(&format!("{} is running", name));
            return Ok(LaunchResult::already_running(first.pid));
        }

        self.sink.report(&format!("start {}", name));

        match self.spawner.spawn_detached(handle.launch_command()) {
            Ok(pid) => {
                info!("Started {} with PID {}", name, pid);
                handle.set_running_pid(pid);
                Ok(LaunchResult::launched(pid, query_error))
            }
            Err(source) => {
                error!("Failed to start {}: {}", name, source);
                self.sink
                    .report(&format!("failed to start {}: {}", name, source));
                Ok(LaunchResult::failed(
                    WardenError::LaunchFailed { name, source },
                    query_error,
                ))
            }
        }
    }

    /// Look for a running instance without ever launching one.
    pub fn status(&self, handle: &ServiceHandle) -> Result<Option<u32>> {
        handle.validate_name()?;
        let found = self.query.find_by_name(handle.name(), self.match_mode)?;
        Ok(found.first().map(|m| m.pid))
    }
}
