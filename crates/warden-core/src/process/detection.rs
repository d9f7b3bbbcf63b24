//! Process detection for managed services.
//!
//! The process table is reached through the `ProcessQuery` trait so the
//! launcher can be driven by a fake table in tests.

use super::pid_file;
use crate::error::{Result, WardenError};
use crate::platform::{self, ProcessEntry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// How a process-table entry is compared against the service name.
///
/// Matching is a case-sensitive substring test, like `pgrep`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// The executable name contains the service name (`pgrep <name>`).
    #[default]
    Name,
    /// The full command line contains the service name (`pgrep -f <name>`).
    CommandLine,
}

impl MatchMode {
    pub fn matches(self, entry: &ProcessEntry, name: &str) -> bool {
        match self {
            MatchMode::Name => entry.name.contains(name),
            MatchMode::CommandLine => entry.cmdline.contains(name),
        }
    }
}

impl FromStr for MatchMode {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(MatchMode::Name),
            "command-line" | "cmdline" => Ok(MatchMode::CommandLine),
            other => Err(WardenError::validation(
                "match_mode",
                format!("unknown match mode '{}' (expected name or command-line)", other),
            )),
        }
    }
}

/// Which implementation snapshots the process table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryBackend {
    /// Shell out to `ps` (Unix only).
    Ps,
    /// Read the table through `sysinfo`.
    #[default]
    Sysinfo,
}

impl FromStr for QueryBackend {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ps" => Ok(QueryBackend::Ps),
            "sysinfo" => Ok(QueryBackend::Sysinfo),
            other => Err(WardenError::validation(
                "backend",
                format!("unknown query backend '{}' (expected ps or sysinfo)", other),
            )),
        }
    }
}

/// How the process was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSource {
    /// Detected via PID file.
    PidFile,
    /// Detected via process table scan.
    ProcessScan,
}

/// A running process that matched the service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMatch {
    /// Process ID.
    pub pid: u32,
    /// How the process was detected.
    pub source: ProcessSource,
    /// Command line (if detected via process scan).
    pub cmdline: Option<String>,
}

/// Point-in-time lookup of running processes by name.
pub trait ProcessQuery {
    /// Find processes matching `name`, never including the calling process.
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>>;
}

impl<Q: ProcessQuery + ?Sized> ProcessQuery for Box<Q> {
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>> {
        (**self).find_by_name(name, mode)
    }
}

impl<Q: ProcessQuery + ?Sized> ProcessQuery for &Q {
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>> {
        (**self).find_by_name(name, mode)
    }
}

/// Filter a process table snapshot down to the entries matching `name`.
///
/// The calling process is excluded: with `CommandLine` matching our own
/// arguments usually contain the service name.
pub fn filter_matches(entries: Vec<ProcessEntry>, name: &str, mode: MatchMode) -> Vec<ProcessMatch> {
    let own_pid = std::process::id();

    let mut matches = entries
        .into_iter()
        .filter(|entry| entry.pid != own_pid && mode.matches(entry, name))
        .map(|entry| ProcessMatch {
            pid: entry.pid,
            source: ProcessSource::ProcessScan,
            cmdline: Some(entry.cmdline),
        })
        .collect::<Vec<_>>();

    // Oldest PID first so repeated checks report the same instance
    matches.sort_by_key(|m| m.pid);
    matches
}

/// Process table scan through `ps`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsProcessQuery;

impl ProcessQuery for PsProcessQuery {
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>> {
        let entries = platform::scan_with_ps().map_err(|e| WardenError::ProcessQueryFailed {
            message: format!("ps scan failed: {}", e),
            source: Some(e),
        })?;
        Ok(filter_matches(entries, name, mode))
    }
}

/// Process table scan through `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProcessQuery;

impl ProcessQuery for SysinfoProcessQuery {
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>> {
        Ok(filter_matches(platform::scan_with_sysinfo(), name, mode))
    }
}

/// Build the scanner for a backend.
pub fn query_for_backend(backend: QueryBackend) -> Box<dyn ProcessQuery> {
    match backend {
        QueryBackend::Ps => Box::new(PsProcessQuery),
        QueryBackend::Sysinfo => Box::new(SysinfoProcessQuery),
    }
}

/// Consults a PID file alongside a process table scan.
///
/// The recorded PID is only trusted when the scan also matches it, so a PID
/// reused by an unrelated process never stands in for the service. A live
/// confirmed PID is reported first, whatever its rank in the scan. A PID file
/// that is dead or unconfirmed is removed so the next launch can write a
/// fresh one.
pub struct PidFileQuery<Q> {
    pid_file: PathBuf,
    inner: Q,
}

impl<Q: ProcessQuery> PidFileQuery<Q> {
    pub fn new(pid_file: impl AsRef<Path>, inner: Q) -> Self {
        Self {
            pid_file: pid_file.as_ref().to_path_buf(),
            inner,
        }
    }

    /// A PID from the file that still belongs to a live process other than us.
    fn live_recorded_pid(&self) -> Option<u32> {
        if !self.pid_file.exists() {
            return None;
        }

        let pid = pid_file::read_pid_file(&self.pid_file)?;

        if pid == std::process::id() || !platform::is_process_alive(pid) {
            debug!(
                "Stale PID file {:?}: process {} not running",
                self.pid_file, pid
            );
            self.discard();
            return None;
        }

        Some(pid)
    }

    fn discard(&self) {
        if let Err(e) = pid_file::remove_pid_file(&self.pid_file) {
            warn!("Failed to remove stale PID file: {}", e);
        }
    }
}

impl<Q: ProcessQuery> ProcessQuery for PidFileQuery<Q> {
    fn find_by_name(&self, name: &str, mode: MatchMode) -> Result<Vec<ProcessMatch>> {
        let recorded = self.live_recorded_pid();
        let mut found = self.inner.find_by_name(name, mode)?;

        let Some(pid) = recorded else {
            return Ok(found);
        };

        match found.iter().position(|m| m.pid == pid) {
            Some(index) => {
                debug!("{} confirmed via PID file: {}", name, pid);
                let mut confirmed = found.remove(index);
                confirmed.source = ProcessSource::PidFile;
                found.insert(0, confirmed);
            }
            None => {
                debug!(
                    "PID file {:?} names process {}, which doesn't match {}",
                    self.pid_file, pid, name
                );
                self.discard();
            }
        }
        Ok(found)
    }
}
