//! Platform-specific process management.
//!
//! This module provides cross-platform abstractions for checking process
//! status and scanning the process table.

use std::io;
use tracing::debug;

/// One row of the OS process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Process ID.
    pub pid: u32,
    /// Executable name (may be truncated by the OS, e.g. 15 bytes on Linux).
    pub name: String,
    /// Full command line, space-joined.
    pub cmdline: String,
}

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: Uses `kill(pid, 0)` signal check; `EPERM` still means alive
/// - **Windows**: Uses `OpenProcess` with `PROCESS_QUERY_LIMITED_INFORMATION`
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        is_process_alive_unix(pid)
    }

    #[cfg(windows)]
    {
        is_process_alive_windows(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Fallback: assume it exists
        tracing::warn!("Process alive check not implemented for this platform");
        true
    }
}

#[cfg(unix)]
fn is_process_alive_unix(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return false,
    };

    // Signal 0 doesn't actually send a signal, just checks if we can
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn is_process_alive_windows(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    // SAFETY: OpenProcess has no memory-safety preconditions and the handle
    // is closed before returning.
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            false
        } else {
            CloseHandle(handle);
            true
        }
    }
}

/// Snapshot the process table with `ps`.
///
/// # Platform Behavior
/// - **Linux/macOS**: Runs `ps -eo pid=,comm=` and `ps -eo pid=,args=` and joins
///   the two by PID
/// - **Other**: Returns `Unsupported`
///
/// Failing to run `ps`, or `ps` exiting unsuccessfully, is an error rather
/// than an empty table so callers can tell "nothing running" from "could not
/// look".
pub fn scan_with_ps() -> io::Result<Vec<ProcessEntry>> {
    #[cfg(unix)]
    {
        use std::collections::HashMap;

        let names = run_ps("pid=,comm=")?;
        let mut cmdlines: HashMap<u32, String> = run_ps("pid=,args=")?.into_iter().collect();

        let entries = names
            .into_iter()
            .map(|(pid, name)| {
                let cmdline = cmdlines.remove(&pid).unwrap_or_default();
                ProcessEntry { pid, name, cmdline }
            })
            .collect::<Vec<_>>();

        debug!("ps reported {} processes", entries.len());
        Ok(entries)
    }

    #[cfg(not(unix))]
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "the ps backend is only available on Unix",
        ))
    }
}

#[cfg(unix)]
fn run_ps(format: &str) -> io::Result<Vec<(u32, String)>> {
    use std::process::Command;

    let output = Command::new("ps").args(["-eo", format]).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!(
            "ps exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `pid=,<field>=` rows as printed by `ps`.
///
/// Lines that don't start with a numeric PID are skipped.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn parse_ps_output(stdout: &str) -> Vec<(u32, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let pid: u32 = pid.parse().ok()?;
            Some((pid, rest.trim().to_string()))
        })
        .collect()
}

/// Snapshot the process table with `sysinfo`.
///
/// On Linux `sysinfo` lists every thread as its own entry sharing the
/// process's command line. Threads are dropped so each process appears once.
pub fn scan_with_sysinfo() -> Vec<ProcessEntry> {
    use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
    );

    let entries = system
        .processes()
        .iter()
        .filter(|(_, process)| process.thread_kind().is_none())
        .map(|(pid, process)| ProcessEntry {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().into_owned(),
            cmdline: process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect::<Vec<_>>();

    debug!("sysinfo reported {} processes", entries.len());
    entries
}
