//! Detached process spawning.

use super::pid_file;
use super::service::LaunchCommand;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

// Platform-specific imports for process detachment
#[cfg(unix)]
use std::os::unix::process::CommandExt;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Starts a process without waiting for it.
pub trait Spawner {
    /// Start `command` detached from the caller and return its PID.
    fn spawn_detached(&self, command: &LaunchCommand) -> io::Result<u32>;
}

impl<S: Spawner + ?Sized> Spawner for Box<S> {
    fn spawn_detached(&self, command: &LaunchCommand) -> io::Result<u32> {
        (**self).spawn_detached(command)
    }
}

impl<S: Spawner + ?Sized> Spawner for &S {
    fn spawn_detached(&self, command: &LaunchCommand) -> io::Result<u32> {
        (**self).spawn_detached(command)
    }
}

/// Options applied to every process a `DetachedSpawner` starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set.
    pub env: HashMap<String, String>,
    /// File receiving the child's stdout and stderr (appended). Null when unset.
    pub log_file: Option<PathBuf>,
    /// Path to write the child's PID to after a successful spawn.
    pub pid_file: Option<PathBuf>,
}

/// Spawns real OS processes in their own session.
#[derive(Debug, Clone, Default)]
pub struct DetachedSpawner {
    options: SpawnOptions,
}

impl DetachedSpawner {
    pub fn new(options: SpawnOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpawnOptions {
        &self.options
    }

    fn build_command(&self, launch: &LaunchCommand) -> io::Result<Command> {
        let mut cmd = Command::new(launch.program());
        cmd.args(launch.args());

        if let Some(ref dir) = self.options.working_dir {
            cmd.current_dir(dir);
        }

        // Set environment variables
        for (key, value) in &self.options.env {
            cmd.env(key, value);
        }

        // The child must never read from the login shell's terminal
        cmd.stdin(Stdio::null());

        if let Some(ref log_file) = self.options.log_file {
            // Ensure parent directory exists
            if let Some(parent) = log_file.parent() {
                fs::create_dir_all(parent)?;
            }

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            let stdout_file = file.try_clone()?;
            cmd.stdout(Stdio::from(stdout_file));
            cmd.stderr(Stdio::from(file));
        } else {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }

        detach(&mut cmd);
        Ok(cmd)
    }
}

/// Detach the child so it outlives the caller and isn't tied to its terminal.
#[cfg(unix)]
#[allow(unsafe_code)]
fn detach(cmd: &mut Command) {
    // SAFETY: setsid() is async-signal-safe and touches no memory shared
    // with the parent. The child becomes a session leader without a
    // controlling terminal, so closing the login shell doesn't hang it up.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    // CREATE_NEW_PROCESS_GROUP detaches the process on Windows
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}

impl Spawner for DetachedSpawner {
    fn spawn_detached(&self, launch: &LaunchCommand) -> io::Result<u32> {
        let mut cmd = self.build_command(launch)?;

        info!("Launching {}", launch);

        // The Child handle is dropped without wait(); the process keeps
        // running and is reaped by init once we exit.
        let child = cmd.spawn()?;
        let pid = child.id();

        if let Some(ref path) = self.options.pid_file {
            match pid_file::write_pid_file(path, pid) {
                Ok(()) => debug!("Wrote PID file {}", path.display()),
                Err(e) => warn!("Failed to write PID file: {}", e),
            }
        }

        info!("Launched process with PID {}", pid);
        Ok(pid)
    }
}
