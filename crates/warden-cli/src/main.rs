//! Warden - start a background service unless it is already running.
//!
//! Meant to be called from a login script:
//!
//! ```text
//! warden --name glances --command "/usr/local/bin/glances -w"
//! ```

mod args;

use anyhow::Result;
use args::{Args, Command};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;
use warden_core::{platform, LaunchLock, LaunchStatus, StdoutSink, WardenConfig, WardenError};

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging; stdout is reserved for status lines
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    debug!(
        "warden {} on {}",
        env!("CARGO_PKG_VERSION"),
        platform::current_platform()
    );

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            let invalid_config = e
                .downcast_ref::<WardenError>()
                .map(WardenError::is_config_error)
                .unwrap_or(false);
            if invalid_config {
                ExitCode::from(WardenConfig::EXIT_INVALID_CONFIG)
            } else {
                ExitCode::from(WardenConfig::EXIT_LAUNCH_FAILED)
            }
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    let settings = args.service.to_settings().map_err(as_config_error)?;

    match args.command.unwrap_or(Command::Ensure) {
        Command::Ensure => ensure(settings.resolve(true)?),
        Command::Status => status(settings.resolve(false)?),
    }
}

fn ensure(settings: warden_core::ResolvedSettings) -> Result<u8> {
    // Held until we return, covering both the check and the launch
    let _lock = match settings.lock_file {
        Some(ref path) => Some(hold_launch_lock(path)?),
        None => None,
    };

    let mut handle = settings.handle.clone();
    let mut launcher = settings.launcher(StdoutSink);
    let result = launcher.ensure_running(&mut handle)?;

    if let Some(ref query_error) = result.query_error {
        eprintln!(
            "warden: {} step failed, assumed not running: {}",
            query_error.step(),
            query_error
        );
    }

    match result.status {
        LaunchStatus::AlreadyRunning | LaunchStatus::Launched => {
            debug!("{} {} (pid {:?})", handle.name(), result.status, result.pid);
            Ok(WardenConfig::EXIT_OK)
        }
        LaunchStatus::LaunchFailed => {
            if let Some(ref err) = result.error {
                eprintln!("warden: {} step failed: {}", err.step(), err);
            }
            Ok(WardenConfig::EXIT_LAUNCH_FAILED)
        }
    }
}

fn status(settings: warden_core::ResolvedSettings) -> Result<u8> {
    let launcher = settings.launcher(StdoutSink);
    let name = settings.handle.name();

    match launcher.status(&settings.handle)? {
        Some(pid) => {
            println!("{} is running (pid {})", name, pid);
            Ok(WardenConfig::EXIT_OK)
        }
        None => {
            println!("{} is not running", name);
            Ok(WardenConfig::EXIT_NOT_RUNNING)
        }
    }
}

/// Take the launch lock, waiting for any other warden that holds it.
///
/// Once the other holder is done its service is usually running, so the
/// check that follows finds it instead of launching a second copy.
fn hold_launch_lock(path: &Path) -> Result<LaunchLock> {
    if let Some(lock) = LaunchLock::try_acquire(path)? {
        return Ok(lock);
    }
    info!(
        "Another warden holds {}, waiting for it to finish",
        path.display()
    );
    Ok(LaunchLock::acquire(path)?)
}

/// Argument and config file problems exit with the invalid-config code.
fn as_config_error(e: anyhow::Error) -> anyhow::Error {
    if e.downcast_ref::<WardenError>().is_some() {
        return e;
    }
    anyhow::Error::new(WardenError::Config {
        message: format!("{:#}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_hold_launch_lock_when_free() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("glances.lock");

        let lock = hold_launch_lock(&path).unwrap();
        assert_eq!(lock.path(), path);
        assert!(LaunchLock::try_acquire(&path).unwrap().is_none());
    }

    #[test]
    fn test_hold_launch_lock_waits_for_holder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("glances.lock");

        let held = LaunchLock::acquire(&path).unwrap();
        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            let lock = hold_launch_lock(&waiter_path);
            tx.send(()).unwrap();
            lock.map(|_| ())
        });

        // Still blocked while the first lock is held
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap().unwrap();
    }
}
