//! Process management module.
//!
//! Handles detection and launching of the managed service.
//!
//! # Detection Strategy
//!
//! 1. **PID file** (optional) - Written after a launch, trusted while the PID is alive
//! 2. **Process table scan** - `sysinfo` or `ps`, matched by name or command line
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_core::process::{
//!     DetachedSpawner, LaunchCommand, ServiceHandle, SingletonLauncher, StdoutSink,
//!     SysinfoProcessQuery,
//! };
//!
//! fn main() -> warden_core::Result<()> {
//!     let mut handle = ServiceHandle::new("glances", LaunchCommand::parse("glances -w")?);
//!     let mut launcher =
//!         SingletonLauncher::new(SysinfoProcessQuery, DetachedSpawner::default(), StdoutSink);
//!
//!     let result = launcher.ensure_running(&mut handle)?;
//!     println!("{}: {:?}", result.status, result.pid);
//!     Ok(())
//! }
//! ```

mod detection;
mod launcher;
mod lock;
mod pid_file;
mod service;
mod spawner;

pub use detection::{
    filter_matches, query_for_backend, MatchMode, PidFileQuery, ProcessMatch, ProcessQuery,
    ProcessSource, PsProcessQuery, QueryBackend, SysinfoProcessQuery,
};
pub use launcher::{LaunchResult, LaunchStatus, SingletonLauncher, StatusSink, StdoutSink};
pub use lock::LaunchLock;
pub use pid_file::{read_pid_file, remove_pid_file, write_pid_file};
pub use service::{LaunchCommand, ServiceHandle};
pub use spawner::{DetachedSpawner, SpawnOptions, Spawner};
