//! Warden Core - keep a single instance of a background service running.
//!
//! This crate checks the OS process table for a named service and starts it,
//! detached, only when no instance is found. It can be used programmatically
//! without the `warden` command line wrapper.
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_core::{ServiceSettings, StdoutSink};
//!
//! fn main() -> warden_core::Result<()> {
//!     let settings = ServiceSettings {
//!         name: Some("glances".into()),
//!         command: Some("/usr/local/bin/glances -w".into()),
//!         ..Default::default()
//!     }
//!     .resolve(true)?;
//!
//!     let mut handle = settings.handle.clone();
//!     let result = settings.launcher(StdoutSink).ensure_running(&mut handle)?;
//!     assert!(result.is_success());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod process;

// Re-export commonly used types
pub use config::{ResolvedSettings, ServiceSettings, WardenConfig};
pub use error::{Result, WardenError};
pub use process::{
    LaunchCommand, LaunchLock, LaunchResult, LaunchStatus, MatchMode, QueryBackend,
    ServiceHandle, SingletonLauncher, StatusSink, StdoutSink,
};
