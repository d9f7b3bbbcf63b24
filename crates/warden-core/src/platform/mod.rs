//! Platform abstraction layer for cross-platform compatibility.
//!
//! This module centralizes all platform-specific code to make it easy to find,
//! maintain, and extend. All `#[cfg]` blocks for OS-specific behavior should
//! live in this module (or the spawner's detach step) rather than scattered
//! throughout the codebase.
//!
//! # Architecture
//!
//! - `paths` - Runtime directory for PID, lock and log files
//! - `process` - Process liveness checks and process table snapshots

pub mod paths;
pub mod process;

// Re-export commonly used items
pub use paths::{runtime_dir, runtime_path};
pub use process::{is_process_alive, scan_with_ps, scan_with_sysinfo, ProcessEntry};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_platform() {
        let platform = current_platform();
        assert!(["linux", "windows", "macos", "unknown"].contains(&platform));
    }
}
