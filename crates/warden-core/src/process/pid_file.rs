//! PID file helpers.

use crate::error::{Result, WardenError};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a PID from a PID file.
///
/// Returns `None` when the file is missing or doesn't hold a valid PID.
pub fn read_pid_file(pid_file: &Path) -> Option<u32> {
    let pid_str = match fs::read_to_string(pid_file) {
        Ok(s) => s,
        Err(e) => {
            debug!("Failed to read PID file {:?}: {}", pid_file, e);
            return None;
        }
    };

    match pid_str.trim().parse::<u32>() {
        Ok(0) => {
            debug!("Invalid PID 0 in {:?}", pid_file);
            None
        }
        Ok(pid) => Some(pid),
        Err(e) => {
            debug!("Invalid PID in {:?}: {}", pid_file, e);
            None
        }
    }
}

/// Write a PID file, creating parent directories as needed.
pub fn write_pid_file(pid_file: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = pid_file.parent() {
        fs::create_dir_all(parent).map_err(|e| WardenError::io_with_path(e, parent))?;
    }
    fs::write(pid_file, format!("{}\n", pid)).map_err(|e| WardenError::io_with_path(e, pid_file))
}

/// Remove a PID file.
pub fn remove_pid_file(pid_file: &Path) -> Result<()> {
    if pid_file.exists() {
        fs::remove_file(pid_file).map_err(|e| WardenError::Io {
            message: "remove PID file".to_string(),
            path: Some(pid_file.to_path_buf()),
            source: Some(e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("run").join("glances.pid");

        write_pid_file(&pid_file, 4242).unwrap();
        assert_eq!(read_pid_file(&pid_file), Some(4242));
    }

    #[test]
    fn test_read_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(read_pid_file(&temp_dir.path().join("missing.pid")), None);
    }

    #[test]
    fn test_read_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("glances.pid");

        fs::write(&pid_file, "not a pid").unwrap();
        assert_eq!(read_pid_file(&pid_file), None);

        fs::write(&pid_file, "0").unwrap();
        assert_eq!(read_pid_file(&pid_file), None);
    }

    #[test]
    fn test_remove_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("glances.pid");
        fs::write(&pid_file, "1").unwrap();

        remove_pid_file(&pid_file).unwrap();
        assert!(!pid_file.exists());

        // Removing again is fine
        remove_pid_file(&pid_file).unwrap();
    }
}
