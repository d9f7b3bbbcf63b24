//! Platform-specific path utilities.
//!
//! PID files, lock files and child log files given as relative paths are
//! placed in a per-user runtime directory.

use crate::config::WardenConfig;
use std::path::{Path, PathBuf};

/// Get the Warden runtime directory.
///
/// # Platform Behavior
/// - **Linux**: `$XDG_RUNTIME_DIR/warden`, falling back to `~/.cache/warden`
/// - **Windows**: `%LOCALAPPDATA%\warden`
/// - **macOS**: `~/Library/Caches/warden`
///
/// Falls back to the system temp directory when no per-user directory is known.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(WardenConfig::APP_NAME)
}

/// Anchor a relative path in the runtime directory; absolute paths are kept.
pub fn runtime_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        runtime_dir().join(path)
    }
}
