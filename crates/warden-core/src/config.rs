//! Centralized configuration for Warden.
//!
//! Holds the environment variable names and defaults, plus the
//! `ServiceSettings` layer that merges CLI flags, environment variables and an
//! optional JSON config file into one resolved set of settings.

use crate::error::{Result, WardenError};
use crate::platform;
use crate::process::{
    query_for_backend, DetachedSpawner, LaunchCommand, MatchMode, PidFileQuery, ProcessQuery,
    QueryBackend, ServiceHandle, SingletonLauncher, SpawnOptions, StatusSink,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application-level configuration.
pub struct WardenConfig;

impl WardenConfig {
    pub const APP_NAME: &'static str = "warden";

    // Environment variables
    pub const ENV_SERVICE_NAME: &'static str = "SERVICE_NAME";
    pub const ENV_SERVICE_COMMAND: &'static str = "SERVICE_COMMAND";
    pub const ENV_MATCH_MODE: &'static str = "SERVICE_MATCH";
    pub const ENV_BACKEND: &'static str = "WARDEN_BACKEND";
    pub const ENV_PID_FILE: &'static str = "WARDEN_PID_FILE";
    pub const ENV_LOG_FILE: &'static str = "WARDEN_LOG_FILE";
    pub const ENV_LOCK_FILE: &'static str = "WARDEN_LOCK_FILE";
    pub const ENV_CONFIG_FILE: &'static str = "WARDEN_CONFIG";

    // Defaults
    pub const DEFAULT_MATCH_MODE: MatchMode = MatchMode::Name;
    pub const DEFAULT_BACKEND: QueryBackend = QueryBackend::Sysinfo;

    // Exit codes
    pub const EXIT_OK: u8 = 0;
    pub const EXIT_LAUNCH_FAILED: u8 = 1;
    pub const EXIT_INVALID_CONFIG: u8 = 2;
    pub const EXIT_NOT_RUNNING: u8 = 3;
}

/// Settings for one managed service.
///
/// Every field is optional so layers can be overlaid; `resolve` applies the
/// defaults and validates what is left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct ServiceSettings {
    pub name: Option<String>,
    pub command: Option<String>,
    pub match_mode: Option<MatchMode>,
    pub backend: Option<QueryBackend>,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

/// Fully resolved settings, ready to build a launcher from.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub handle: ServiceHandle,
    pub match_mode: MatchMode,
    pub backend: QueryBackend,
    pub spawn: SpawnOptions,
    pub lock_file: Option<PathBuf>,
}

impl ServiceSettings {
    /// Load settings from a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| WardenError::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
        })?;
        let settings: ServiceSettings =
            serde_json::from_str(&raw).map_err(|e| WardenError::Json {
                message: format!("invalid config file {}: {}", path.display(), e),
                source: Some(e),
            })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Overlay `self` on top of `lower`: fields set in `self` win.
    ///
    /// Environment maps are merged with `self` taking precedence per key.
    pub fn over(self, lower: ServiceSettings) -> ServiceSettings {
        let mut env = lower.env;
        env.extend(self.env);

        ServiceSettings {
            name: self.name.or(lower.name),
            command: self.command.or(lower.command),
            match_mode: self.match_mode.or(lower.match_mode),
            backend: self.backend.or(lower.backend),
            pid_file: self.pid_file.or(lower.pid_file),
            log_file: self.log_file.or(lower.log_file),
            lock_file: self.lock_file.or(lower.lock_file),
            working_dir: self.working_dir.or(lower.working_dir),
            env,
        }
    }

    /// Apply defaults and validate.
    ///
    /// `require_command` is false for read-only operations such as a status
    /// check, where only the name is needed.
    pub fn resolve(self, require_command: bool) -> Result<ResolvedSettings> {
        let name = self
            .name
            .ok_or_else(|| WardenError::validation("name", "a service name is required"))?;

        let launch_command = match self.command {
            Some(raw) => LaunchCommand::parse(&raw)?,
            None if require_command => {
                return Err(WardenError::validation(
                    "command",
                    "a launch command is required",
                ))
            }
            None => LaunchCommand::default(),
        };

        let handle = ServiceHandle::new(name, launch_command);
        handle.validate_name()?;

        let spawn = SpawnOptions {
            working_dir: self.working_dir,
            env: self.env,
            log_file: self.log_file.map(platform::runtime_path),
            pid_file: self.pid_file.map(platform::runtime_path),
        };

        Ok(ResolvedSettings {
            handle,
            match_mode: self.match_mode.unwrap_or(WardenConfig::DEFAULT_MATCH_MODE),
            backend: self.backend.unwrap_or(WardenConfig::DEFAULT_BACKEND),
            spawn,
            lock_file: self.lock_file.map(platform::runtime_path),
        })
    }
}

impl ResolvedSettings {
    /// Build the launcher these settings describe.
    ///
    /// The PID file, when configured, is consulted before the process table
    /// scan and rewritten by the spawner after every launch.
    pub fn launcher<R: StatusSink>(
        &self,
        sink: R,
    ) -> SingletonLauncher<Box<dyn ProcessQuery>, DetachedSpawner, R> {
        let scan = query_for_backend(self.backend);
        let query: Box<dyn ProcessQuery> = match self.spawn.pid_file {
            Some(ref pid_file) => Box::new(PidFileQuery::new(pid_file, scan)),
            None => scan,
        };

        SingletonLauncher::new(query, DetachedSpawner::new(self.spawn.clone()), sink)
            .with_match_mode(self.match_mode)
    }
}
