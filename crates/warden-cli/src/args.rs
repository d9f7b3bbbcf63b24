//! Command line arguments.
//!
//! Every service option can also come from an environment variable; clap
//! resolves flag-over-env, and the optional JSON config file fills whatever
//! is still unset.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use warden_core::{MatchMode, QueryBackend, ServiceSettings, WardenConfig};

#[derive(Parser, Debug)]
#[command(name = "warden", version)]
#[command(about = "Start a background service unless it is already running")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub service: ServiceArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the service if no instance is running (default)
    Ensure,
    /// Report whether an instance is running without starting one
    Status,
}

#[derive(ClapArgs, Debug, Default)]
pub struct ServiceArgs {
    /// Name to look for in the process table
    #[arg(short, long, global = true, env = WardenConfig::ENV_SERVICE_NAME)]
    pub name: Option<String>,

    /// Command used to start the service, e.g. "/usr/local/bin/glances -w"
    #[arg(
        short = 'c',
        long = "command",
        global = true,
        allow_hyphen_values = true,
        env = WardenConfig::ENV_SERVICE_COMMAND
    )]
    pub launch_command: Option<String>,

    /// Match against the executable name or the full command line
    #[arg(long, global = true, value_name = "name|command-line", env = WardenConfig::ENV_MATCH_MODE)]
    pub match_mode: Option<MatchMode>,

    /// Process table backend
    #[arg(long, global = true, value_name = "ps|sysinfo", env = WardenConfig::ENV_BACKEND)]
    pub backend: Option<QueryBackend>,

    /// PID file written after a launch and checked before scanning
    #[arg(long, global = true, env = WardenConfig::ENV_PID_FILE)]
    pub pid_file: Option<PathBuf>,

    /// File receiving the service's stdout and stderr
    #[arg(long, global = true, env = WardenConfig::ENV_LOG_FILE)]
    pub log_file: Option<PathBuf>,

    /// Hold an exclusive lock on this file while checking and launching
    #[arg(long, global = true, env = WardenConfig::ENV_LOCK_FILE)]
    pub lock_file: Option<PathBuf>,

    /// Working directory for the service
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variable for the service (repeatable)
    #[arg(short, long = "env", global = true, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// JSON config file providing defaults for any of the above
    #[arg(long, global = true, env = WardenConfig::ENV_CONFIG_FILE)]
    pub config: Option<PathBuf>,
}

impl ServiceArgs {
    /// Merge flags and environment over the config file, if any.
    pub fn to_settings(&self) -> Result<ServiceSettings> {
        let from_args = ServiceSettings {
            name: self.name.clone(),
            command: self.launch_command.clone(),
            match_mode: self.match_mode,
            backend: self.backend,
            pid_file: self.pid_file.clone(),
            log_file: self.log_file.clone(),
            lock_file: self.lock_file.clone(),
            working_dir: self.working_dir.clone(),
            env: parse_env_pairs(&self.env)?,
        };

        match self.config {
            Some(ref path) => {
                let from_file = ServiceSettings::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                Ok(from_args.over(from_file))
            }
            None => Ok(from_args),
        }
    }
}

fn parse_env_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut env = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --env value '{}': expected KEY=VALUE", pair);
        };
        if key.is_empty() {
            bail!("invalid --env value '{}': empty key", pair);
        }
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
