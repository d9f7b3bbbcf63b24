//! The managed service: its name and how to start it.

use crate::error::{Result, WardenError};
use std::fmt;

/// Program and arguments used to start a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchCommand {
    program: String,
    args: Vec<String>,
}

impl LaunchCommand {
    /// Create a command from an explicit program and argument list.
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a command string such as `"/usr/local/bin/glances -w"`.
    ///
    /// Words are split on whitespace. Single or double quotes group a word
    /// that contains spaces; the quotes themselves are dropped. No shell
    /// expansion happens.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut words = split_words(raw)?.into_iter();
        let program = words
            .next()
            .ok_or_else(|| WardenError::validation("command", "launch command is empty"))?;

        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.program.trim().is_empty()
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

fn split_words(raw: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(WardenError::validation(
            "command",
            format!("unterminated {} quote in launch command", q),
        ));
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}

/// A named, launchable background process.
///
/// `running_pid` is only ever set by the launcher: after it finds a running
/// instance or after a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    name: String,
    launch_command: LaunchCommand,
    running_pid: Option<u32>,
}

impl ServiceHandle {
    pub fn new(name: impl Into<String>, launch_command: LaunchCommand) -> Self {
        Self {
            name: name.into(),
            launch_command,
            running_pid: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn launch_command(&self) -> &LaunchCommand {
        &self.launch_command
    }

    /// PID of the managed instance, if one was found or launched.
    pub fn running_pid(&self) -> Option<u32> {
        self.running_pid
    }

    pub(crate) fn set_running_pid(&mut self, pid: u32) {
        self.running_pid = Some(pid);
    }

    /// Check that the name can be used to search the process table.
    pub fn validate_name(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WardenError::validation("name", "service name must not be empty"));
        }
        Ok(())
    }

    /// Check that the handle can be both searched for and launched.
    pub fn validate(&self) -> Result<()> {
        self.validate_name()?;
        if self.launch_command.is_empty() {
            return Err(WardenError::validation("command", "launch command is empty"));
        }
        Ok(())
    }
}
