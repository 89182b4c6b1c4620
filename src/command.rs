//! External command execution
//!
//! Enumeration backends, the unlock probe and the kill strategies all shell
//! out to OS tools. They do so through [`CommandRunner`] so tests can swap in
//! a double that never touches the host.

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Operator-supplied command string, interpreted by `sh -c`
    Shell(String),
    /// Program invoked directly with an argument vector
    Exec { program: String, args: Vec<String> },
}

impl CommandLine {
    pub fn shell(command: impl Into<String>) -> Self {
        CommandLine::Shell(command.into())
    }

    pub fn exec(program: &str, args: &[&str]) -> Self {
        CommandLine::Exec {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(command) => f.write_str(command),
            CommandLine::Exec { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of a command that was started
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Exit code, absent when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
}

/// A command could not be started
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Capability to run external commands
pub trait CommandRunner {
    /// Run a command to completion, capturing its standard output
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError>;
}

/// Runner shared by every component of one run
pub type SharedRunner = Arc<dyn CommandRunner + Send + Sync>;

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        let mut process = match command {
            CommandLine::Shell(line) => {
                let mut process = Command::new("sh");
                process.arg("-c").arg(line);
                process
            }
            CommandLine::Exec { program, args } => {
                let mut process = Command::new(program);
                process.args(args);
                process
            }
        };

        let output = process
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner shared by the unit tests of the modules that shell out

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every command and answers from a table keyed by its rendering
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: HashMap<String, Result<CommandOutput, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `command` with a successful run printing `stdout`
        pub fn succeed(mut self, command: &str, stdout: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    stdout: stdout.to_string(),
                }),
            );
            self
        }

        /// Answer `command` with a non-zero exit
        pub fn exit_with(mut self, command: &str, code: i32) -> Self {
            self.responses.insert(
                command.to_string(),
                Ok(CommandOutput {
                    success: false,
                    code: Some(code),
                    stdout: String::new(),
                }),
            );
            self
        }

        /// Answer `command` with a spawn failure
        pub fn fail(mut self, command: &str) -> Self {
            self.responses
                .insert(command.to_string(), Err("not found".to_string()));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
            let rendered = command.to_string();
            self.calls.lock().unwrap().push(rendered.clone());
            match self.responses.get(&rendered) {
                Some(Ok(output)) => Ok(output.clone()),
                Some(Err(message)) => Err(CommandError::Spawn {
                    command: rendered,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
                }),
                // Unscripted commands behave like a successful no-op
                None => Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    stdout: String::new(),
                }),
            }
        }
    }
}
