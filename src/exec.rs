//! External command execution for data loaders.
//!
//! A small builder for spawning a loader process with its stdout redirected
//! into the cache write pipeline and stderr passed through to the terminal.
//! Exit code 0 is success; anything else is an execution failure. Retries
//! are caller policy, never handled here.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::process::{Command, Stdio};

use crate::loader::LoadError;

/// Command builder for loader execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_owned());
        }
        self
    }

    /// Run the command with stdout redirected into `output`.
    pub fn run_to(self, output: File) -> Result<(), LoadError> {
        let name = self.program.to_string_lossy().into_owned();
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| LoadError::Spawn {
                command: name,
                message: e.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(LoadError::ExitCode(status.code().unwrap_or(-1)))
        }
    }
}
