// This module models the external compiler as a black-box process. CompilerInvocation is the
// explicit argument vector (program plus arguments) a backend builds for one lowering call;
// its Display form is the space-separated command line printed to the debug log. The
// CommandRunner trait is the synchronous execution seam: it spawns the invocation, blocks
// until the child exits and reports the exit code together with captured stderr, or the
// I/O error that prevented spawning. SystemCommandRunner is the std::process implementation
// used outside of tests. Nothing here interprets the compiler's flags beyond building them.

//! External compiler invocation.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Program and argument vector of one external compiler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CompilerInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Value following `flag`, if the flag is present.
    pub fn flag_value(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|arg| arg.as_os_str() == OsStr::new(flag))
            .and_then(|idx| self.args.get(idx + 1))
            .map(OsString::as_os_str)
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CompilerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a finished child process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl ExitOutcome {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Synchronous process execution.
pub trait CommandRunner {
    /// Run `invocation` to completion.
    fn execute_and_wait(&mut self, invocation: &CompilerInvocation) -> io::Result<ExitOutcome>;
}

/// Runs invocations with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn execute_and_wait(&mut self, invocation: &CompilerInvocation) -> io::Result<ExitOutcome> {
        let output = invocation.to_command().output()?;
        Ok(ExitOutcome {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
