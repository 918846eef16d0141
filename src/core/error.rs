// This module defines error types for the SSCP backend translators using the thiserror crate
// for idiomatic Rust error handling. BackendError is the main error enum covering every
// failure a translation can hit: the builtin bitcode library missing or refusing to link,
// kernel annotation failures, pipeline failures, temp artifact creation, bitcode
// serialization, spawning the external compiler, a non-zero compiler exit code, and reading
// the compiler's result file. Each variant carries the context (paths, exit codes, reasons)
// needed to produce a one-line diagnostic via the Display implementation provided by
// thiserror. ErrorLog is the append-only log a translator keeps of those diagnostics so that
// callers can inspect the latest messages after a failed call.

//! Error types for the backend translators.
//!
//! Using thiserror for more idiomatic error handling.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for flavoring and lowering.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Could not load builtin bitcode library {path}: {reason}")]
    BitcodeLoad {
        path: PathBuf,
        reason: String,
    },

    #[error("Could not link builtin bitcode library {path}: {reason}")]
    BitcodeLink {
        path: PathBuf,
        reason: String,
    },

    #[error("Could not annotate kernel {name}: {reason}")]
    Annotation {
        name: String,
        reason: String,
    },

    #[error("Pass pipeline failed: {reason}")]
    Pipeline {
        reason: String,
    },

    #[error("Could not create temp file: {path}")]
    TempFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write bitcode to {path}: {source}")]
    BitcodeWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} invocation failed with exit code {code}")]
    CompilerFailed {
        program: String,
        code: i32,
    },

    #[error("{program} was terminated by a signal")]
    CompilerTerminated {
        program: String,
    },

    #[error("Could not read result file {path}: {source}")]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid input bitcode: {reason}")]
    InvalidBitcode {
        reason: String,
    },

    #[error("Unsupported backend: {name}")]
    UnsupportedBackend {
        name: String,
    },
}

/// Result type alias for translator operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Append-only log of human readable translation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message.
    pub fn register(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}
