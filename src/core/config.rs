// This module holds the configuration state a backend translator accumulates before it
// flavors and lowers a module. TranslatorConfig carries the target triple and target CPU
// model (both defaulting to what LLVM reports for the host), the installation layout used
// to find bundled bitcode libraries, the path of the external compiler, and the optional
// location of a diagnostic textual module dump. Setters validate their input so an empty
// triple or CPU name never reaches the compiler command line. BuildOption is the parsed
// form of a `key=value` option string as passed on the command line; routing an option to
// a translator is done through BackendTranslator::apply_build_option.

//! Translator configuration.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use inkwell::targets::TargetMachine;

use super::install::InstallLayout;

/// CPU name meaning "no specific model requested".
pub const GENERIC_CPU: &str = "generic";

/// Environment variable naming the external compiler binary.
pub const COMPILER_ENV: &str = "SSCP_CLANG_PATH";

/// Compiler used when [`COMPILER_ENV`] is unset.
pub const DEFAULT_COMPILER: &str = "clang";

/// Triple of the process LLVM is running in.
pub fn host_triple() -> String {
    TargetMachine::get_default_triple()
        .as_str()
        .to_string_lossy()
        .into_owned()
}

/// CPU name LLVM detects for the host.
pub fn host_cpu() -> String {
    TargetMachine::get_host_cpu_name()
        .to_string_lossy()
        .into_owned()
}

/// Configuration of a single translator instance.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    target_triple: String,
    target_cpu: String,
    install: InstallLayout,
    compiler: PathBuf,
    dump_module: Option<PathBuf>,
}

impl TranslatorConfig {
    /// Configuration targeting the host, with install root and compiler
    /// taken from the environment.
    pub fn host() -> Self {
        let compiler = env::var_os(COMPILER_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER));

        Self {
            target_triple: host_triple(),
            target_cpu: host_cpu(),
            install: InstallLayout::discover(),
            compiler,
            dump_module: None,
        }
    }

    pub fn target_triple(&self) -> &str {
        &self.target_triple
    }

    /// Stores `triple` verbatim. Returns `false` and leaves the triple
    /// untouched for an empty value.
    pub fn set_target_triple(&mut self, triple: &str) -> bool {
        if triple.is_empty() {
            return false;
        }
        self.target_triple = triple.to_string();
        true
    }

    pub fn target_cpu(&self) -> &str {
        &self.target_cpu
    }

    /// Stores `cpu` verbatim. Returns `false` and leaves the CPU untouched
    /// for an empty value.
    pub fn set_target_cpu(&mut self, cpu: &str) -> bool {
        if cpu.is_empty() {
            return false;
        }
        self.target_cpu = cpu.to_string();
        true
    }

    /// Whether a CPU model other than [`GENERIC_CPU`] is configured.
    pub fn has_specific_cpu(&self) -> bool {
        self.target_cpu != GENERIC_CPU
    }

    pub fn install(&self) -> &InstallLayout {
        &self.install
    }

    pub fn with_install_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.install = InstallLayout::new(root);
        self
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    /// Where the flavored module is printed before lowering, if anywhere.
    pub fn dump_module(&self) -> Option<&Path> {
        self.dump_module.as_deref()
    }

    pub fn with_dump_module(mut self, path: Option<PathBuf>) -> Self {
        self.dump_module = path;
        self
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::host()
    }
}

/// A `key=value` build option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOption {
    pub key: String,
    pub value: String,
}

impl BuildOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for BuildOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing option name in '{}'", s));
        }
        Ok(Self::new(key, value.trim()))
    }
}

impl fmt::Display for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
