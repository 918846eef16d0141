// This module defines the contract every SSCP backend translator implements. A translator is
// constructed from the kernel names a front end extracted, optionally configured through
// key/value build options, then asked to flavor a generic LLVM module for its target and to
// lower the flavored module into target output through an external compiler. Failures are
// returned as BackendError values and, in addition, appended to the translator's ErrorLog,
// which stays readable after the failed call. TranslatorState records how far an instance
// got; the provided full_transformation method chains parsing, flavoring and lowering for
// callers that hold serialized bitcode rather than a live module.

//! Backend translator contract.

use std::fmt;
use std::str::FromStr;

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;

use super::address_space::AddressSpaceMap;
use super::error::{BackendError, BackendResult, ErrorLog};
use crate::llvm::link;
use crate::llvm::pipeline::PassHandler;

/// Identifier of a translation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    /// The host CPU.
    Cpu,
}

impl BackendId {
    pub fn name(self) -> &'static str {
        match self {
            BackendId::Cpu => "cpu",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "host" => Ok(BackendId::Cpu),
            other => Err(BackendError::UnsupportedBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Lifecycle position of a translator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorState {
    Created,
    Configured,
    Flavored,
    Lowered,
    /// A call failed. Sticky; the error log holds the reason.
    Failed,
}

/// Operations shared by all target-specific translators.
pub trait BackendTranslator {
    fn backend(&self) -> BackendId;

    /// Apply a `key`/`value` build option. Returns `false` for options this
    /// backend does not recognize, leaving its state unchanged.
    fn apply_build_option(&mut self, key: &str, value: &str) -> bool;

    /// Adapt `module` in place for this backend.
    fn to_backend_flavor(&mut self, module: &Module<'_>, passes: &mut dyn PassHandler) -> BackendResult<()>;

    /// Lower a flavored module. `out` is only written on success.
    fn translate_to_backend_format(&mut self, module: &Module<'_>, out: &mut String) -> BackendResult<()>;

    /// Whether `function` is one of the kernels this translator was built for.
    fn is_kernel_after_flavoring(&self, function: FunctionValue<'_>) -> bool;

    fn address_space_map(&self) -> AddressSpaceMap;

    fn error_log(&self) -> &ErrorLog;

    /// Append `err` to the error log and enter [`TranslatorState::Failed`].
    fn register_error(&mut self, err: &BackendError);

    fn state(&self) -> TranslatorState;

    /// Parse `bitcode`, flavor it and lower it, returning the target output.
    fn full_transformation(&mut self, bitcode: &[u8], passes: &mut dyn PassHandler) -> BackendResult<String> {
        let context = Context::create();
        let module = match link::parse_bitcode(&context, bitcode, "sscp-input") {
            Ok(module) => module,
            Err(err) => {
                self.register_error(&err);
                return Err(err);
            }
        };

        self.to_backend_flavor(&module, passes)?;

        let mut out = String::new();
        self.translate_to_backend_format(&module, &mut out)?;
        Ok(out)
    }
}
