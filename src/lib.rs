//! SSCP backend translators.
//!
//! A front end compiles every kernel of a program once into a generic LLVM
//! IR module. At run time the module is handed to a backend translator which
//! flavors it for one concrete target and lowers it to target output.
//!
//! # Primary Usage
//!
//! ```ignore
//! use sscp_cpu::core::{BackendTranslator, TranslatorConfig};
//! use sscp_cpu::cpu::CpuTranslator;
//! use sscp_cpu::llvm::LlvmPassHandler;
//!
//! let mut translator = CpuTranslator::new(vec!["my_kernel".to_string()]);
//! translator.apply_build_option("cpu", "znver4");
//!
//! let mut passes = LlvmPassHandler::new();
//! translator.to_backend_flavor(&module, &mut passes)?;
//!
//! let mut asm = String::new();
//! translator.translate_to_backend_format(&module, &mut asm)?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Backend contract, configuration, errors, process invocation
//! - [`llvm`] - Kernel annotations, bitcode linking, pass pipelines
//! - [`cpu`] - Host CPU translator
//! - [`backends`] - Translator factory

pub mod backends;
pub mod core;
pub mod cpu;
pub mod llvm;

pub use crate::backends::{create_translator, create_translator_by_name};
pub use crate::core::{
    // Contract
    BackendId, BackendTranslator, TranslatorState,
    // Configuration
    AddressSpace, AddressSpaceMap, BuildOption, InstallLayout, TranslatorConfig,
    // Errors
    BackendError, BackendResult, ErrorLog,
    // Process invocation
    CommandRunner, CompilerInvocation, ExitOutcome, SystemCommandRunner,
};
pub use crate::cpu::CpuTranslator;
pub use crate::llvm::{LlvmPassHandler, PassHandler, Pipeline};
